//! Message kinds and their stored projection.
//!
//! Each message is persisted as a flat `(type, content)` string pair. The
//! original client could only encode `text` and `photo` and decoded every
//! non-photo tag as text, so most kinds had no way back. [`MessageBody`]
//! keeps the payload for all ten kinds and the projection is lossless in
//! both directions. Legacy rows (bare URL for `photo`, plain text
//! elsewhere) decode unchanged.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Payload of a single message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MessageBody {
    Text(String),
    AttributedText(String),
    Photo { url: String },
    Video { url: String },
    Audio { url: String },
    Location { latitude: f64, longitude: f64 },
    Emoji(String),
    Contact(String),
    LinkPreview { url: String },
    Custom(String),
}

impl MessageBody {
    /// Stored `type` tag. The strings are fixed by the existing data set.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::AttributedText(_) => "attributedText",
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
            Self::Audio { .. } => "audio",
            Self::Location { .. } => "location",
            Self::Emoji(_) => "emoji",
            Self::Contact(_) => "contact",
            Self::LinkPreview { .. } => "linkPreview",
            Self::Custom(_) => "custom",
        }
    }

    /// Stored `content` projection. Never empty for a non-empty payload;
    /// this string is also what conversation summaries show as preview.
    pub fn content(&self) -> String {
        match self {
            Self::Text(text)
            | Self::AttributedText(text)
            | Self::Emoji(text)
            | Self::Contact(text)
            | Self::Custom(text) => text.clone(),
            Self::Photo { url }
            | Self::Video { url }
            | Self::Audio { url }
            | Self::LinkPreview { url } => url.clone(),
            Self::Location {
                latitude,
                longitude,
            } => format!("{latitude},{longitude}"),
        }
    }

    /// Rebuild a body from its stored `(type, content)` pair.
    pub fn from_stored(kind: &str, content: &str) -> Result<Self, DecodeError> {
        match kind {
            "text" => Ok(Self::Text(content.to_string())),
            "attributedText" => Ok(Self::AttributedText(content.to_string())),
            "photo" => Ok(Self::Photo {
                url: content.to_string(),
            }),
            "video" => Ok(Self::Video {
                url: content.to_string(),
            }),
            "audio" => Ok(Self::Audio {
                url: content.to_string(),
            }),
            "location" => {
                let bad = || DecodeError::BadContent {
                    kind: "location",
                    content: content.to_string(),
                };
                let (lat, lon) = content.split_once(',').ok_or_else(bad)?;
                Ok(Self::Location {
                    latitude: lat.trim().parse().map_err(|_| bad())?,
                    longitude: lon.trim().parse().map_err(|_| bad())?,
                })
            }
            "emoji" => Ok(Self::Emoji(content.to_string())),
            "contact" => Ok(Self::Contact(content.to_string())),
            "linkPreview" => Ok(Self::LinkPreview {
                url: content.to_string(),
            }),
            "custom" => Ok(Self::Custom(content.to_string())),
            other => Err(DecodeError::UnknownKind(other.to_string())),
        }
    }
}
