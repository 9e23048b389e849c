//! Domain records and their stored wire shapes.
//!
//! Stored shapes are fixed by the existing data set:
//!
//! - message: `{id, type, content, date, sender_email, is_read, name}`
//! - summary: `{id, other_user_email, name, latest_message}`
//! - latest:  `{date, message, is_read}`
//!
//! List decoding is tolerant: an entry missing a required field or
//! carrying an unknown tag is logged and dropped, the rest of the list is
//! still delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use causerie_shared::{
    timestamp, ConversationId, DecodeError, MessageBody, MessageId, UserKey,
};

use crate::error::{Result, SyncError};

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A decoded entry of a conversation's message log.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: MessageId,
    /// Identity key of the sender.
    pub sender: UserKey,
    /// Display name carried alongside the record (the conversation title
    /// in the legacy data, reused as the sender's display name on read).
    pub display_name: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
    pub body: MessageBody,
}

/// Denormalized most-recent-message projection kept in every summary.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestMessage {
    pub date: DateTime<Utc>,
    /// One-line preview (the message's stored content projection).
    pub preview: String,
    pub is_read: bool,
}

/// One participant's view of a conversation.
///
/// Each conversation has two of these, one under each participant's user
/// record, and any append must leave both `latest` copies converged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub other_user: UserKey,
    pub display_name: String,
    pub latest: LatestMessage,
}

// ---------------------------------------------------------------------------
// Stored shapes
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct StoredMessage {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    content: String,
    date: String,
    sender_email: String,
    is_read: bool,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct StoredLatest {
    date: String,
    message: String,
    is_read: bool,
}

#[derive(Serialize, Deserialize)]
struct StoredSummary {
    id: String,
    other_user_email: String,
    name: String,
    latest_message: StoredLatest,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

pub fn encode_message(record: &MessageRecord) -> Result<Value> {
    to_value(StoredMessage {
        id: record.id.as_str().to_string(),
        kind: record.body.kind().to_string(),
        content: record.body.content(),
        date: timestamp::format_stored(record.sent_at),
        sender_email: record.sender.as_str().to_string(),
        is_read: record.is_read,
        name: record.display_name.clone(),
    })
}

pub fn encode_latest(latest: &LatestMessage) -> Result<Value> {
    to_value(StoredLatest {
        date: timestamp::format_stored(latest.date),
        message: latest.preview.clone(),
        is_read: latest.is_read,
    })
}

pub fn encode_summary(summary: &ConversationSummary) -> Result<Value> {
    to_value(StoredSummary {
        id: summary.id.as_str().to_string(),
        other_user_email: summary.other_user.as_str().to_string(),
        name: summary.display_name.clone(),
        latest_message: StoredLatest {
            date: timestamp::format_stored(summary.latest.date),
            message: summary.latest.preview.clone(),
            is_read: summary.latest.is_read,
        },
    })
}

fn to_value<T: Serialize>(stored: T) -> Result<Value> {
    serde_json::to_value(stored).map_err(|e| SyncError::Encode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decode a stored message list, dropping undecodable entries.
pub fn decode_messages(value: &Value) -> Vec<MessageRecord> {
    list_entries(value)
        .filter_map(|entry| match decode_message(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "dropping undecodable message entry");
                None
            }
        })
        .collect()
}

/// Decode a stored summary list, dropping undecodable entries.
pub fn decode_summaries(value: &Value) -> Vec<ConversationSummary> {
    list_entries(value)
        .filter_map(|entry| match decode_summary(entry) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "dropping undecodable conversation entry");
                None
            }
        })
        .collect()
}

pub fn decode_message(entry: &Value) -> std::result::Result<MessageRecord, DecodeError> {
    let stored: StoredMessage = serde_json::from_value(entry.clone())
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    Ok(MessageRecord {
        id: MessageId::from_stored(stored.id),
        sender: UserKey::derive(&stored.sender_email),
        display_name: stored.name,
        sent_at: timestamp::parse_stored(&stored.date)?,
        is_read: stored.is_read,
        body: MessageBody::from_stored(&stored.kind, &stored.content)?,
    })
}

pub fn decode_summary(entry: &Value) -> std::result::Result<ConversationSummary, DecodeError> {
    let stored: StoredSummary = serde_json::from_value(entry.clone())
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    Ok(ConversationSummary {
        id: ConversationId::from_stored(stored.id),
        other_user: UserKey::derive(&stored.other_user_email),
        display_name: stored.name,
        latest: LatestMessage {
            date: timestamp::parse_stored(&stored.latest_message.date)?,
            preview: stored.latest_message.message,
            is_read: stored.latest_message.is_read,
        },
    })
}

/// Stored lists are JSON arrays; anything else reads as empty.
fn list_entries(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().map(|a| a.iter()).into_iter().flatten()
}
