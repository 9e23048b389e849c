//! Identifiers used as path segments in the remote tree store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Storage-safe identity key derived from an email address.
///
/// The tree store forbids `.` in key segments, and `@` is reserved too, so
/// both are replaced with `-`. Derivation is total; applying it to an
/// already-safe key leaves it unchanged, which also normalizes any raw
/// email that leaked into stored data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct UserKey(String);

impl UserKey {
    pub fn derive(email: &str) -> Self {
        Self(email.replace('.', "-").replace('@', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a two-party conversation.
///
/// Generated once from the first message and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn for_first_message(first: &MessageId) -> Self {
        Self(format!("conversation_{first}"))
    }

    /// Wrap an identifier read back from the store.
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-generated message identifier: `<other>_<current>_<timestamp>`.
///
/// The timestamp portion is RFC 3339 (millisecond resolution) rather than
/// the locale string the mobile client used. Two messages composed by the
/// same pair within the same millisecond still collide; the scheme is kept
/// for compatibility with existing data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn compose(other: &UserKey, current: &UserKey, sent_at: DateTime<Utc>) -> Self {
        Self(format!(
            "{other}_{current}_{}",
            timestamp::format_stored(sent_at)
        ))
    }

    /// Wrap an identifier read back from the store.
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
