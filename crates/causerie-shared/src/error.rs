use thiserror::Error;

/// A stored timestamp string could not be interpreted.
#[derive(Error, Debug)]
pub enum TimestampError {
    #[error("unrecognized timestamp format: {0:?}")]
    Unrecognized(String),
}

/// A stored record could not be turned back into a domain value.
///
/// Decode failures on list reads are per-entry: the caller logs and drops
/// the entry, the rest of the list is still delivered.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The `type` tag was none of the known kind strings.
    #[error("unknown message kind tag: {0:?}")]
    UnknownKind(String),

    /// The `content` field did not match its kind's encoding.
    #[error("malformed {kind} content: {content:?}")]
    BadContent { kind: &'static str, content: String },

    /// A record was structurally wrong (missing field, wrong JSON type).
    #[error("malformed record: {0}")]
    Malformed(String),

    /// The `date` field failed to parse.
    #[error("timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}
