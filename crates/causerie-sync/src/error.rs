use thiserror::Error;

use causerie_shared::{ConversationId, DecodeError, UserKey};
use causerie_store::StoreError;

/// Errors surfaced by the sync engine and the user directory.
///
/// Nothing here is fatal to the process; a failure terminates the single
/// call that produced it.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The current user has no record in the store.
    #[error("user not found: {0}")]
    UserNotFound(UserKey),

    /// The conversation's message log or summary entry is missing.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// No session was supplied to the engine.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A serialized list mutation kept conflicting and gave up.
    #[error("write conflict on {0} after retries")]
    Conflict(String),

    /// Store-level failure (read, write, upload).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record that must decode (not a droppable list entry) did not.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A record failed to serialize for storage.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
