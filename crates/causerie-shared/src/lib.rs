//! # causerie-shared
//!
//! Domain types shared across the Causerie crates: storage-safe identity
//! keys, message kinds and their stored projection, the timestamp codec,
//! and the session value handed to the sync engine.

pub mod error;
pub mod keys;
pub mod message;
pub mod session;
pub mod timestamp;

pub use error::{DecodeError, TimestampError};
pub use keys::{ConversationId, MessageId, UserKey};
pub use message::MessageBody;
pub use session::Session;
