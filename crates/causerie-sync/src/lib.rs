//! # causerie-sync
//!
//! The conversation sync engine: creating two-party conversations,
//! appending messages, keeping both participants' latest-message
//! summaries in step, and the read-side projections a UI renders from.
//!
//! The engine is the only intended writer of the conversation paths; the
//! store itself does not enforce that, so every list mutation here goes
//! through a compare-and-swap retry loop by default (see
//! [`engine::WritePolicy`]).

pub mod directory;
pub mod engine;
pub mod feed;
pub mod records;

mod error;

pub use directory::{Directory, DirectoryEntry, NewUser};
pub use engine::{OutgoingMessage, SyncEngine, WritePolicy};
pub use error::SyncError;
pub use feed::MessageFeed;
pub use records::{ConversationSummary, LatestMessage, MessageRecord};
