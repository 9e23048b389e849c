//! # causerie-store
//!
//! Storage access for Causerie: the keyed tree store contract the sync
//! engine writes through, an in-memory reference backend with observe
//! semantics, and the file-backed blob store for pictures.

pub mod blobs;
pub mod memory;
pub mod path;
pub mod tree;

mod error;

pub use blobs::BlobStore;
pub use error::StoreError;
pub use memory::MemoryTreeStore;
pub use path::TreePath;
pub use tree::TreeStore;
