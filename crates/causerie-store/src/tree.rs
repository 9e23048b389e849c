//! The keyed tree store contract.
//!
//! Mirrors the hosted database the mobile client talked to: path-addressed
//! JSON subtrees with one-shot reads, whole-subtree overwrite, and
//! continuous observation. [`TreeStore::compare_and_swap`] is the one
//! extension over that interface -- the sync engine builds its
//! read-modify-write retry loops on it instead of racing blind overwrites.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::path::TreePath;

#[async_trait]
pub trait TreeStore: Send + Sync + 'static {
    /// Read the value at `path` once. `Ok(None)` when the subtree is absent.
    async fn read_once(&self, path: &TreePath) -> Result<Option<Value>>;

    /// Overwrite the whole subtree at `path`.
    async fn write(&self, path: &TreePath, value: Value) -> Result<()>;

    /// Subscribe to `path`. The receiver yields the current value
    /// immediately, then the value at `path` after every mutation touching
    /// that subtree. `Value::Null` stands for an absent node. The
    /// subscription ends when the receiver is dropped; in-flight
    /// operations cannot be cancelled.
    async fn observe(&self, path: &TreePath) -> Result<mpsc::Receiver<Value>>;

    /// Write `new` at `path` only if the current value still equals
    /// `expected` (`None` meaning absent). Returns `false` on a conflict,
    /// leaving the stored value untouched.
    async fn compare_and_swap(
        &self,
        path: &TreePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool>;
}
