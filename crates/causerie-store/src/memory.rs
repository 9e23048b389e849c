//! In-memory tree store used as the reference backend.
//!
//! Holds the whole tree as a single JSON value behind a mutex. Observers
//! register per path; a write wakes every observer whose path overlaps the
//! written subtree and re-delivers the value at the observer's own path.
//! Engine tests and the demo binary run against this backend; a deployment
//! would implement [`TreeStore`] over the hosted database instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use crate::error::Result;
use crate::path::TreePath;
use crate::tree::TreeStore;

const OBSERVER_BUFFER: usize = 64;

#[derive(Clone, Default)]
pub struct MemoryTreeStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    root: Value,
    observers: Vec<Observer>,
}

struct Observer {
    path: TreePath,
    tx: mpsc::Sender<Value>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn apply(&self, path: &TreePath, value: Value) -> Vec<(mpsc::Sender<Value>, Value)> {
        let mut inner = self.inner.lock().await;
        set_at(&mut inner.root, path, value);
        inner.pending_notifications(path)
    }
}

impl Inner {
    /// Snapshot (sender, value-at-observer-path) pairs for every observer
    /// overlapping `written`, pruning observers whose receiver is gone.
    fn pending_notifications(&mut self, written: &TreePath) -> Vec<(mpsc::Sender<Value>, Value)> {
        self.observers.retain(|o| !o.tx.is_closed());
        self.observers
            .iter()
            .filter(|o| o.path.overlaps(written))
            .map(|o| {
                let snapshot = get_at(&self.root, &o.path)
                    .cloned()
                    .unwrap_or(Value::Null);
                (o.tx.clone(), snapshot)
            })
            .collect()
    }
}

/// Deliveries happen after the tree lock is released; a slow observer
/// backpressures its own channel only.
async fn deliver(notifications: Vec<(mpsc::Sender<Value>, Value)>) {
    for (tx, snapshot) in notifications {
        let _ = tx.send(snapshot).await;
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn read_once(&self, path: &TreePath) -> Result<Option<Value>> {
        let inner = self.inner.lock().await;
        Ok(get_at(&inner.root, path).cloned())
    }

    async fn write(&self, path: &TreePath, value: Value) -> Result<()> {
        trace!(path = %path, "write");
        let notifications = self.apply(path, value).await;
        deliver(notifications).await;
        Ok(())
    }

    async fn observe(&self, path: &TreePath) -> Result<mpsc::Receiver<Value>> {
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let snapshot = get_at(&inner.root, path).cloned().unwrap_or(Value::Null);
            inner.observers.push(Observer {
                path: path.clone(),
                tx: tx.clone(),
            });
            snapshot
        };
        // The buffer is empty at this point, so the initial delivery
        // cannot block.
        let _ = tx.send(snapshot).await;
        Ok(rx)
    }

    async fn compare_and_swap(
        &self,
        path: &TreePath,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool> {
        let notifications = {
            let mut inner = self.inner.lock().await;
            let current = get_at(&inner.root, path);
            let matches = match (current, expected) {
                (None, None) => true,
                (Some(current), Some(expected)) => current == expected,
                _ => false,
            };
            if !matches {
                trace!(path = %path, "compare_and_swap conflict");
                return Ok(false);
            }
            set_at(&mut inner.root, path, new);
            inner.pending_notifications(path)
        };
        deliver(notifications).await;
        Ok(true)
    }
}

fn get_at<'a>(root: &'a Value, path: &TreePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    (!node.is_null()).then_some(node)
}

fn set_at(root: &mut Value, path: &TreePath, value: Value) {
    let segments: Vec<&str> = path.segments().collect();
    let mut node = root;
    for segment in &segments[..segments.len() - 1] {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert(Value::Null);
    }
    if let Some(last) = segments.last() {
        ensure_object(node).insert(last.to_string(), value);
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !matches!(node, Value::Object(_)) {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
