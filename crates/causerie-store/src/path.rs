//! Slash-separated addresses into the remote tree.

use std::fmt;

use crate::error::{Result, StoreError};

/// Characters the tree store forbids inside a single key segment.
const RESERVED: &[char] = &['.', '#', '$', '[', ']', '/'];

/// A validated, slash-joined path into the keyed tree store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreePath(String);

impl TreePath {
    /// Build a path from segments. Each segment must be non-empty and free
    /// of reserved characters.
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = Vec::new();
        for segment in segments {
            parts.push(checked_segment(segment.as_ref())?);
        }
        if parts.is_empty() {
            return Err(StoreError::InvalidPath(String::new()));
        }
        Ok(Self(parts.join("/")))
    }

    /// Extend the path by one segment.
    pub fn join(&self, segment: &str) -> Result<Self> {
        let segment = checked_segment(segment)?;
        Ok(Self(format!("{}/{segment}", self.0)))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both paths address the same node or one lies inside the
    /// other's subtree. Observation uses this: a write anywhere inside an
    /// observed subtree (or above it) must re-deliver the observed value.
    pub fn overlaps(&self, other: &TreePath) -> bool {
        let (a, b) = (self.as_str(), other.as_str());
        a == b || is_under(a, b) || is_under(b, a)
    }
}

fn is_under(inner: &str, outer: &str) -> bool {
    inner.len() > outer.len()
        && inner.starts_with(outer)
        && inner.as_bytes()[outer.len()] == b'/'
}

fn checked_segment(segment: &str) -> Result<String> {
    if segment.is_empty() || segment.contains(RESERVED) {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(segment.to_string())
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
