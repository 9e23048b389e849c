//! User directory: registration, lookup, sign-in.
//!
//! User records live at `<userKey>` as `{first_name, last_name, ...}`;
//! a flat roster of `{name, email}` entries lives at `users` so clients
//! can list people to start a conversation with.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use causerie_shared::{Session, UserKey};
use causerie_store::{TreePath, TreeStore};

use crate::engine::{user_path, MAX_CAS_RETRIES};
use crate::error::{Result, SyncError};

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewUser {
    pub fn user_key(&self) -> UserKey {
        UserKey::derive(&self.email)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Storage-safe key, despite the legacy field name.
    pub email: String,
}

pub struct Directory<S> {
    store: Arc<S>,
}

impl<S: TreeStore> Directory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// True when a record exists for this email.
    pub async fn exists(&self, email: &str) -> Result<bool> {
        let key = UserKey::derive(email);
        Ok(self.store.read_once(&user_path(&key)?).await?.is_some())
    }

    /// Create the user's record, then list them in the global roster.
    ///
    /// The roster append uses the same compare-and-swap loop as the
    /// engine's list writes; two simultaneous registrations both land.
    pub async fn register(&self, user: &NewUser) -> Result<()> {
        let key = user.user_key();
        self.store
            .write(
                &user_path(&key)?,
                json!({
                    "first_name": user.first_name,
                    "last_name": user.last_name,
                }),
            )
            .await?;

        let roster_path = TreePath::new(["users"])?;
        let entry = json!({
            "name": user.full_name(),
            "email": key.as_str(),
        });
        for _ in 0..MAX_CAS_RETRIES {
            let current = self.store.read_once(&roster_path).await?;
            let mut roster = current
                .as_ref()
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            roster.push(entry.clone());
            if self
                .store
                .compare_and_swap(&roster_path, current.as_ref(), Value::Array(roster))
                .await?
            {
                info!(user = %key, "registered user");
                return Ok(());
            }
        }
        Err(SyncError::Conflict(roster_path.to_string()))
    }

    /// The global roster. Malformed entries are dropped.
    pub async fn all_users(&self) -> Result<Vec<DirectoryEntry>> {
        let value = self.store.read_once(&TreePath::new(["users"])?).await?;
        let entries = value
            .as_ref()
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|entry| {
                        let name = entry.get("name")?.as_str()?;
                        let email = entry.get("email")?.as_str()?;
                        Some(DirectoryEntry {
                            name: name.to_string(),
                            email: email.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    /// Resolve a session for an existing user.
    pub async fn sign_in(&self, email: &str) -> Result<Session> {
        let key = UserKey::derive(email);
        let node = self
            .store
            .read_once(&user_path(&key)?)
            .await?
            .ok_or_else(|| SyncError::UserNotFound(key.clone()))?;

        let first = node.get("first_name").and_then(Value::as_str).unwrap_or("");
        let last = node.get("last_name").and_then(Value::as_str).unwrap_or("");
        let display_name = format!("{first} {last}").trim().to_string();
        if display_name.is_empty() {
            warn!(user = %key, "user record has no name fields");
        }

        Ok(Session {
            user_key: key,
            display_name,
        })
    }
}
