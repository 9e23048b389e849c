//! Explicit session identity.
//!
//! The sync engine never reads ambient global state. Whoever owns the
//! login flow (an authentication provider, a test fixture) constructs a
//! [`Session`] and hands it to the engine.

use serde::{Deserialize, Serialize};

use crate::keys::UserKey;

/// The signed-in user as the engine sees them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Storage-safe key of the current user.
    pub user_key: UserKey,
    /// Display name shown to conversation partners.
    pub display_name: String,
}

impl Session {
    pub fn new(email: &str, display_name: impl Into<String>) -> Self {
        Self {
            user_key: UserKey::derive(email),
            display_name: display_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_derives_its_key() {
        let session = Session::new("a.b@example.com", "A B");
        assert_eq!(session.user_key.as_str(), "a-b-example-com");
        assert_eq!(session.display_name, "A B");
    }
}
