//! Server-side binding of access tokens to browser sessions.
//!
//! The browser only ever sees an opaque [`SessionId`]; the bearer token issued by the identity
//! provider stays in the [`SessionStore`] until the session is cleared or the process exits.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque identifier of a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new random session identifier.
    pub fn generate() -> SessionId {
        SessionId(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as it is stored in the session cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bearer token issued by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new<S: Into<String>>(token: S) -> AccessToken {
        AccessToken(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AccessToken(****)")
    }
}

/// Keyed mapping from session to access token. A session without a token is unauthenticated.
///
/// Tokens never expire on their own. Concurrent writers for the same session overwrite each
/// other, last write wins.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashMap<SessionId, AccessToken>>,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore::default()
    }

    /// Returns the token bound to `session_id`, if any.
    pub async fn get(&self, session_id: &SessionId) -> Option<AccessToken> {
        self.tokens.read().await.get(session_id).cloned()
    }

    /// Binds `token` to `session_id`, replacing any previous token.
    pub async fn set(&self, session_id: SessionId, token: AccessToken) {
        log::debug!("binding access token to session");
        self.tokens.write().await.insert(session_id, token);
    }

    /// Removes the token bound to `session_id` and returns it.
    pub async fn clear(&self, session_id: &SessionId) -> Option<AccessToken> {
        let removed = self.tokens.write().await.remove(session_id);

        if removed.is_some() {
            log::debug!("removed access token from session");
        }

        removed
    }

    /// Number of authenticated sessions.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
