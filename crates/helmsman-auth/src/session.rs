// ABOUTME: In-memory session store: login issues tokens, validate checks them, logout revokes.
// ABOUTME: Latest login invalidates any earlier session for the same operator.

use crate::credentials::CredentialStore;
use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use helmsman_core::{AuthSettings, ExpiryPolicy, MAX_SESSION_TTL_SECS};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Length of a session token in bytes before hex encoding.
const TOKEN_BYTES: usize = 32;

/// Session lifetime settings injected at construction.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub expiry: ExpiryPolicy,
}

impl SessionSettings {
    /// Lifetime actually granted, capped at `MAX_SESSION_TTL_SECS`.
    pub fn effective_ttl(&self) -> Duration {
        self.ttl.min(Duration::from_secs(MAX_SESSION_TTL_SECS))
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            expiry: ExpiryPolicy::Fixed,
        }
    }
}

impl From<&AuthSettings> for SessionSettings {
    fn from(settings: &AuthSettings) -> Self {
        Self {
            ttl: settings.session_ttl(),
            expiry: settings.expiry,
        }
    }
}

/// Server-side proof of a successful login.
#[derive(Clone, Serialize)]
pub struct Session {
    /// Stable identifier safe to log; the token itself never is
    pub id: Uuid,
    #[serde(skip)]
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues, validates and revokes sessions for the single operator.
///
/// Lookups take a read lock; issuance and revocation are serialized by
/// `issue_lock` so two concurrent logins cannot both leave a live session.
pub struct SessionManager {
    credentials: CredentialStore,
    settings: SessionSettings,
    /// Sessions keyed by the keyed digest of their token
    sessions: RwLock<HashMap<String, Session>>,
    issue_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore, settings: SessionSettings) -> Self {
        Self {
            credentials,
            settings,
            sessions: RwLock::new(HashMap::new()),
            issue_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.settings.effective_ttl())
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Check credentials and issue a fresh session, revoking any earlier
    /// session for the same username.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        if !self.credentials.verify(username, password) {
            warn!("Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let _guard = self.issue_lock.lock().await;
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|_, s| s.username != username);
        let revoked = before - sessions.len();

        let now = Utc::now();
        let (token, digest) = loop {
            let token = generate_token();
            let digest = self.credentials.token_digest(&token);
            if !sessions.contains_key(&digest) {
                break (token, digest);
            }
        };

        let session = Session {
            id: Uuid::new_v4(),
            token,
            username: username.to_string(),
            issued_at: now,
            expires_at: self.expiry_from(now),
        };
        sessions.insert(digest, session.clone());

        info!(
            session_id = %session.id,
            username = %session.username,
            revoked = revoked,
            "Session issued"
        );
        Ok(session)
    }

    /// Resolve a token to its live session.
    ///
    /// Absent, malformed, unknown and expired tokens all yield
    /// `Unauthenticated`. With sliding expiry a successful validation extends
    /// the session.
    pub async fn validate(&self, token: Option<&str>) -> Result<Session> {
        let token = token.map(str::trim).unwrap_or_default();
        if !is_well_formed(token) {
            return Err(AuthError::Unauthenticated);
        }
        let digest = self.credentials.token_digest(token);
        let now = Utc::now();

        match self.settings.expiry {
            ExpiryPolicy::Fixed => {
                let expired = {
                    let sessions = self.sessions.read().await;
                    match sessions.get(&digest) {
                        None => return Err(AuthError::Unauthenticated),
                        Some(session) if !session.is_expired_at(now) => {
                            return Ok(session.clone())
                        }
                        Some(_) => true,
                    }
                };
                if expired {
                    self.remove_expired(&digest, now).await;
                }
                Err(AuthError::Unauthenticated)
            }
            ExpiryPolicy::Sliding => {
                let mut sessions = self.sessions.write().await;
                let Some(session) = sessions.get_mut(&digest) else {
                    return Err(AuthError::Unauthenticated);
                };
                if session.is_expired_at(now) {
                    debug!(session_id = %session.id, "Session expired");
                    sessions.remove(&digest);
                    return Err(AuthError::Unauthenticated);
                }
                session.expires_at = self.expiry_from(now);
                Ok(session.clone())
            }
        }
    }

    /// Time left on a live session, without extending it.
    pub async fn remaining(&self, token: Option<&str>) -> Option<Duration> {
        let token = token.map(str::trim).unwrap_or_default();
        if !is_well_formed(token) {
            return None;
        }
        let digest = self.credentials.token_digest(token);
        let sessions = self.sessions.read().await;
        let session = sessions.get(&digest)?;
        (session.expires_at - Utc::now()).to_std().ok()
    }

    async fn remove_expired(&self, digest: &str, now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(digest) {
            if session.is_expired_at(now) {
                debug!(session_id = %session.id, "Session expired");
                sessions.remove(digest);
            }
        }
    }

    /// Revoke a token. Unknown or already revoked tokens are a no-op.
    pub async fn logout(&self, token: Option<&str>) {
        let token = token.map(str::trim).unwrap_or_default();
        if !is_well_formed(token) {
            return;
        }
        let digest = self.credentials.token_digest(token);

        let _guard = self.issue_lock.lock().await;
        if let Some(session) = self.sessions.write().await.remove(&digest) {
            info!(session_id = %session.id, username = %session.username, "Session revoked");
        }
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged = purged, "Purged expired sessions");
        }
        purged
    }

    /// Number of sessions currently held, expired ones included until purged.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}
