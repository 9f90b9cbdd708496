// ABOUTME: The single operator credential and the session secret, read-only after load.
// ABOUTME: Passwords are held as SHA-256 digests and compared in constant time.

use crate::error::{AuthError, Result};
use helmsman_core::AuthSettings;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Compare two byte strings without early exit on the first mismatch.
///
/// Length is not secret: slices of different length compare unequal immediately.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// The operator's username and password digest.
#[derive(Clone)]
pub struct Credential {
    username: String,
    username_digest: [u8; 32],
    password_digest: [u8; 32],
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password_digest", &"<redacted>")
            .finish()
    }
}

impl Credential {
    /// Credential from a plaintext password.
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        let username = username.into();
        Self {
            username_digest: sha256(username.as_bytes()),
            password_digest: sha256(password.as_bytes()),
            username,
        }
    }

    /// Credential from a hex-encoded SHA-256 password digest.
    pub fn from_sha256_hex(username: impl Into<String>, digest_hex: &str) -> Result<Self> {
        let bytes = hex::decode(digest_hex.trim())
            .map_err(|e| AuthError::InvalidConfig(format!("password_sha256 is not hex: {e}")))?;
        let password_digest: [u8; 32] = bytes.try_into().map_err(|_| {
            AuthError::InvalidConfig("password_sha256 must be 32 bytes".to_string())
        })?;
        let username = username.into();
        Ok(Self {
            username_digest: sha256(username.as_bytes()),
            password_digest,
            username,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check a login attempt. Both fields are always compared so timing does
    /// not reveal which one was wrong.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(&sha256(username.as_bytes()), &self.username_digest);
        let pass_ok = constant_time_eq(&sha256(password.as_bytes()), &self.password_digest);
        user_ok & pass_ok
    }
}

/// Holds the operator credential and the session secret.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credential: Credential,
    session_secret: Vec<u8>,
}

impl CredentialStore {
    pub fn new(credential: Credential, session_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            credential,
            session_secret: session_secret.into(),
        }
    }

    /// Build from configuration. A missing session secret is replaced by 32
    /// random bytes, so sessions never outlive the process.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        if settings.username.is_empty() {
            return Err(AuthError::InvalidConfig("username is empty".to_string()));
        }
        let credential = match &settings.password_sha256 {
            Some(digest) => Credential::from_sha256_hex(&settings.username, digest)?,
            None => Credential::new(&settings.username, &settings.password),
        };
        let session_secret = match &settings.session_secret {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };
        Ok(Self::new(credential, session_secret))
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.credential.verify(username, password)
    }

    /// Keyed digest of a session token, used as the session store key.
    pub fn token_digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.session_secret);
        hasher.update(b":");
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
