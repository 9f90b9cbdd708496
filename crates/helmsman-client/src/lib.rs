// ABOUTME: Dashboard client library for helmsman
// ABOUTME: Issues Control API calls and remembers the session token locally

mod client;
mod error;
mod token;

pub use client::{ControlClient, DEFAULT_SERVER};
pub use error::{ClientError, Result};
pub use token::{StoredSession, TokenStore};
