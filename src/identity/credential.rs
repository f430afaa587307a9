use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Opaque bearer token proving an authenticated session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new<S: Into<String>>(token: S) -> Self { Self(token.into()) }

    /// 256-bit random token, base64url without padding. Fails when the OS
    /// entropy source is unavailable.
    pub fn generate() -> AppResult<Self> { Self::from_entropy(getrandom::getrandom) }

    fn from_entropy<F>(fill: F) -> AppResult<Self>
    where
        F: FnOnce(&mut [u8]) -> Result<(), getrandom::Error>,
    {
        let mut buf = [0u8; 32];
        fill(&mut buf).map_err(|e| AppError::internal("rng_unavailable", format!("cannot generate credential: {}", e).as_str()))?;
        Ok(Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)))
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String { format!("Bearer {}", self.0) }

    /// Extract the token from an `Authorization: Bearer <token>` header value.
    pub fn from_bearer(header: &str) -> Option<Self> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") { return None; }
        let token = token.trim();
        if token.is_empty() { None } else { Some(Self(token.to_string())) }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the token itself
        write!(f, "Credential(<{} chars>)", self.0.len())
    }
}
