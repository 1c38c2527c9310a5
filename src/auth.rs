//! Caller identity.
//!
//! Owners authenticate with `Authorization: Bearer <token>`; the token is
//! resolved to a user id by an [`IdentityProvider`]. Completion reviews use
//! a separate admin token from configuration.

use std::collections::BTreeMap;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Extract the token from a `Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub trait IdentityProvider: Send + Sync {
    /// User id for a token, if the token is known.
    fn resolve(&self, token: &str) -> Option<String>;
}

/// Token table loaded from `[auth.tokens]`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: BTreeMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }
}

impl IdentityProvider for StaticTokens {
    fn resolve(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}

/// Resolve an optional `Authorization` header to a user id.
pub fn authenticate(provider: &dyn IdentityProvider, header: Option<&str>) -> Result<String> {
    let token = header
        .and_then(bearer_token)
        .ok_or_else(|| Error::Unauthorized("missing bearer token".to_string()))?;
    provider
        .resolve(token)
        .ok_or_else(|| Error::Unauthorized("unknown token".to_string()))
}

/// Check an admin token against the configured one.
pub fn require_admin(config: &AuthConfig, token: Option<&str>) -> Result<()> {
    let expected = config
        .admin_token
        .as_deref()
        .ok_or_else(|| Error::Unauthorized("admin access is not configured".to_string()))?;
    match token {
        Some(given) if given == expected => Ok(()),
        _ => Err(Error::Unauthorized("admin access required".to_string())),
    }
}
