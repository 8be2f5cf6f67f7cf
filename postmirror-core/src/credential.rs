//! Bearer credential for the remote store.
//!
//! The value is passed explicitly into backend constructors. This crate
//! never reads the environment; the CLI decides where the token comes from.

use std::fmt;

use crate::error::AuthError;

/// Environment variable the CLI falls back to when `--token` is absent.
pub const TOKEN_ENV_VAR: &str = "GITHUB_AUTH_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, rejecting a missing or blank value.
    pub fn new(token: Option<String>) -> Result<Self, AuthError> {
        match token {
            Some(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_owned())),
            _ => Err(AuthError::MissingToken {
                env_var: TOKEN_ENV_VAR,
            }),
        }
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
