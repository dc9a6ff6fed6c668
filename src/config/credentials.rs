//! Bearer credential handling.
//!
//! Tokens are resolved from configuration at runtime and wrapped so they
//! never end up in logs.

use super::types::AuthConfig;

/// Wrapper for sensitive strings that prevents accidental logging.
///
/// The inner value is never exposed via Debug or Display traits.
/// Use `expose()` to access the actual value when needed for API calls.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(String);

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// Expose the inner value.
    ///
    /// Use sparingly and only when actually sending to the server.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(••••••••)")
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "••••••••")
    }
}

impl AuthConfig {
    /// The configured bearer token, if any. Blank tokens count as missing.
    pub fn bearer(&self) -> Option<SecureString> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| SecureString::new(token.to_string()))
    }
}

/// Build the `Authorization` header value for a bearer token.
pub fn bearer_header(token: &SecureString) -> String {
    format!("Bearer {}", token.expose())
}
