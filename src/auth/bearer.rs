//! Bearer (RFC 6750) and OAuth 2.0 access-token authentication

use super::AuthOutput;

const DEFAULT_PREFIX: &str = "Bearer";

/// Token sent as `Authorization: <prefix> <token>`
#[derive(Debug, Clone)]
pub struct BearerAuth {
    token: String,
    prefix: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Custom scheme prefix; a blank prefix falls back to `Bearer`
    pub fn with_prefix(token: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            token: token.into(),
            prefix: if prefix.trim().is_empty() {
                DEFAULT_PREFIX.to_string()
            } else {
                prefix
            },
        }
    }

    pub fn apply(&self, output: &mut AuthOutput) {
        if self.token.is_empty() {
            return;
        }
        output.headers.insert(
            "Authorization".to_string(),
            format!("{} {}", self.prefix, self.token),
        );
    }
}
