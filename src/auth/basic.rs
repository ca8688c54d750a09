//! HTTP Basic Authentication (RFC 7617)

use base64::Engine;

use super::AuthOutput;

/// HTTP Basic Authentication credentials
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Adds `Authorization: Basic ...` when a username is present
    pub fn apply(&self, output: &mut AuthOutput) {
        if self.username.is_empty() {
            return;
        }
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        output
            .headers
            .insert("Authorization".to_string(), format!("Basic {}", encoded));
    }
}
