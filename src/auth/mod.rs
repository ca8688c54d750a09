//! Authentication header injection
//!
//! Auth is modelled as a sum type over the supported schemes. Resolving a
//! configuration never fails: incomplete credentials simply produce nothing.

mod apikey;
mod basic;
mod bearer;

pub use apikey::{ApiKeyAuth, ApiKeyLocation};
pub use basic::BasicAuth;
pub use bearer::BearerAuth;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentStore;

/// Authentication attached to a request definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        #[serde(default)]
        token: String,
    },
    Basic {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    #[serde(rename = "apikey")]
    ApiKey {
        #[serde(default)]
        name: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        location: ApiKeyLocation,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        #[serde(default)]
        token: String,
        #[serde(default)]
        prefix: String,
    },
}

impl AuthConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::ApiKey { .. } => "apikey",
            AuthConfig::OAuth2 { .. } => "oauth2",
        }
    }
}

/// Headers and query parameters contributed by an auth scheme
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOutput {
    pub headers: IndexMap<String, String>,
    pub query_params: Vec<(String, String)>,
}

impl AuthOutput {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query_params.is_empty()
    }
}

/// Compute the auth contribution for `config`, substituting every value
/// against the active environment first.
///
/// Values are trimmed after substitution, except the Basic password which is
/// sent exactly as typed.
pub fn resolve(config: &AuthConfig, env: &EnvironmentStore) -> AuthOutput {
    let sub = |value: &str| env.substitute(value).trim().to_string();
    let mut output = AuthOutput::default();

    match config {
        AuthConfig::None => {}
        AuthConfig::Bearer { token } => {
            BearerAuth::new(sub(token)).apply(&mut output);
        }
        AuthConfig::Basic { username, password } => {
            BasicAuth::new(sub(username), env.substitute(password)).apply(&mut output);
        }
        AuthConfig::ApiKey {
            name,
            value,
            location,
        } => {
            ApiKeyAuth::new(sub(name), sub(value), *location).apply(&mut output);
        }
        AuthConfig::OAuth2 { token, prefix } => {
            BearerAuth::with_prefix(sub(token), sub(prefix)).apply(&mut output);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use base64::Engine;

    fn env() -> EnvironmentStore {
        EnvironmentStore::new(
            vec![Environment::new("dev")
                .with_variable("token", "tok-123")
                .with_variable("user", "alice")
                .with_variable("key", "secret")],
            0,
        )
    }

    #[test]
    fn test_none_contributes_nothing() {
        assert!(resolve(&AuthConfig::None, &env()).is_empty());
    }

    #[test]
    fn test_bearer_substitutes_token() {
        let output = resolve(
            &AuthConfig::Bearer {
                token: "{{token}}".into(),
            },
            &env(),
        );
        assert_eq!(output.headers["Authorization"], "Bearer tok-123");
    }

    #[test]
    fn test_bearer_empty_token_skipped() {
        let output = resolve(&AuthConfig::Bearer { token: "  ".into() }, &env());
        assert!(output.is_empty());
    }

    #[test]
    fn test_basic_allows_empty_password() {
        let output = resolve(
            &AuthConfig::Basic {
                username: "{{user}}".into(),
                password: String::new(),
            },
            &env(),
        );
        let value = &output.headers["Authorization"];
        let encoded = value.strip_prefix("Basic ").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "alice:");
    }

    #[test]
    fn test_basic_password_keeps_whitespace() {
        let output = resolve(
            &AuthConfig::Basic {
                username: " u ".into(),
                password: " p w ".into(),
            },
            &env(),
        );
        let encoded = output.headers["Authorization"].strip_prefix("Basic ").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "u: p w ");
    }

    #[test]
    fn test_basic_requires_username() {
        let output = resolve(
            &AuthConfig::Basic {
                username: String::new(),
                password: "pw".into(),
            },
            &env(),
        );
        assert!(output.is_empty());
    }

    #[test]
    fn test_api_key_header_or_query_never_both() {
        let header = resolve(
            &AuthConfig::ApiKey {
                name: "X-API-Key".into(),
                value: "{{key}}".into(),
                location: ApiKeyLocation::Header,
            },
            &env(),
        );
        assert_eq!(header.headers["X-API-Key"], "secret");
        assert!(header.query_params.is_empty());

        let query = resolve(
            &AuthConfig::ApiKey {
                name: "api_key".into(),
                value: "{{key}}".into(),
                location: ApiKeyLocation::Query,
            },
            &env(),
        );
        assert!(query.headers.is_empty());
        assert_eq!(query.query_params, vec![("api_key".to_string(), "secret".to_string())]);
    }

    #[test]
    fn test_oauth2_prefix_defaults_to_bearer() {
        let output = resolve(
            &AuthConfig::OAuth2 {
                token: "{{token}}".into(),
                prefix: " ".into(),
            },
            &env(),
        );
        assert_eq!(output.headers["Authorization"], "Bearer tok-123");

        let output = resolve(
            &AuthConfig::OAuth2 {
                token: "abc".into(),
                prefix: "Token".into(),
            },
            &env(),
        );
        assert_eq!(output.headers["Authorization"], "Token abc");
    }

    #[test]
    fn test_auth_config_deserializes_tagged() {
        let config: AuthConfig = serde_json::from_str(
            r#"{"type":"apikey","name":"k","value":"v","location":"query"}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            AuthConfig::ApiKey {
                name: "k".into(),
                value: "v".into(),
                location: ApiKeyLocation::Query,
            }
        );

        let config: AuthConfig = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(config, AuthConfig::None);
    }
}
