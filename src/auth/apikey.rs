//! API key authentication, sent as a header or a query parameter

use serde::{Deserialize, Serialize};

use super::AuthOutput;

/// Where the key is placed on the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    name: String,
    key: String,
    location: ApiKeyLocation,
}

impl ApiKeyAuth {
    pub fn new(name: impl Into<String>, key: impl Into<String>, location: ApiKeyLocation) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            location,
        }
    }

    /// Emits nothing unless both name and key are set
    pub fn apply(&self, output: &mut AuthOutput) {
        if self.name.is_empty() || self.key.is_empty() {
            return;
        }
        match self.location {
            ApiKeyLocation::Header => {
                output.headers.insert(self.name.clone(), self.key.clone());
            }
            ApiKeyLocation::Query => {
                output.query_params.push((self.name.clone(), self.key.clone()));
            }
        }
    }
}
