//! Collections of stored requests

use serde::{Deserialize, Serialize};

use crate::errors::{BoltError, Result};
use crate::request::RequestDefinition;

/// A named, ordered list of requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub requests: Vec<RequestDefinition>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requests: Vec::new(),
        }
    }

    pub fn with_request(mut self, request: RequestDefinition) -> Self {
        self.requests.push(request);
        self
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Find a request by exact name, or by 1-based position
    pub fn resolve(&self, selector: &str) -> Option<usize> {
        if let Some(index) = self.requests.iter().position(|r| r.name == selector) {
            return Some(index);
        }
        position(selector, self.requests.len())
    }
}

fn position(selector: &str, len: usize) -> Option<usize> {
    match selector.parse::<usize>() {
        Ok(n) if n >= 1 && n <= len => Some(n - 1),
        _ => None,
    }
}

/// Find a collection by exact name, or by 1-based position
pub fn resolve_collection(collections: &[Collection], selector: &str) -> Option<usize> {
    if let Some(index) = collections.iter().position(|c| c.name == selector) {
        return Some(index);
    }
    position(selector, collections.len())
}

/// Parse a collection file holding either one collection or a list of them
pub fn parse_collections(text: &str) -> Result<Vec<Collection>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Document {
        Many(Vec<Collection>),
        One(Collection),
    }

    let document: Document = serde_json::from_str(text)
        .map_err(|e| BoltError::Collection(format!("not a collection document: {}", e)))?;
    Ok(match document {
        Document::Many(collections) => collections,
        Document::One(collection) => vec![collection],
    })
}
