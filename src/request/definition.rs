//! Stored request shapes
//!
//! These mirror what a collection file holds. The engine only ever reads
//! them.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::AuthConfig;

fn default_true() -> bool {
    true
}

fn default_method() -> String {
    "GET".to_string()
}

/// A header or query-parameter row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Rows are stored either as a list of `{key, value, enabled}` or as a plain
/// object mapping key to value.
fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<KeyValue>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Rows {
        List(Vec<KeyValue>),
        Map(IndexMap<String, String>),
        Missing(()),
    }

    Ok(match Rows::deserialize(deserializer)? {
        Rows::List(rows) => rows,
        Rows::Map(map) => map.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect(),
        Rows::Missing(()) => Vec::new(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    #[default]
    Text,
    File,
}

/// One multipart field; for `File` fields `value` is a local path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, rename = "type", alias = "field_type")]
    pub kind: FormFieldKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl FormField {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind: FormFieldKind::Text,
            enabled: true,
            filename: None,
        }
    }

    pub fn file(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: path.into(),
            kind: FormFieldKind::File,
            enabled: true,
            filename: None,
        }
    }
}

/// Request body variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Body {
    #[default]
    None,
    Text(String),
    Json(String),
    #[serde(rename = "formdata")]
    FormData(Vec<FormField>),
}

impl Body {
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }
}

/// A bare string body is treated as text; an empty one as no body.
fn deserialize_body<'de, D>(deserializer: D) -> Result<Body, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Raw(String),
        Tagged(Body),
        Missing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Raw(text) if text.is_empty() => Body::None,
        Repr::Raw(text) => Body::Text(text),
        Repr::Tagged(body) => body,
        Repr::Missing(()) => Body::None,
    })
}

/// A stored request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub headers: Vec<KeyValue>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub params: Vec<KeyValue>,
    #[serde(default, deserialize_with = "deserialize_body", skip_serializing_if = "Body::is_none")]
    pub body: Body,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pre_script: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_script: String,
}

impl Default for RequestDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            method: default_method(),
            url: String::new(),
            headers: Vec::new(),
            params: Vec::new(),
            body: Body::None,
            auth: AuthConfig::None,
            pre_script: String::new(),
            test_script: String::new(),
        }
    }
}

impl RequestDefinition {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Label used in run reports: the name, or the raw URL when unnamed
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}
