//! Compose a transport-ready request from a definition
//!
//! Building is pure: it reads the environment and cookie jar but performs no
//! I/O. Steps run in a fixed order (URL, headers, auth, cookies, query, body)
//! so the same inputs always produce the same request.

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::auth;
use crate::cookies::CookieJar;
use crate::environment::EnvironmentStore;

use super::definition::{Body, FormField, FormFieldKind, RequestDefinition};

/// Characters left intact by JavaScript's `encodeURIComponent`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a query key or value
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// A multipart field after substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalFormField {
    pub key: String,
    pub value: String,
    pub kind: FormFieldKind,
    pub filename: Option<String>,
}

/// Request body variants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum RequestBody {
    #[default]
    None,
    Text(String),
    Form(Vec<FinalFormField>),
}

/// Exactly what must be sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalRequest {
    pub method: String,
    /// Full URL including the query string
    pub url: String,
    /// Substituted URL before the query string was appended
    pub resolved_url: String,
    pub headers: IndexMap<String, String>,
    pub body: RequestBody,
}

impl FinalRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Form(_))
    }
}

/// Insert a header, replacing any existing value whose name matches
/// case-insensitively. The first-seen spelling of the name is kept.
fn set_header(headers: &mut IndexMap<String, String>, key: String, value: String) {
    match headers.keys().position(|existing| existing.eq_ignore_ascii_case(&key)) {
        Some(index) => {
            if let Some((_, slot)) = headers.get_index_mut(index) {
                *slot = value;
            }
        }
        None => {
            headers.insert(key, value);
        }
    }
}

/// Substitute a URL and default its scheme to `https://`
pub fn resolve_url(url: &str, env: &EnvironmentStore) -> String {
    let url = env.substitute(url.trim());
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url
    } else {
        format!("https://{}", url)
    }
}

fn file_name_of(path: &str) -> Option<String> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn build_form(fields: &[FormField], env: &EnvironmentStore) -> Vec<FinalFormField> {
    fields
        .iter()
        .filter(|field| field.enabled && !field.key.trim().is_empty())
        .map(|field| {
            let key = env.substitute(field.key.trim());
            match field.kind {
                FormFieldKind::Text => FinalFormField {
                    key,
                    value: env.substitute(&field.value),
                    kind: FormFieldKind::Text,
                    filename: None,
                },
                FormFieldKind::File => FinalFormField {
                    key,
                    value: field.value.clone(),
                    kind: FormFieldKind::File,
                    filename: field.filename.clone().or_else(|| file_name_of(&field.value)),
                },
            }
        })
        .collect()
}

/// Build the request described by `definition` against the active
/// environment and the cookie jar.
pub fn build(definition: &RequestDefinition, env: &EnvironmentStore, jar: &CookieJar) -> FinalRequest {
    let method = definition.method.trim().to_ascii_uppercase();
    let resolved_url = resolve_url(&definition.url, env);

    let mut headers = IndexMap::new();
    for row in definition.headers.iter().filter(|row| row.enabled) {
        let key = env.substitute(row.key.trim());
        if key.is_empty() {
            continue;
        }
        set_header(&mut headers, key, env.substitute(row.value.trim()));
    }

    let auth = auth::resolve(&definition.auth, env);
    for (key, value) in auth.headers {
        set_header(&mut headers, key, value);
    }

    if !headers.keys().any(|key| key.eq_ignore_ascii_case("cookie")) {
        let cookie_header = jar.build_cookie_header(&resolved_url);
        if !cookie_header.is_empty() {
            headers.insert("Cookie".to_string(), cookie_header);
        }
    }

    let mut query: Vec<String> = Vec::new();
    for row in definition.params.iter().filter(|row| row.enabled) {
        let key = env.substitute(row.key.trim());
        if key.is_empty() {
            continue;
        }
        let value = env.substitute(row.value.trim());
        query.push(format!("{}={}", encode_component(&key), encode_component(&value)));
    }
    for (key, value) in &auth.query_params {
        query.push(format!("{}={}", encode_component(key), encode_component(value)));
    }

    let mut url = resolved_url.clone();
    if !query.is_empty() {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&query.join("&"));
    }

    let body = if method == "GET" || method == "HEAD" {
        RequestBody::None
    } else {
        match &definition.body {
            Body::None => RequestBody::None,
            Body::Text(text) | Body::Json(text) => RequestBody::Text(env.substitute(text)),
            Body::FormData(fields) => RequestBody::Form(build_form(fields, env)),
        }
    };

    FinalRequest {
        method,
        url,
        resolved_url,
        headers,
        body,
    }
}
