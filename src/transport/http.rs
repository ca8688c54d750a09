//! reqwest-backed transport

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::{debug, warn};

use super::{Timing, Transport, TransportError, TransportResult};
use crate::request::{FinalFormField, FinalRequest, FormFieldKind, RequestBody};

pub const USER_AGENT_STRING: &str = concat!("Bolt/", env!("CARGO_PKG_VERSION"));

/// Default timeout for plain requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport over a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Multipart uploads get twice the configured timeout
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT_STRING)
            .referer(false)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn headers(request: &FinalRequest) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        let multipart = request.is_multipart();

        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            // multipart sets its own Content-Type with the boundary
            if multipart && header_name == CONTENT_TYPE {
                continue;
            }
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    async fn form(fields: &[FinalFormField]) -> Result<Form, TransportError> {
        let mut form = Form::new();

        for field in fields {
            match field.kind {
                FormFieldKind::Text => {
                    form = form.text(field.key.clone(), field.value.clone());
                }
                FormFieldKind::File => {
                    let path = Path::new(&field.value);
                    let contents = tokio::fs::read(path).await.map_err(|source| TransportError::File {
                        path: field.value.clone(),
                        source,
                    })?;

                    let filename = field
                        .filename
                        .clone()
                        .or_else(|| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
                        .unwrap_or_else(|| "file".to_string());
                    let mime = mime_guess::from_path(path).first_or_octet_stream();

                    let part = Part::bytes(contents)
                        .file_name(filename)
                        .mime_str(mime.as_ref())?;
                    form = form.part(field.key.clone(), part);
                }
            }
        }

        Ok(form)
    }
}

/// Collapse response headers into one value per name; repeated headers are
/// joined with ", " in arrival order.
fn fold_headers(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut folded: IndexMap<String, String> = IndexMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        folded
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    folded
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FinalRequest) -> Result<TransportResult, TransportError> {
        let total_start = Instant::now();

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;
        let headers = Self::headers(request)?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .timeout(self.timeout);

        match &request.body {
            RequestBody::None => {}
            RequestBody::Text(text) => {
                builder = builder.body(text.clone());
            }
            RequestBody::Form(fields) => {
                builder = builder.multipart(Self::form(fields).await?).timeout(self.timeout * 2);
            }
        }

        debug!(method = %request.method, url = %request.url, "sending request");

        let send_start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "request failed");
            e
        })?;
        let ttfb = millis(send_start.elapsed());

        let status = response.status();
        let headers = fold_headers(response.headers());

        let download_start = Instant::now();
        let bytes = response.bytes().await?;
        let download = millis(download_start.elapsed());
        let total = millis(total_start.elapsed());

        debug!(status = status.as_u16(), size = bytes.len(), total_ms = total, "response received");

        Ok(TransportResult {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            duration_ms: total,
            size_bytes: bytes.len() as u64,
            timing: Timing::estimate(ttfb, download, total),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2; Path=/"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let folded = fold_headers(&headers);
        assert_eq!(folded["set-cookie"], "a=1, b=2; Path=/");
        assert_eq!(folded["content-type"], "text/plain");
    }

    #[test]
    fn test_multipart_skips_content_type() {
        let request = FinalRequest {
            method: "POST".into(),
            url: "https://x.test/".into(),
            resolved_url: "https://x.test/".into(),
            headers: IndexMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Trace".to_string(), "1".to_string()),
            ]),
            body: RequestBody::Form(Vec::new()),
        };
        let headers = HttpTransport::headers(&request).unwrap();
        assert!(headers.get(CONTENT_TYPE).is_none());
        assert_eq!(headers.get("x-trace").unwrap(), "1");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let request = FinalRequest {
            method: "GET".into(),
            url: "https://x.test/".into(),
            resolved_url: "https://x.test/".into(),
            headers: IndexMap::from([("bad header".to_string(), "v".to_string())]),
            body: RequestBody::None,
        };
        assert!(matches!(
            HttpTransport::headers(&request),
            Err(TransportError::InvalidHeader { .. })
        ));
    }
}
