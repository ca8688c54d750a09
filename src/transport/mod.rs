//! The outbound side of the engine
//!
//! The engine only talks to a [`Transport`]; the reqwest-backed
//! [`HttpTransport`] is the production implementation and tests substitute
//! their own.

mod http;

pub use http::{HttpTransport, USER_AGENT_STRING};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::FinalRequest;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("unsupported method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to read file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Where the time went, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub connect: u64,
    pub ttfb: u64,
    pub download: u64,
    pub total: u64,
}

impl Timing {
    /// Split a measured time-to-first-byte into connect and server time.
    ///
    /// reqwest does not expose connection phases, so when the first byte took
    /// longer than 10 ms, 40% of it is attributed to connection setup.
    pub fn estimate(ttfb: u64, download: u64, total: u64) -> Self {
        let connect = if ttfb > 10 { ttfb * 40 / 100 } else { 0 };
        Self {
            connect,
            ttfb: ttfb.saturating_sub(connect),
            download,
            total,
        }
    }
}

/// Outcome of one network call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResult {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
    pub size_bytes: u64,
    pub timing: Timing,
    /// Set when the call failed; nothing else is meaningful then
    pub error: Option<String>,
}

impl TransportResult {
    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            status: 0,
            status_text: "Error".to_string(),
            duration_ms,
            timing: Timing {
                total: duration_ms,
                ..Timing::default()
            },
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Performs the network call for a finalized request.
///
/// Implementations return `Err` for failures that prevented a response; the
/// caller records those as errored results.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FinalRequest) -> Result<TransportResult, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_estimate_splits_ttfb() {
        let timing = Timing::estimate(100, 5, 110);
        assert_eq!(timing.connect, 40);
        assert_eq!(timing.ttfb, 60);
        assert_eq!(timing.download, 5);
        assert_eq!(timing.total, 110);
    }

    #[test]
    fn test_timing_estimate_fast_response() {
        let timing = Timing::estimate(8, 1, 9);
        assert_eq!(timing.connect, 0);
        assert_eq!(timing.ttfb, 8);
    }

    #[test]
    fn test_failed_result() {
        let result = TransportResult::failed("connection refused", 12);
        assert!(result.is_error());
        assert_eq!(result.status, 0);
        assert_eq!(result.timing.total, 12);
    }
}
