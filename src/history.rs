//! Request history
//!
//! Every single request that received a response is recorded, newest first.
//! Collection runs are not recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::Execution;

/// Maximum number of entries kept
pub const HISTORY_LIMIT: usize = 100;

/// A single sent request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            url: url.into(),
            status: None,
            duration_ms: None,
            timestamp: Utc::now(),
        }
    }

    /// Entry for an execution, `None` when no response was received
    pub fn from_execution(execution: &Execution) -> Option<Self> {
        let response = execution.response.as_ref().filter(|_| execution.is_success())?;
        let request = execution.request.as_ref()?;
        Some(Self {
            status: Some(response.status),
            duration_ms: Some(response.duration_ms),
            ..Self::new(request.method.clone(), request.url.clone())
        })
    }
}

/// Put `entry` first and drop anything past [`HISTORY_LIMIT`]
pub fn push(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    entries.insert(0, entry);
    entries.truncate(HISTORY_LIMIT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::engine::tests::{engine_with, ScriptedTransport};
    use crate::request::RequestDefinition;

    #[tokio::test]
    async fn test_entry_only_for_received_responses() {
        let transport = Arc::new(ScriptedTransport {
            fail_urls: vec!["/down".into()],
            ..ScriptedTransport::default()
        });
        let (mut engine, _) = engine_with(transport);

        let sent = engine
            .execute(&RequestDefinition::new("get", "{{base}}/items?page=2"))
            .await
            .unwrap();
        let entry = HistoryEntry::from_execution(&sent).unwrap();
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.url, "https://dev.test/items?page=2");
        assert_eq!(entry.status, Some(200));
        assert_eq!(entry.duration_ms, Some(5));

        let failed = engine
            .execute(&RequestDefinition::new("GET", "{{base}}/down"))
            .await
            .unwrap();
        assert!(HistoryEntry::from_execution(&failed).is_none());
    }

    #[test]
    fn test_push_newest_first() {
        let mut entries = Vec::new();
        push(&mut entries, HistoryEntry::new("GET", "https://a.test"));
        push(&mut entries, HistoryEntry::new("POST", "https://b.test"));
        assert_eq!(entries[0].url, "https://b.test");
        assert_eq!(entries[1].url, "https://a.test");
    }

    #[test]
    fn test_push_caps_length() {
        let mut entries = Vec::new();
        for n in 0..HISTORY_LIMIT + 5 {
            push(&mut entries, HistoryEntry::new("GET", format!("https://x.test/{}", n)));
        }
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0].url, format!("https://x.test/{}", HISTORY_LIMIT + 4));
        assert_eq!(entries[HISTORY_LIMIT - 1].url, "https://x.test/5");
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let mut entry = HistoryEntry::new("GET", "https://a.test");
        entry.duration_ms = Some(12);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["durationMs"], 12);
        assert!(value["status"].is_null());
    }
}
