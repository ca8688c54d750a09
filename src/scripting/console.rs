//! Captured `console.*` output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub fn parse(level: &str) -> Self {
        match level {
            "info" => ConsoleLevel::Info,
            "warn" => ConsoleLevel::Warn,
            "error" => ConsoleLevel::Error,
            "debug" => ConsoleLevel::Debug,
            _ => ConsoleLevel::Log,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }
}

/// Which script produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptSource {
    #[serde(rename = "pre-request")]
    PreRequest,
    #[serde(rename = "test")]
    Test,
}

impl ScriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptSource::PreRequest => "pre-request",
            ScriptSource::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    pub level: ConsoleLevel,
    pub message: String,
    pub source: ScriptSource,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleEntry {
    pub fn new(level: ConsoleLevel, message: impl Into<String>, source: ScriptSource) -> Self {
        Self {
            level,
            message: message.into(),
            source,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only log shared by every script a sandbox runs
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    entries: Vec<ConsoleEntry>,
}

impl ConsoleLog {
    pub fn push(&mut self, entry: ConsoleEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ConsoleEntry>) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[ConsoleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Take every entry, leaving the log empty
    pub fn drain(&mut self) -> Vec<ConsoleEntry> {
        std::mem::take(&mut self.entries)
    }
}
