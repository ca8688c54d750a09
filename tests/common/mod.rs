//! Common test utilities for bolt integration tests
//!
//! - an isolated data directory per test
//! - CLI invocation through assert_cmd
//! - collection fixtures pointing at a wiremock server

#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Isolated data and config directories for one CLI test
pub struct Workdir {
    pub dir: TempDir,
}

impl Default for Workdir {
    fn default() -> Self {
        Self::new()
    }
}

impl Workdir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Path inside the temp dir
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `bolt` with the data dir and a nonexistent config file preset
    pub fn bolt(&self) -> Command {
        let mut cmd = Command::cargo_bin("bolt").expect("bolt binary is built");
        cmd.env_remove("BOLT_LOG")
            .env("NO_COLOR", "1")
            .arg("--data-dir")
            .arg(self.data_dir())
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }

    /// Write a JSON document and import it
    pub fn import(&self, document: &Value) {
        let file = self.path("collection.json");
        std::fs::write(&file, serde_json::to_string_pretty(document).unwrap()).unwrap();
        self.bolt().arg("import").arg(&file).assert().success();
    }

    pub fn read_json(&self, name: &str) -> Value {
        let content = std::fs::read_to_string(self.data_dir().join(name)).expect("stored document exists");
        serde_json::from_str(&content).expect("stored document is JSON")
    }
}

/// A login + profile collection against `base`
pub fn auth_flow_collection(name: &str) -> Value {
    json!({
        "name": name,
        "requests": [
            {
                "name": "Login",
                "method": "POST",
                "url": "{{base}}/login",
                "headers": {"Content-Type": "application/json"},
                "body": "{\"user\":\"{{user}}\"}",
                "testScript": "bx.test('logged in', () => bx.expect(bx.response.status).toBe(200)); bx.setEnv('token', bx.response.json().token);"
            },
            {
                "name": "Profile",
                "method": "GET",
                "url": "{{base}}/profile",
                "auth": {"type": "bearer", "token": "{{token}}"},
                "testScript": "bx.test('has name', () => bx.expect(bx.response.json().name).toBe('ada'));"
            }
        ]
    })
}
