//! Test-script results

use serde::{Deserialize, Serialize};

/// Name used for an exception thrown outside any `bx.test` call
pub const SCRIPT_EXECUTION: &str = "Script execution";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestResult>,
}

impl ScriptOutcome {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn push(&mut self, result: TestResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
