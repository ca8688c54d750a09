//! Run reports
//!
//! JSON export of a finished run, and JUnit XML for CI systems.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use junit_report::{Duration, Report, TestCase, TestSuite};
use serde_json::{json, Value as JsonValue};
use time::OffsetDateTime;

use super::{RunResult, RunSummary};
use crate::errors::{BoltError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    JUnit,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "junit" | "xml" => Some(Self::JUnit),
            _ => None,
        }
    }

    /// Guess from the output file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => Self::JUnit,
            _ => Self::Json,
        }
    }
}

/// Build the export document for a run
pub fn export_json(
    collection: &str,
    summary: &RunSummary,
    results: &[RunResult],
    timestamp: DateTime<Utc>,
) -> JsonValue {
    json!({
        "collection": collection,
        "timestamp": timestamp.to_rfc3339(),
        "summary": {
            "totalRequests": summary.total_requests,
            "passed": summary.passed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "totalDuration": summary.total_duration,
            "averageDuration": summary.average_duration,
            "testsPassed": summary.tests_passed,
            "testsFailed": summary.tests_failed,
        },
        "results": results,
    })
}

/// Render a run as JUnit XML
pub fn junit_xml(collection: &str, results: &[RunResult], skipped: usize) -> Result<String> {
    let mut suite = TestSuite::new(collection);
    suite.set_timestamp(OffsetDateTime::now_utc());

    let classname = sanitize_classname(collection);
    for result in results {
        suite.add_testcase(build_test_case(result, &classname));
    }
    for n in 1..=skipped {
        let mut tc = TestCase::skipped(&format!("skipped #{}", n));
        tc.set_classname(&classname);
        suite.add_testcase(tc);
    }

    let mut report = Report::new();
    report.add_testsuite(suite);

    let mut out = Vec::new();
    report
        .write_xml(&mut out)
        .map_err(|e| BoltError::Storage(format!("Failed to write JUnit XML: {}", e)))?;
    String::from_utf8(out).map_err(|e| BoltError::Storage(e.to_string()))
}

fn case_name(result: &RunResult) -> String {
    format!("{} [iteration {}]", result.name, result.iteration)
}

fn build_test_case(result: &RunResult, classname: &str) -> TestCase {
    let duration = Duration::milliseconds(result.duration as i64);
    let name = case_name(result);
    let status = result
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut tc = if let Some(error) = &result.error {
        let message = format!("{}\nRequest: {} {}\nStatus: {}", error, result.method, result.url, status);
        TestCase::error(&name, duration, "ExecutionError", &message)
    } else if result.tests_failed > 0 {
        let failures: Vec<String> = result
            .tests
            .iter()
            .filter(|t| !t.passed)
            .map(|t| format!("{}: {}", t.name, t.error.as_deref().unwrap_or("failed")))
            .collect();
        let message = format!(
            "Test failures:\n{}\n\nRequest: {} {}\nStatus: {}",
            failures.join("\n"),
            result.method,
            result.url,
            status
        );
        TestCase::failure(&name, duration, "AssertionFailure", &message)
    } else {
        TestCase::success(&name, duration)
    };
    tc.set_classname(classname);
    tc
}

fn sanitize_classname(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Write a report in the given format
pub fn write_report(
    path: &Path,
    format: ReportFormat,
    collection: &str,
    summary: &RunSummary,
    results: &[RunResult],
) -> Result<()> {
    let content = match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(&export_json(collection, summary, results, Utc::now()))?
        }
        ReportFormat::JUnit => junit_xml(collection, results, summary.skipped)?,
    };
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerPhase;
    use crate::scripting::TestResult;

    fn result(name: &str, status: Option<u16>, error: Option<&str>, tests: Vec<TestResult>) -> RunResult {
        let failed = tests.iter().filter(|t| !t.passed).count();
        RunResult {
            name: name.to_string(),
            method: "GET".to_string(),
            url: "https://api.test/items".to_string(),
            iteration: 1,
            request_index: 0,
            status,
            status_text: if status.is_some() { "OK".into() } else { String::new() },
            duration: 120,
            success: error.is_none(),
            error: error.map(str::to_string),
            tests_passed: tests.len() - failed,
            tests_failed: failed,
            tests,
        }
    }

    fn sample() -> (RunSummary, Vec<RunResult>) {
        let results = vec![
            result("List items", Some(200), None, vec![TestResult::pass("status is 200")]),
            result(
                "Get item",
                Some(404),
                None,
                vec![TestResult::fail("status is 200", "Expected 200 but got 404")],
            ),
            result("Broken", None, Some("connection refused"), vec![]),
        ];
        let summary = RunSummary {
            total_requests: 3,
            passed: 1,
            failed: 2,
            skipped: 1,
            total_duration: 360,
            average_duration: 120,
            tests_passed: 1,
            tests_failed: 1,
            phase: RunnerPhase::Stopped,
            failure: None,
        };
        (summary, results)
    }

    #[test]
    fn test_export_json_shape() {
        let (summary, results) = sample();
        let timestamp = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let doc = export_json("Items API", &summary, &results, timestamp);

        assert_eq!(doc["collection"], "Items API");
        assert_eq!(doc["timestamp"], "2026-01-02T03:04:05+00:00");
        assert_eq!(doc["summary"]["totalRequests"], 3);
        assert_eq!(doc["summary"]["averageDuration"], 120);
        assert_eq!(doc["summary"]["testsFailed"], 1);

        let first = &doc["results"][0];
        assert_eq!(first["statusText"], "OK");
        assert_eq!(first["duration"], 120);
        assert_eq!(first["tests"][0]["name"], "status is 200");
        assert!(first.get("requestIndex").is_none());

        let broken = &doc["results"][2];
        assert!(broken["status"].is_null());
        assert_eq!(broken["error"], "connection refused");
        assert_eq!(broken["success"], false);
    }

    #[test]
    fn test_junit_xml() {
        let (summary, results) = sample();
        let xml = junit_xml("Items API", &results, summary.skipped).unwrap();

        assert!(xml.contains("testsuites"));
        assert!(xml.contains("Items_API"));
        assert!(xml.contains("List items [iteration 1]"));
        assert!(xml.contains("AssertionFailure"));
        assert!(xml.contains("ExecutionError"));
        assert!(xml.contains("skipped"));
    }

    #[test]
    fn test_report_format() {
        assert_eq!(ReportFormat::parse("JUnit"), Some(ReportFormat::JUnit));
        assert_eq!(ReportFormat::parse("tap"), None);
        assert_eq!(ReportFormat::from_path(Path::new("out.XML")), ReportFormat::JUnit);
        assert_eq!(ReportFormat::from_path(Path::new("out.json")), ReportFormat::Json);
    }

    #[test]
    fn test_write_report_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("run.json");
        let (summary, results) = sample();
        write_report(&path, ReportFormat::Json, "Items API", &summary, &results).unwrap();

        let doc: JsonValue = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["results"].as_array().unwrap().len(), 3);
    }
}
