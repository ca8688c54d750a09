//! Terminal rendering for CLI commands

use std::time::Duration;

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::collection::Collection;
use crate::cookies::CookieJar;
use crate::environment::EnvironmentStore;
use crate::history::HistoryEntry;
use crate::request::RequestDefinition;
use crate::runner::{RunObserver, RunResult, RunSummary, RunnerPhase, RunnerState};
use crate::scripting::{ConsoleEntry, ConsoleLevel, ScriptOutcome};
use crate::transport::TransportResult;

/// Progress bar driven by runner callbacks
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(total: u64, enabled: bool) -> Self {
        let bar = ProgressBar::new(total);
        if !enabled {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        let template = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(template);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for ProgressObserver {
    fn on_unit_start(&mut self, iteration: u32, request: &RequestDefinition, _state: &RunnerState) {
        self.bar
            .set_message(format!("#{} {} {}", iteration, request.method, request.display_name()));
    }

    fn on_unit_complete(&mut self, result: &RunResult, _state: &RunnerState) {
        self.bar.inc(1);
        if !result.passed() {
            let reason = result.error.clone().unwrap_or_else(|| {
                format!("{} test(s) failed", result.tests_failed)
            });
            self.bar
                .println(format!("{} {} {}", style("✗").red(), result.name, style(reason).dim()));
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(columns: &[&str]) -> Vec<Cell> {
    columns
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

fn status_cell(status: Option<u16>) -> Cell {
    match status {
        Some(code) if code < 300 => Cell::new(code).fg(Color::Green),
        Some(code) if code < 400 => Cell::new(code).fg(Color::Yellow),
        Some(code) => Cell::new(code).fg(Color::Red),
        None => Cell::new("-").fg(Color::Red),
    }
}

pub fn results_table(results: &[RunResult]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["#", "Request", "Method", "Status", "Time", "Tests", "Result"]));
    for result in results {
        let outcome = if result.passed() {
            Cell::new("PASS").fg(Color::Green)
        } else {
            Cell::new("FAIL").fg(Color::Red)
        };
        let detail = match &result.error {
            Some(error) => error.clone(),
            None => format!("{}/{}", result.tests_passed, result.tests_passed + result.tests_failed),
        };
        table.add_row(vec![
            Cell::new(result.iteration),
            Cell::new(&result.name),
            Cell::new(&result.method),
            status_cell(result.status),
            Cell::new(format!("{} ms", result.duration)),
            Cell::new(detail),
            outcome,
        ]);
    }
    table
}

pub fn summary_line(summary: &RunSummary) -> String {
    let phase = match summary.phase {
        RunnerPhase::Stopped => style("stopped").yellow().to_string(),
        _ => style("completed").green().to_string(),
    };
    format!(
        "Run {}: {} passed, {} failed, {} skipped | tests {} passed, {} failed | {} ms total, {} ms avg",
        phase,
        style(summary.passed).green(),
        style(summary.failed).red(),
        style(summary.skipped).yellow(),
        summary.tests_passed,
        summary.tests_failed,
        summary.total_duration,
        summary.average_duration
    )
}

pub fn test_lines(outcome: &ScriptOutcome) -> Vec<String> {
    outcome
        .results
        .iter()
        .map(|test| match &test.error {
            None => format!("  {} {}", style("✓").green(), test.name),
            Some(error) => format!("  {} {}: {}", style("✗").red(), test.name, error),
        })
        .collect()
}

pub fn console_lines(entries: &[ConsoleEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let level = match entry.level {
                ConsoleLevel::Error => style(entry.level.as_str()).red(),
                ConsoleLevel::Warn => style(entry.level.as_str()).yellow(),
                _ => style(entry.level.as_str()).dim(),
            };
            format!("[{}] {} {}", entry.source.as_str(), level, entry.message)
        })
        .collect()
}

pub fn response_status_line(result: &TransportResult) -> String {
    let code = match result.status {
        200..=299 => style(result.status).green(),
        300..=399 => style(result.status).yellow(),
        _ => style(result.status).red(),
    };
    format!(
        "{} {} ({} ms, {} bytes)",
        code, result.status_text, result.duration_ms, result.size_bytes
    )
}

pub fn environments_table(env: &EnvironmentStore, values: bool) -> Table {
    let mut table = new_table();
    if values {
        table.set_header(header(&["#", "Environment", "Variable", "Value"]));
    } else {
        table.set_header(header(&["#", "Environment", "Variables"]));
    }
    for (index, environment) in env.environments().iter().enumerate() {
        let name = if index == env.active_index() {
            Cell::new(format!("{} *", environment.name)).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&environment.name)
        };
        if values {
            if environment.variables.is_empty() {
                table.add_row(vec![Cell::new(index + 1), name.clone(), Cell::new(""), Cell::new("")]);
            }
            for (i, (key, value)) in environment.variables.iter().enumerate() {
                let label = if i == 0 { name.clone() } else { Cell::new("") };
                table.add_row(vec![Cell::new(index + 1), label, Cell::new(key), Cell::new(value)]);
            }
        } else {
            table.add_row(vec![Cell::new(index + 1), name, Cell::new(environment.variables.len())]);
        }
    }
    table
}

pub fn cookies_table(jar: &CookieJar, domain: Option<&str>) -> Table {
    let mut table = new_table();
    table.set_header(header(&["Domain", "Name", "Value", "Path", "Expires", "Flags"]));
    for d in jar.domains() {
        if domain.is_some_and(|wanted| wanted != d) {
            continue;
        }
        for cookie in jar.cookies_in(d) {
            let expires = match cookie.expires {
                Some(at) => at.to_rfc3339(),
                None => "session".to_string(),
            };
            let mut flags = Vec::new();
            if cookie.http_only {
                flags.push("HttpOnly");
            }
            if cookie.secure {
                flags.push("Secure");
            }
            flags.push(cookie.same_site.as_str());
            table.add_row(vec![
                Cell::new(d),
                Cell::new(&cookie.name),
                Cell::new(&cookie.value),
                Cell::new(&cookie.path),
                Cell::new(expires),
                Cell::new(flags.join(" ")),
            ]);
        }
    }
    table
}

pub fn collections_table(collections: &[Collection]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["#", "Collection", "Requests"]));
    for (index, collection) in collections.iter().enumerate() {
        let names: Vec<String> = collection
            .requests
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {} {}", i + 1, r.method, r.display_name()))
            .collect();
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(&collection.name),
            Cell::new(names.join("\n")),
        ]);
    }
    table
}

pub fn history_table(entries: &[HistoryEntry]) -> Table {
    let mut table = new_table();
    table.set_header(header(&["When", "Method", "URL", "Status", "Time"]));
    for entry in entries {
        let time = entry
            .duration_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&entry.method),
            Cell::new(&entry.url),
            status_cell(entry.status),
            Cell::new(time),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;
    use crate::environment::Environment;
    use crate::scripting::TestResult;

    #[test]
    fn test_results_table_contents() {
        let result = RunResult {
            name: "Login".into(),
            method: "POST".into(),
            url: "https://api.test/login".into(),
            iteration: 1,
            request_index: 0,
            status: None,
            status_text: String::new(),
            duration: 12,
            success: false,
            error: Some("connection refused".into()),
            tests_passed: 0,
            tests_failed: 0,
            tests: vec![],
        };
        let rendered = results_table(&[result]).to_string();
        assert!(rendered.contains("Login"));
        assert!(rendered.contains("connection refused"));
        assert!(rendered.contains("FAIL"));
    }

    #[test]
    fn test_environment_and_cookie_tables() {
        let env = EnvironmentStore::new(
            vec![Environment::new("dev").with_variable("base", "http://x"), Environment::new("prod")],
            0,
        );
        let rendered = environments_table(&env, true).to_string();
        assert!(rendered.contains("dev *"));
        assert!(rendered.contains("base"));

        let mut jar = CookieJar::new();
        jar.store(Cookie::new("sid", "abc", "api.test"));
        jar.store(Cookie::new("other", "1", "else.test"));
        let rendered = cookies_table(&jar, Some("api.test")).to_string();
        assert!(rendered.contains("sid"));
        assert!(!rendered.contains("other"));
    }

    #[test]
    fn test_test_lines() {
        let outcome = ScriptOutcome::from_results(vec![
            TestResult::pass("ok"),
            TestResult::fail("bad", "Expected 1 but got 2"),
        ]);
        let lines = test_lines(&outcome);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Expected 1 but got 2"));
    }
}

