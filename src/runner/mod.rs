//! Collection runner
//!
//! Replays the selected requests of a collection across iterations,
//! strictly one at a time:
//!
//! ```text
//! Idle -> Configuring -> Running -> Completed
//!                                -> Stopped
//! ```
//!
//! Scripts of one unit may set variables read by the next, so units never
//! overlap. Cancellation is checked before each unit and during the delay
//! between units; a request already in flight always completes.

pub mod report;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collection::Collection;
use crate::engine::{Engine, Execution};
use crate::environment::EnvironmentStore;
use crate::request::RequestDefinition;
use crate::scripting::TestResult;

/// Runner errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("runner is not configured")]
    NotConfigured,

    #[error("select at least one request")]
    NothingSelected,

    #[error("iterations must be at least 1")]
    InvalidIterations,

    #[error("environment index {index} out of range ({len} environments)")]
    EnvironmentOutOfRange { index: usize, len: usize },

    #[error("request {index} out of range ({len} requests)")]
    RequestOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerPhase {
    Idle,
    Configuring,
    Running,
    Completed,
    Stopped,
}

/// Settings collected while configuring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub environment: usize,
    pub iterations: u32,
    pub delay: Duration,
    /// One flag per collection request
    pub selected: Vec<bool>,
}

impl RunConfig {
    /// Selected request indices in collection order
    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected
            .iter()
            .enumerate()
            .filter(|(_, selected)| **selected)
            .map(|(index, _)| index)
            .collect()
    }
}

/// One row per executed (request, iteration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub name: String,
    pub method: String,
    pub url: String,
    pub iteration: u32,
    #[serde(skip)]
    pub request_index: usize,
    pub status: Option<u16>,
    pub status_text: String,
    pub duration: u64,
    pub success: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub tests_passed: usize,
    #[serde(skip)]
    pub tests_failed: usize,
    pub tests: Vec<TestResult>,
}

impl RunResult {
    fn from_execution(
        definition: &RequestDefinition,
        request_index: usize,
        iteration: u32,
        execution: Execution,
    ) -> Self {
        let status = execution.status();
        let status_text = match (&status, &execution.response) {
            (Some(_), Some(response)) => response.status_text.clone(),
            _ => String::new(),
        };
        Self {
            name: definition.display_name().to_string(),
            method: definition.method.trim().to_ascii_uppercase(),
            url: execution.url,
            iteration,
            request_index,
            status,
            status_text,
            duration: execution.duration_ms,
            success: execution.error.is_none(),
            error: execution.error,
            tests_passed: execution.outcome.passed,
            tests_failed: execution.outcome.failed,
            tests: execution.outcome.results,
        }
    }

    /// Received a response and no test failed
    pub fn passed(&self) -> bool {
        self.success && self.tests_failed == 0
    }
}

/// Live counters for the current run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerState {
    pub running: bool,
    pub aborted: bool,
    pub results: Vec<RunResult>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Units planned for the run
    pub total: usize,
}

impl RunnerState {
    pub fn completed(&self) -> usize {
        self.results.len()
    }
}

/// Aggregate numbers for a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_requests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration: u64,
    pub average_duration: u64,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub phase: RunnerPhase,
    /// Set when the run was stopped by an infrastructure failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RunSummary {
    pub fn from_state(state: &RunnerState, phase: RunnerPhase, failure: Option<String>) -> Self {
        let total_duration: u64 = state.results.iter().map(|r| r.duration).sum();
        let executed = state.results.len() as u64;
        Self {
            total_requests: state.results.len(),
            passed: state.passed,
            failed: state.failed,
            skipped: state.skipped,
            total_duration,
            average_duration: if executed == 0 {
                0
            } else {
                (total_duration as f64 / executed as f64).round() as u64
            },
            tests_passed: state.results.iter().map(|r| r.tests_passed).sum(),
            tests_failed: state.results.iter().map(|r| r.tests_failed).sum(),
            phase,
            failure,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.failure.is_none()
    }
}

/// Progress callbacks, invoked between units
pub trait RunObserver {
    fn on_unit_start(&mut self, _iteration: u32, _request: &RequestDefinition, _state: &RunnerState) {}

    fn on_unit_complete(&mut self, _result: &RunResult, _state: &RunnerState) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Batch executor for one collection
#[derive(Debug)]
pub struct CollectionRunner {
    collection: Collection,
    phase: RunnerPhase,
    config: Option<RunConfig>,
    state: RunnerState,
    failure: Option<String>,
}

impl CollectionRunner {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            phase: RunnerPhase::Idle,
            config: None,
            state: RunnerState::default(),
            failure: None,
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn phase(&self) -> RunnerPhase {
        self.phase
    }

    pub fn config(&self) -> Option<&RunConfig> {
        self.config.as_ref()
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    pub fn results(&self) -> &[RunResult] {
        &self.state.results
    }

    /// Enter configuration with defaults: the active environment, one
    /// iteration, no delay, every request selected. Also used to run again
    /// after a finished run.
    pub fn open(&mut self, env: &EnvironmentStore) {
        self.config = Some(RunConfig {
            environment: env.active_index(),
            iterations: 1,
            delay: Duration::ZERO,
            selected: vec![true; self.collection.len()],
        });
        self.state = RunnerState::default();
        self.failure = None;
        self.phase = RunnerPhase::Configuring;
    }

    fn config_mut(&mut self) -> Result<&mut RunConfig, RunnerError> {
        match (self.phase, self.config.as_mut()) {
            (RunnerPhase::Configuring, Some(config)) => Ok(config),
            _ => Err(RunnerError::NotConfigured),
        }
    }

    pub fn set_environment(&mut self, index: usize, env: &EnvironmentStore) -> Result<(), RunnerError> {
        if index >= env.len() {
            return Err(RunnerError::EnvironmentOutOfRange { index, len: env.len() });
        }
        self.config_mut()?.environment = index;
        Ok(())
    }

    pub fn set_iterations(&mut self, iterations: u32) -> Result<(), RunnerError> {
        if iterations == 0 {
            return Err(RunnerError::InvalidIterations);
        }
        self.config_mut()?.iterations = iterations;
        Ok(())
    }

    pub fn set_delay(&mut self, delay: Duration) -> Result<(), RunnerError> {
        self.config_mut()?.delay = delay;
        Ok(())
    }

    /// Toggle one request by collection index
    pub fn select(&mut self, index: usize, selected: bool) -> Result<(), RunnerError> {
        let config = self.config_mut()?;
        let len = config.selected.len();
        let slot = config
            .selected
            .get_mut(index)
            .ok_or(RunnerError::RequestOutOfRange { index, len })?;
        *slot = selected;
        Ok(())
    }

    /// Select exactly the given requests
    pub fn select_only(&mut self, indices: &[usize]) -> Result<(), RunnerError> {
        let config = self.config_mut()?;
        let len = config.selected.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(RunnerError::RequestOutOfRange { index, len });
        }
        for (index, slot) in config.selected.iter_mut().enumerate() {
            *slot = indices.contains(&index);
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::from_state(&self.state, self.phase, self.failure.clone())
    }

    /// Execute the configured run.
    ///
    /// Errors only when the run cannot start; everything that happens once
    /// running is reflected in the returned summary.
    pub async fn run(
        &mut self,
        engine: &mut Engine,
        cancel: &CancellationToken,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary, RunnerError> {
        let config = match (self.phase, &self.config) {
            (RunnerPhase::Configuring, Some(config)) => config.clone(),
            _ => return Err(RunnerError::NotConfigured),
        };
        let indices = config.selected_indices();
        if indices.is_empty() {
            return Err(RunnerError::NothingSelected);
        }

        let original_env = engine.env().active_index();
        let env_count = engine.env().len();
        engine
            .env_mut()
            .switch_active(config.environment)
            .map_err(|_| RunnerError::EnvironmentOutOfRange {
                index: config.environment,
                len: env_count,
            })?;

        let total = indices.len() * config.iterations as usize;
        self.phase = RunnerPhase::Running;
        self.failure = None;
        self.state = RunnerState {
            running: true,
            total,
            ..RunnerState::default()
        };

        info!(
            collection = %self.collection.name,
            requests = indices.len(),
            iterations = config.iterations,
            "collection run started"
        );

        'iterations: for iteration in 1..=config.iterations {
            for (position, &index) in indices.iter().enumerate() {
                if cancel.is_cancelled() {
                    self.state.aborted = true;
                    break 'iterations;
                }

                let definition = &self.collection.requests[index];
                observer.on_unit_start(iteration, definition, &self.state);

                let execution = match engine.execute(definition).await {
                    Ok(execution) => execution,
                    Err(err) => {
                        error!(error = %err, "run stopped: state could not be saved");
                        self.failure = Some(err.to_string());
                        break 'iterations;
                    }
                };

                let result = RunResult::from_execution(definition, index, iteration, execution);
                if result.passed() {
                    self.state.passed += 1;
                } else {
                    self.state.failed += 1;
                }
                self.state.results.push(result);
                if let Some(result) = self.state.results.last() {
                    observer.on_unit_complete(result, &self.state);
                }

                let last = iteration == config.iterations && position + 1 == indices.len();
                if !config.delay.is_zero() && !last {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(config.delay) => {}
                    }
                }
            }
        }

        if let Err(err) = engine.env_mut().switch_active(original_env) {
            warn!(error = %err, "could not restore active environment");
        }

        let stopped = self.state.aborted || self.failure.is_some();
        if stopped {
            self.state.skipped = total - self.state.completed();
        }
        self.state.running = false;
        self.phase = if stopped {
            RunnerPhase::Stopped
        } else {
            RunnerPhase::Completed
        };

        let summary = self.summary();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            phase = ?summary.phase,
            "collection run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::engine::tests::{engine_with, ScriptedTransport};
    use crate::store::{Store, ENVIRONMENTS};

    fn collection() -> Collection {
        let mut c = Collection::new("API");
        for n in 1..=3 {
            let mut def = RequestDefinition::new("GET", format!("{{{{base}}}}/r{}", n));
            def.name = format!("req{}", n);
            c.requests.push(def);
        }
        c
    }

    struct CancelAfter {
        token: CancellationToken,
        after: usize,
        starts: Vec<(u32, String)>,
    }

    impl RunObserver for CancelAfter {
        fn on_unit_start(&mut self, iteration: u32, request: &RequestDefinition, state: &RunnerState) {
            assert_eq!(state.passed + state.failed, state.results.len());
            self.starts.push((iteration, request.name.clone()));
        }

        fn on_unit_complete(&mut self, _result: &RunResult, state: &RunnerState) {
            if state.results.len() >= self.after {
                self.token.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_run_requires_configuration() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        assert_eq!(runner.phase(), RunnerPhase::Idle);
        let err = runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap_err();
        assert_eq!(err, RunnerError::NotConfigured);
    }

    #[tokio::test]
    async fn test_run_requires_selection() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.select_only(&[]).unwrap();
        let err = runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap_err();
        assert_eq!(err, RunnerError::NothingSelected);
        assert_eq!(runner.phase(), RunnerPhase::Configuring);
    }

    #[test]
    fn test_configuration_validation() {
        let env = EnvironmentStore::default();
        let mut runner = CollectionRunner::new(collection());
        assert_eq!(runner.set_iterations(2), Err(RunnerError::NotConfigured));

        runner.open(&env);
        assert_eq!(runner.set_iterations(0), Err(RunnerError::InvalidIterations));
        assert!(runner.set_environment(3, &env).is_err());
        assert_eq!(
            runner.select(5, true),
            Err(RunnerError::RequestOutOfRange { index: 5, len: 3 })
        );
        runner.select(0, false).unwrap();
        assert_eq!(runner.config().unwrap().selected_indices(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_single_selected_request_across_iterations() {
        let transport = Arc::new(ScriptedTransport::default());
        let (mut engine, _) = engine_with(transport.clone());
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.set_iterations(2).unwrap();
        runner.select_only(&[1]).unwrap();

        let summary = runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        let rows: Vec<_> = runner
            .results()
            .iter()
            .map(|r| (r.iteration, r.name.as_str()))
            .collect();
        assert_eq!(rows, vec![(1, "req2"), (2, "req2")]);
        assert_eq!(summary.total_requests, 2);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.phase, RunnerPhase::Completed);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_selection_runs_in_collection_order() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.select_only(&[2, 0]).unwrap();
        runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        let names: Vec<_> = runner.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["req1", "req3"]);
    }

    #[tokio::test]
    async fn test_abort_after_first_unit_skips_rest() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.set_iterations(2).unwrap();

        let token = CancellationToken::new();
        let mut observer = CancelAfter {
            token: token.clone(),
            after: 1,
            starts: Vec::new(),
        };
        let summary = runner.run(&mut engine, &token, &mut observer).await.unwrap();

        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.skipped, 5);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.phase, RunnerPhase::Stopped);
        assert!(runner.state().aborted);
        assert_eq!(observer.starts, vec![(1, "req1".to_string())]);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.set_delay(Duration::from_secs(3600)).unwrap();

        let token = CancellationToken::new();
        let mut observer = CancelAfter {
            token: token.clone(),
            after: 1,
            starts: Vec::new(),
        };
        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(&mut engine, &token, &mut observer),
        )
        .await
        .expect("delay was not interrupted")
        .unwrap();

        assert_eq!(summary.total_requests, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_units_not_after_last() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner.set_delay(Duration::from_secs(10)).unwrap();

        let started = tokio::time::Instant::now();
        let summary = runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(summary.total_requests, 3);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_classification_and_env_restore() {
        let transport = Arc::new(ScriptedTransport {
            fail_urls: vec!["/r3".into()],
            ..ScriptedTransport::default()
        });
        let (mut engine, _) = engine_with(transport.clone());

        let mut c = collection();
        c.requests[0].test_script = "bx.test('fails', () => bx.expect(1).toBe(2));".into();
        c.requests[1].pre_script = "throw new Error('bad pre')".into();

        let mut runner = CollectionRunner::new(c);
        runner.open(engine.env());
        runner.set_environment(1, engine.env()).unwrap();
        let summary = runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.passed, 0);
        assert_eq!(summary.tests_failed, 1);

        let results = runner.results();
        assert!(results[0].success);
        assert_eq!(results[0].url, "https://prod.test/r1");
        assert_eq!(results[1].status, None);
        assert_eq!(results[1].error.as_deref(), Some("Pre-script error: bad pre"));
        assert!(!results[2].success);

        // only r1 and r3 reached the transport
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
        assert_eq!(engine.env().active_index(), 0);
    }

    #[tokio::test]
    async fn test_script_writes_visible_to_next_unit() {
        let transport = Arc::new(ScriptedTransport::default());
        let (mut engine, store) = engine_with(transport.clone());

        let mut c = collection();
        c.requests[0].test_script = "bx.setEnv('token', 'abc')".into();
        c.requests[1].url = "{{base}}/r2?t={{token}}".into();

        let mut runner = CollectionRunner::new(c);
        runner.open(engine.env());
        runner.select_only(&[0, 1]).unwrap();
        runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(transport.sent.lock().unwrap()[1].url, "https://dev.test/r2?t=abc");
        assert!(store.load(ENVIRONMENTS).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_again_resets_state() {
        let (mut engine, _) = engine_with(Arc::new(ScriptedTransport::default()));
        let mut runner = CollectionRunner::new(collection());
        runner.open(engine.env());
        runner
            .run(&mut engine, &CancellationToken::new(), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(runner.results().len(), 3);

        runner.open(engine.env());
        assert_eq!(runner.phase(), RunnerPhase::Configuring);
        assert!(runner.results().is_empty());
    }

    #[test]
    fn test_summary_average_duration() {
        let mut state = RunnerState::default();
        for duration in [10, 20, 31] {
            state.results.push(RunResult {
                name: "r".into(),
                method: "GET".into(),
                url: "u".into(),
                iteration: 1,
                request_index: 0,
                status: Some(200),
                status_text: "OK".into(),
                duration,
                success: true,
                error: None,
                tests_passed: 1,
                tests_failed: 0,
                tests: Vec::new(),
            });
        }
        state.passed = 3;
        let summary = RunSummary::from_state(&state, RunnerPhase::Completed, None);
        assert_eq!(summary.total_duration, 61);
        assert_eq!(summary.average_duration, 20);
        assert_eq!(summary.tests_passed, 3);
    }
}
