//! QuickJS host for user scripts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use base64::Engine;
use chrono::Utc;
use indexmap::IndexMap;
use rand::Rng;
use rquickjs::{Context, Ctx, Function, Object, Runtime, Value};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::console::{ConsoleEntry, ConsoleLevel, ConsoleLog, ScriptSource};
use super::outcome::{ScriptOutcome, TestResult, SCRIPT_EXECUTION};
use super::ScriptError;
use crate::environment::EnvironmentStore;
use crate::transport::TransportResult;

/// Evaluates to `function (host, mode, envJson, responseJson)` returning the
/// script runner.
const PRELUDE: &str = include_str!("prelude.js");

/// Resource caps applied to every execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub memory_limit: usize,
    pub max_stack_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            memory_limit: 64 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

/// What a test script sees as `bx.response`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView<'a> {
    pub status: u16,
    pub status_text: &'a str,
    pub body: &'a str,
    pub headers: &'a IndexMap<String, String>,
    pub time: u64,
}

impl<'a> From<&'a TransportResult> for ResponseView<'a> {
    fn from(result: &'a TransportResult) -> Self {
        Self {
            status: result.status,
            status_text: &result.status_text,
            body: &result.body,
            headers: &result.headers,
            time: result.duration_ms,
        }
    }
}

/// Everything the native bindings collect during one execution
#[derive(Debug, Default)]
struct Captured {
    env_writes: Vec<(String, String)>,
    console: Vec<ConsoleEntry>,
    results: Vec<TestResult>,
}

fn lock(captured: &Mutex<Captured>) -> MutexGuard<'_, Captured> {
    captured.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs pre-request and test scripts and keeps their console output
#[derive(Debug, Default)]
pub struct ScriptSandbox {
    limits: SandboxLimits,
    console: ConsoleLog,
    env_dirty: bool,
}

impl ScriptSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            console: ConsoleLog::default(),
            env_dirty: false,
        }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut ConsoleLog {
        &mut self.console
    }

    /// Whether any script wrote to the environment since the last call
    pub fn take_env_dirty(&mut self) -> bool {
        std::mem::take(&mut self.env_dirty)
    }

    /// Run a pre-request script.
    ///
    /// `bx.setEnv` writes land in `env` in call order, including writes made
    /// before an uncaught exception. On failure an error entry is added to the
    /// console log and the caller must not send the request.
    pub fn run_pre_request(&mut self, script: &str, env: &mut EnvironmentStore) -> Result<(), ScriptError> {
        if script.trim().is_empty() {
            return Ok(());
        }

        let (captured, result) = self.execute(script, ScriptSource::PreRequest, env, None);
        self.apply(captured.env_writes, captured.console, env);

        if let Err(err) = &result {
            warn!(error = %err, "pre-request script failed");
            self.console.push(ConsoleEntry::new(
                ConsoleLevel::Error,
                format!("Pre-request script error: {}", err),
                ScriptSource::PreRequest,
            ));
        }
        result
    }

    /// Run a test script against a received response.
    ///
    /// Never fails: an uncaught exception or timeout stops the script and is
    /// recorded as a failed `"Script execution"` entry after any tests that
    /// already ran.
    pub fn run_tests(
        &mut self,
        script: &str,
        env: &mut EnvironmentStore,
        response: &TransportResult,
    ) -> ScriptOutcome {
        if script.trim().is_empty() {
            return ScriptOutcome::default();
        }

        let view = ResponseView::from(response);
        let (captured, result) = self.execute(script, ScriptSource::Test, env, Some(&view));
        self.apply(captured.env_writes, captured.console, env);

        let mut outcome = ScriptOutcome::from_results(captured.results);
        if let Err(err) = result {
            debug!(error = %err, "test script aborted");
            outcome.push(TestResult::fail(SCRIPT_EXECUTION, err.to_string()));
        }
        outcome
    }

    /// Compile a script without running it
    pub fn validate(&self, script: &str) -> Result<(), ScriptError> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);
        let context = Context::full(&runtime)?;

        context.with(|ctx| {
            let check: Function = ctx.eval(r#"(function (src) { new Function("bx", "console", src); })"#)?;
            match check.call::<_, ()>((script,)) {
                Ok(()) => Ok(()),
                Err(rquickjs::Error::Exception) => Err(ScriptError::Exception(exception_message(&ctx.catch()))),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn apply(&mut self, writes: Vec<(String, String)>, console: Vec<ConsoleEntry>, env: &mut EnvironmentStore) {
        if !writes.is_empty() {
            self.env_dirty = true;
        }
        for (key, value) in writes {
            env.set_variable(key, value);
        }
        self.console.extend(console);
    }

    fn execute(
        &self,
        script: &str,
        source: ScriptSource,
        env: &EnvironmentStore,
        response: Option<&ResponseView<'_>>,
    ) -> (Captured, Result<(), ScriptError>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let started = Instant::now();
        let result = self.evaluate(script, source, env, response, &captured);
        debug!(
            source = source.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "script executed"
        );
        let captured = std::mem::take(&mut *lock(&captured));
        (captured, result)
    }

    fn evaluate(
        &self,
        script: &str,
        source: ScriptSource,
        env: &EnvironmentStore,
        response: Option<&ResponseView<'_>>,
        captured: &Arc<Mutex<Captured>>,
    ) -> Result<(), ScriptError> {
        let env_json = serde_json::to_string(&env.variables()).map_err(|e| ScriptError::Runtime(e.to_string()))?;
        let response_json = match response {
            Some(view) => serde_json::to_string(view).map_err(|e| ScriptError::Runtime(e.to_string()))?,
            None => "null".to_string(),
        };

        let runtime = Runtime::new()?;
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);

        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + self.limits.timeout;
        let flag = Arc::clone(&timed_out);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::Relaxed);
                true
            } else {
                false
            }
        })));

        let context = Context::full(&runtime)?;
        let result = context.with(|ctx| -> Result<(), ScriptError> {
            let host = host_object(&ctx, source, captured)?;
            let factory: Function = ctx.eval(PRELUDE)?;
            let run: Function = factory.call((host, source.as_str(), env_json, response_json))?;

            match run.call::<_, ()>((script,)) {
                Ok(()) => Ok(()),
                Err(rquickjs::Error::Exception) => Err(ScriptError::Exception(exception_message(&ctx.catch()))),
                Err(e) => Err(e.into()),
            }
        });

        if timed_out.load(Ordering::Relaxed) {
            warn!(timeout_ms = self.limits.timeout.as_millis() as u64, "script interrupted");
            return Err(ScriptError::Timeout(self.limits.timeout.as_millis() as u64));
        }
        result
    }
}

/// Native functions the prelude wraps into `bx` and `console`
fn host_object<'js>(
    ctx: &Ctx<'js>,
    source: ScriptSource,
    captured: &Arc<Mutex<Captured>>,
) -> rquickjs::Result<Object<'js>> {
    let host = Object::new(ctx.clone())?;

    let state = Arc::clone(captured);
    host.set(
        "setEnv",
        Function::new(ctx.clone(), move |key: String, value: String| {
            lock(&state).env_writes.push((key, value));
        })?,
    )?;

    let state = Arc::clone(captured);
    host.set(
        "log",
        Function::new(ctx.clone(), move |level: String, message: String| {
            lock(&state)
                .console
                .push(ConsoleEntry::new(ConsoleLevel::parse(&level), message, source));
        })?,
    )?;

    let state = Arc::clone(captured);
    host.set(
        "record",
        Function::new(ctx.clone(), move |name: String, passed: bool, error: Option<String>| {
            let result = if passed {
                TestResult::pass(name)
            } else {
                TestResult::fail(name, error.unwrap_or_default())
            };
            lock(&state).results.push(result);
        })?,
    )?;

    host.set("timestamp", Function::new(ctx.clone(), timestamp)?)?;
    host.set("uuid", Function::new(ctx.clone(), uuid)?)?;
    host.set("randomInt", Function::new(ctx.clone(), random_int)?)?;
    host.set("btoa", Function::new(ctx.clone(), base64_encode)?)?;
    host.set("atob", Function::new(ctx.clone(), base64_decode)?)?;

    Ok(host)
}

fn exception_message(value: &Value<'_>) -> String {
    if let Some(exception) = value.as_exception() {
        return exception.message().unwrap_or_else(|| "Unknown error".to_string());
    }
    if let Some(text) = value.as_string() {
        if let Ok(text) = text.to_string() {
            return text;
        }
    }
    "Unknown error".to_string()
}

fn timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Inclusive on both ends
fn random_int(min: f64, max: f64) -> f64 {
    if !min.is_finite() || !max.is_finite() {
        return f64::NAN;
    }
    let low = min.ceil() as i64;
    let high = max.floor() as i64;
    if low >= high {
        return low as f64;
    }
    rand::rng().random_range(low..=high) as f64
}

fn base64_encode(input: String) -> String {
    base64::engine::general_purpose::STANDARD.encode(input.as_bytes())
}

fn base64_decode(input: String) -> Option<String> {
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
