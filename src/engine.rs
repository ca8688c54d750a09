//! Single-request execution
//!
//! One execution is: pre-request script, build, send, ingest cookies, test
//! script. The engine owns the mutable state that flows between those steps
//! and between consecutive executions.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cookies::CookieJar;
use crate::environment::EnvironmentStore;
use crate::errors::Result;
use crate::request::{self, FinalRequest, RequestDefinition};
use crate::scripting::{ScriptOutcome, ScriptSandbox};
use crate::transport::{Transport, TransportResult};
use crate::workspace::Workspace;

/// Everything that happened while executing one request
#[derive(Debug, Clone)]
pub struct Execution {
    /// Substituted URL before query parameters are appended
    pub url: String,
    /// `None` when the pre-request script failed
    pub request: Option<FinalRequest>,
    /// `None` when the request was never sent
    pub response: Option<TransportResult>,
    pub outcome: ScriptOutcome,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl Execution {
    /// A response was received
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Received a response and every test passed
    pub fn passed(&self) -> bool {
        self.is_success() && self.outcome.failed == 0
    }

    pub fn status(&self) -> Option<u16> {
        match (&self.error, &self.response) {
            (None, Some(response)) => Some(response.status),
            _ => None,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub struct Engine {
    env: EnvironmentStore,
    jar: CookieJar,
    sandbox: ScriptSandbox,
    transport: Arc<dyn Transport>,
    workspace: Workspace,
}

impl Engine {
    pub fn new(
        env: EnvironmentStore,
        jar: CookieJar,
        sandbox: ScriptSandbox,
        transport: Arc<dyn Transport>,
        workspace: Workspace,
    ) -> Self {
        Self {
            env,
            jar,
            sandbox,
            transport,
            workspace,
        }
    }

    /// Load environments and cookies from the workspace
    pub fn load(workspace: Workspace, sandbox: ScriptSandbox, transport: Arc<dyn Transport>) -> Result<Self> {
        let env = workspace.load_environments()?;
        let jar = workspace.load_cookies()?;
        Ok(Self::new(env, jar, sandbox, transport, workspace))
    }

    pub fn env(&self) -> &EnvironmentStore {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut EnvironmentStore {
        &mut self.env
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    pub fn sandbox(&self) -> &ScriptSandbox {
        &self.sandbox
    }

    pub fn sandbox_mut(&mut self) -> &mut ScriptSandbox {
        &mut self.sandbox
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn persist_env_if_dirty(&mut self) -> Result<()> {
        if self.sandbox.take_env_dirty() {
            self.workspace.save_environments(&self.env)?;
        }
        Ok(())
    }

    /// Execute one request definition.
    ///
    /// Script, transport and test failures are recorded in the returned
    /// [`Execution`]. Only a persistence failure is returned as an error.
    pub async fn execute(&mut self, definition: &RequestDefinition) -> Result<Execution> {
        let start = Instant::now();

        let pre = self.sandbox.run_pre_request(&definition.pre_script, &mut self.env);
        self.persist_env_if_dirty()?;
        if let Err(err) = pre {
            return Ok(Execution {
                url: request::resolve_url(&definition.url, &self.env),
                request: None,
                response: None,
                outcome: ScriptOutcome::default(),
                error: Some(format!("Pre-script error: {}", err)),
                duration_ms: elapsed_ms(start),
            });
        }

        let final_request = request::build(definition, &self.env, &self.jar);
        info!(method = %final_request.method, url = %final_request.url, "executing request");

        let response = match self.transport.send(&final_request).await {
            Ok(response) => response,
            Err(err) => TransportResult::failed(err.to_string(), elapsed_ms(start)),
        };

        if let Some(error) = &response.error {
            warn!(url = %final_request.url, error = %error, "request failed");
            return Ok(Execution {
                url: final_request.resolved_url.clone(),
                error: Some(error.clone()),
                duration_ms: response.duration_ms,
                request: Some(final_request),
                response: Some(response),
                outcome: ScriptOutcome::default(),
            });
        }

        if let Some(set_cookie) = response.header("set-cookie") {
            let stored = self.jar.ingest(set_cookie, &final_request.url);
            if stored > 0 {
                debug!(stored, "cookies updated");
                self.workspace.save_cookies(&self.jar)?;
            }
        }

        let outcome = self
            .sandbox
            .run_tests(&definition.test_script, &mut self.env, &response);
        self.persist_env_if_dirty()?;

        debug!(
            status = response.status,
            tests_passed = outcome.passed,
            tests_failed = outcome.failed,
            "request complete"
        );

        Ok(Execution {
            url: final_request.resolved_url.clone(),
            duration_ms: response.duration_ms,
            request: Some(final_request),
            response: Some(response),
            outcome,
            error: None,
        })
    }
}
