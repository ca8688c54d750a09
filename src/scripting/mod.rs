//! Sandboxed pre-request and test scripts
//!
//! Scripts are JavaScript run by QuickJS (via rquickjs). Each execution gets a
//! fresh runtime whose only globals beyond the language built-ins are `bx`
//! and `console`; nothing can reach the file system, network or process.

mod console;
mod outcome;
mod sandbox;

pub use console::{ConsoleEntry, ConsoleLevel, ConsoleLog, ScriptSource};
pub use outcome::{ScriptOutcome, TestResult, SCRIPT_EXECUTION};
pub use sandbox::{ResponseView, SandboxLimits, ScriptSandbox};

use thiserror::Error;

/// Script errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Uncaught exception; carries the exception message
    #[error("{0}")]
    Exception(String),

    #[error("script timed out after {0} ms")]
    Timeout(u64),

    #[error("script runtime error: {0}")]
    Runtime(String),
}

impl From<rquickjs::Error> for ScriptError {
    fn from(err: rquickjs::Error) -> Self {
        ScriptError::Runtime(err.to_string())
    }
}
