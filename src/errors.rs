//! Error types for Bolt

use thiserror::Error;

use crate::environment::EnvironmentError;
use crate::runner::RunnerError;
use crate::scripting::ScriptError;
use crate::transport::TransportError;

/// Main error type for Bolt
#[derive(Error, Debug)]
pub enum BoltError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Collection error: {0}")]
    Collection(String),

    #[error("Invalid argument: {0}")]
    Argument(String),
}

pub type Result<T> = std::result::Result<T, BoltError>;
