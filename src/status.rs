//! Exit status codes for the CLI
//!
//! - 0: success
//! - 1: error (bad arguments, storage, configuration)
//! - 10: a collection run finished with failed or skipped requests
//! - 130: interrupted (Ctrl+C)

use std::process::{ExitCode, Termination};

use crate::runner::{RunSummary, RunnerPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    Error = 1,
    /// Requests failed or tests did not pass
    Failures = 10,
    Interrupted = 130,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Exit status for a finished collection run
    pub fn from_summary(summary: &RunSummary, interrupted: bool) -> Self {
        if interrupted && summary.phase == RunnerPhase::Stopped {
            ExitStatus::Interrupted
        } else if summary.failure.is_some() {
            ExitStatus::Error
        } else if summary.all_passed() {
            ExitStatus::Success
        } else {
            ExitStatus::Failures
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            10 => ExitStatus::Failures,
            130 => ExitStatus::Interrupted,
            _ => ExitStatus::Error,
        }
    }
}
