//! Interrupt handling
//!
//! Ctrl+C sets a process-wide flag and cancels the token of the run in
//! progress. The runner notices at the next unit boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

static ACTIVE_RUN: Lazy<Mutex<Option<CancellationToken>>> = Lazy::new(|| Mutex::new(None));

/// Check if Ctrl+C was pressed
#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Set the flag and cancel the registered run, if any.
/// Returns true when this was already the second interrupt.
pub fn set_interrupted() -> bool {
    let again = INTERRUPTED.swap(true, Ordering::SeqCst);
    if let Ok(active) = ACTIVE_RUN.lock() {
        if let Some(token) = active.as_ref() {
            token.cancel();
        }
    }
    again
}

#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Token for a new run; cancelled by the next interrupt
pub fn run_token() -> CancellationToken {
    let token = CancellationToken::new();
    if was_interrupted() {
        token.cancel();
    }
    if let Ok(mut active) = ACTIVE_RUN.lock() {
        *active = Some(token.clone());
    }
    token
}

/// Forget the token registered by [`run_token`]
pub fn clear_run_token() {
    if let Ok(mut active) = ACTIVE_RUN.lock() {
        *active = None;
    }
}
