//! Process-wide cancellation flag.
//!
//! The only mutable process-wide state in the crate: an atomic boolean
//! cleared by the SIGINT/SIGTERM handler with a release store and polled at
//! the top of every benchmark and receiver loop with an acquire load.
//! Blocking calls inside those loops carry bounded timeouts, so
//! cancellation latency is capped by the configured receive timeout.

use std::sync::atomic::{AtomicBool, Ordering};

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_signal(_signal: libc::c_int) {
    RUNNING.store(false, Ordering::Release);
}

/// Install SIGINT and SIGTERM handlers that clear the running flag.
/// Idempotent; safe to call from every binary entry point.
pub fn install() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
    }
}

/// Whether the process should keep running.
pub fn is_running() -> bool {
    RUNNING.load(Ordering::Acquire)
}

/// Request shutdown from ordinary code (tests, embedders).
pub fn shutdown() {
    RUNNING.store(false, Ordering::Release);
}

/// Re-arm the flag. Test helper; real shutdown is one-way.
pub fn reset() {
    RUNNING.store(true, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_transitions() {
        reset();
        assert!(is_running());
        shutdown();
        assert!(!is_running());
        reset();
        assert!(is_running());
    }
}
