use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::debug;

/// Last shutdown signal received, or 0.
static SHUTDOWN_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Only stores the signal number (async-signal-safe).
extern "C" fn handle_shutdown(signal: libc::c_int) {
    SHUTDOWN_SIGNAL.store(signal, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to a flag the event loop polls.
pub(crate) fn install_shutdown_handlers() -> Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_shutdown only writes an atomic, which is async-signal-safe.
            let handler = handle_shutdown as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {signal}"));
            }
        }
        debug!(signal, "shutdown handler installed");
    }
    Ok(())
}

/// Signal received since the last call, if any.
pub(crate) fn take_shutdown() -> Option<libc::c_int> {
    match SHUTDOWN_SIGNAL.swap(0, Ordering::SeqCst) {
        0 => None,
        signal => Some(signal),
    }
}
