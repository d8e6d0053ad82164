//! SIGINT/SIGTERM handling.
//!
//! The handler only flips an atomic flag. A small watcher thread turns that flag
//! into a cancelled [`ShutdownToken`], which the reactor observes on its next tick.

use converter_core::ShutdownToken;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;

const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

static SIGNALLED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn register_handlers() -> io::Result<()> {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    for signum in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only performs an atomic store, which is async-signal-safe.
        let previous = unsafe { libc::signal(signum, handler) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_handlers() -> io::Result<()> {
    Ok(())
}

/// Cancels `token` when the process receives SIGINT or SIGTERM.
pub fn install(token: ShutdownToken) -> io::Result<()> {
    register_handlers()?;

    thread::Builder::new()
        .name("signal-watch".to_string())
        .spawn(move || {
            while !SIGNALLED.load(Ordering::SeqCst) {
                if token.is_cancelled() {
                    return;
                }
                thread::sleep(SIGNAL_POLL_INTERVAL);
            }
            info!("Termination signal received");
            token.cancel();
        })?;

    Ok(())
}
