//! Signal handling for graceful shutdown.
//!
//! Two-phase Ctrl+C: the first sets the interrupted flag so the current
//! per-note transaction (or watch batch) can finish; the second force-exits
//! with code 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag flipped by SIGINT/SIGTERM.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the SIGINT/SIGTERM handler.
pub fn setup_signal_handler() {
    if let Err(e) = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::AcqRel) {
            std::process::exit(130);
        }
        eprintln!("\ninterrupted, finishing current batch (again to force quit)");
    }) {
        tracing::warn!(error = %e, "failed to install signal handler");
    }
}

/// Has the user requested shutdown?
pub fn check_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Acquire)
}

/// A `running` flag for the watch loop that goes false on interrupt.
///
/// The watcher polls this every tick; it is the inverse view of
/// [`check_interrupted`].
pub fn running_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(true));
    let watcher_flag = Arc::clone(&flag);
    std::thread::spawn(move || loop {
        if check_interrupted() {
            watcher_flag.store(false, Ordering::Release);
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    });
    flag
}

/// Cancellation flag for long rebuilds, fed from the same interrupt state.
pub fn cancel_flag() -> &'static AtomicBool {
    &INTERRUPTED
}
