use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

/// Exit code for a run stopped by SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Install the handler and return the flag it sets.
///
/// If a handler cannot be installed the flag is still returned; it just never
/// gets set by a signal.
pub fn install_handler() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        eprintln!("\nInterrupted, finishing files in progress...");
        info!("Shutdown signal received");
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
    flag
}
