use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Exit status after an interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Set up graceful shutdown: the first Ctrl+C cancels the returned token,
/// the second force-exits.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(EXIT_INTERRUPTED);
            }
            eprintln!("\nCancelling (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    cancel
}
