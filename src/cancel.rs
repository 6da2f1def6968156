//! Process-wide cancellation, tripped by Ctrl-C.
//!
//! Drivers check the token before starting each file. Work already in flight
//! runs to completion; outputs are written via temp file + rename, so an
//! interrupted batch never leaves a half-written WebP behind.
//!
//! A second Ctrl-C exits at once. The rename never happens for files still
//! encoding, so the caller's `on_abort` hook removes their temp files first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Record one interrupt. Returns `true` when the token was already
    /// cancelled, i.e. this is the second interrupt.
    pub fn interrupt(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Route Ctrl-C to this token.
    ///
    /// The first interrupt stops new files from starting; a second one runs
    /// `on_abort` and exits with status 130. Can only be installed once per
    /// process.
    pub fn install_ctrlc_handler<F>(&self, on_abort: F) -> Result<(), ctrlc::Error>
    where
        F: Fn() + Send + 'static,
    {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.interrupt() {
                on_abort();
                std::process::exit(130);
            }
            eprintln!("\nInterrupted: finishing files in progress (Ctrl-C again to abort)");
        })
    }
}
