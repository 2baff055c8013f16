//! Cooperative cancellation shared between the dispatcher, its workers and
//! the subprocess watchdogs.
//!
//! Tokens form a chain: a child token observes every flag of its parent plus
//! its own, so cancelling one trace (a worker failed) leaves the batch running,
//! while cancelling the batch (SIGINT) reaches every trace.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct CancelToken {
    flags: Vec<Arc<AtomicBool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// A token cancelled by this one, but whose own cancellation doesn't propagate up.
    pub fn child(&self) -> Self {
        let mut flags = self.flags.clone();
        flags.push(Arc::new(AtomicBool::new(false)));
        Self { flags }
    }

    pub fn cancel(&self) {
        if let Some(own) = self.flags.last() {
            own.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    /// Cancel this token when SIGINT or SIGTERM arrives.
    ///
    /// Replaces the default terminate-on-signal behaviour, so only install
    /// this around work that polls the token.
    #[cfg(unix)]
    pub fn cancel_on_signals(&self) -> std::io::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        if let Some(own) = self.flags.last() {
            signal_hook::flag::register(SIGINT, Arc::clone(own))?;
            signal_hook::flag::register(SIGTERM, Arc::clone(own))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn cancel_on_signals(&self) -> std::io::Result<()> {
        Ok(())
    }
}
