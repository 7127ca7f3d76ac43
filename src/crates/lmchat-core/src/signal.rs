//! Cooperative cancellation for model calls.
//!
//! The host owns an [`AbortController`] per execution and hands clones of its
//! [`AbortSignal`] to model calls through
//! [`CallOptions`](crate::llm::CallOptions). Signals are polled, never pushed:
//! consumers check [`AbortSignal::is_aborted`] at their own suspension points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owning side of an abort flag.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    /// Create a controller whose signal is not yet aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a signal observing this controller.
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Mark the signal as aborted. Idempotent.
    pub fn abort(&self) {
        self.signal.flag.store(true, Ordering::SeqCst);
    }
}

/// Read side of an abort flag. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Whether the owning controller has aborted.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
