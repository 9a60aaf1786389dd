//! A minimal, dependency-free cancellation context.
//!
//! The original engine this crate is modeled on propagates a `context.Context`
//! through every long-lived driver loop; `tokio_util::sync::CancellationToken`
//! is the idiomatic Rust equivalent but this crate has no other use for
//! `tokio-util`, so a small `Notify`-backed token is rolled here instead —
//! fires once, observable any number of times, cheap to clone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct CancellationContext {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Fires cancellation. Idempotent — a second call is a no-op.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called (immediately, if it
    /// already has been).
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        // `notify_waiters` only wakes tasks already parked on `notified()`,
        // so re-check after subscribing to close the race against a
        // `cancel()` that lands between the check above and this call.
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationContext {
    fn default() -> Self {
        Self::new()
    }
}
