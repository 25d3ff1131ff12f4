//! Cancellation token for stopping simulation work
//!
//! Used to stop the auto-arrival loop and to cut visitor delays short on
//! shutdown. Tokens form a parent-child chain: cancelling a parent is seen
//! by every child, never the other way round.
//!
//! Queued monitor requests are not cancelled through a token; use
//! `PriorityMonitor::cancel`, which wakes the waiter directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};


/// Granularity of [`CancellationToken::sleep`]
pub const SLEEP_SLICE: Duration = Duration::from_millis(10);

struct Inner {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

/// Shared cancellation flag
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Token that is also cancelled when `self` is
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self
                .inner
                .parent
                .as_ref()
                .map_or(false, CancellationToken::is_cancelled)
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns true if the full duration elapsed. A duration past the
    /// end of `Instant` sleeps until cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_cancelled() {
                return false;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(SLEEP_SLICE)
                }
                None => SLEEP_SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
