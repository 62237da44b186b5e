//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

/// A token for cooperative cancellation.
///
/// Cloning is cheap and every clone observes the same state. Cancellation
/// is idempotent - only the first cancellation reason is kept.
///
/// Child tokens form nested scopes: cancelling a parent cancels all of its
/// live children, cancelling a child leaves the parent untouched.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Wakes tasks parked in `cancelled()`.
    notify: Notify,
    /// Children to cancel along with this token.
    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn cancel(&self, reason: &str) {
        // The reason is stored before the flag so observers never see a
        // cancelled token without one. First reason wins.
        {
            let mut slot = self.reason.write();
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            *slot = Some(reason.to_string());
            self.cancelled.store(true, Ordering::SeqCst);
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason);
        }
    }
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept. Waiters are woken
    /// and live child tokens are cancelled with the same reason.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.inner.cancel(&reason.into());
    }

    /// Creates a child token that is cancelled whenever this token is.
    #[must_use]
    pub fn child_token(&self) -> Self {
        let child = Self::new();
        {
            let mut children = self.inner.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        // Covers a parent cancelled before the child was registered.
        if self.is_cancelled() {
            child.cancel(self.reason().unwrap_or_default());
        }
        child
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Waits until cancellation is requested.
    ///
    /// Returns immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            // Registered before the re-check so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Number of live child tokens.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner
            .children
            .lock()
            .iter()
            .filter(|c| c.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
