//! Cooperative cancellation for in-flight exchanges.
//!
//! A blocking read cannot observe a flag, so cancelling runs the hooks that
//! in-flight exchanges registered; the session's hook shuts the socket down,
//! which wakes the reader.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Hook = Box<dyn FnOnce() + Send>;

/// Cloneable handle used to cancel an exchange from another thread.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenState>,
}

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    next_hook: AtomicU64,
    hooks: Mutex<BTreeMap<u64, Hook>>,
}

impl TokenState {
    fn hooks(&self) -> MutexGuard<'_, BTreeMap<u64, Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and runs every registered hook once.
    ///
    /// Later calls have no effect.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks());
        for hook in hooks.into_values() {
            hook();
        }
    }

    /// `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Registers `hook` to run on cancellation.
    ///
    /// Runs the hook immediately when the token is already cancelled. The
    /// hook is discarded when the returned registration is dropped.
    pub(crate) fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) -> Registration {
        let id = self.inner.next_hook.fetch_add(1, Ordering::Relaxed);
        self.inner.hooks().insert(id, Box::new(hook));
        // Re-check after inserting so a concurrent cancel cannot miss the hook.
        if self.is_cancelled() {
            let pending = self.inner.hooks().remove(&id);
            if let Some(hook) = pending {
                hook();
            }
        }
        Registration {
            token: self.clone(),
            id,
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Keeps a cancellation hook registered until dropped.
#[must_use = "dropping the registration removes the hook"]
pub(crate) struct Registration {
    token: CancellationToken,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.token.inner.hooks().remove(&self.id);
    }
}
