//! In-flight fetch registry.
//!
//! The registry is the coalescing point of the loader. For every variant it
//! tracks at most one pending fetch together with the ordered list of
//! waiters attached to it:
//!
//! - [`FetchRegistry::register_or_join`] decides, under the registry lock,
//!   whether the caller owns a new fetch or joins the existing one
//! - [`FetchRegistry::complete`] removes the pending fetch and snapshots its
//!   waiters in the same critical section, then delivers outside the lock
//!
//! A single lock guards the whole map. Nothing awaits while holding it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;
use url::Url;

use super::key::VariantKey;
use super::waiter::{ImageObserver, LoadOutcome, Waiter, WaiterId};
use super::Image;
use crate::error::LoadError;

/// Role assigned to a caller by [`FetchRegistry::register_or_join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// No fetch was pending; the caller must run it and call `complete`.
    NewFetchOwner,

    /// A fetch was already pending; the waiter was appended to it.
    JoinedExisting,
}

/// Which pending fetches a removal applies to.
#[derive(Debug, Clone, Copy)]
pub enum WaiterScope<'a> {
    /// One variant
    Key(&'a VariantKey),

    /// Every style of one URL
    Url(&'a Url),

    /// Every pending fetch
    All,
}

impl WaiterScope<'_> {
    fn matches(&self, key: &VariantKey) -> bool {
        match self {
            WaiterScope::Key(k) => *k == key,
            WaiterScope::Url(url) => key.url() == *url,
            WaiterScope::All => true,
        }
    }
}

/// Summary of a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completion {
    /// Waiters that received the outcome
    pub delivered: usize,

    /// Observers that were gone by delivery time
    pub skipped: usize,

    /// Waiters whose callback or observer panicked during delivery
    pub panicked: usize,

    /// Time between registration of the owner and completion
    pub elapsed: Duration,
}

/// One in-flight network+decode operation.
struct PendingFetch {
    waiters: Vec<Waiter>,
    started: Instant,
}

/// Tracks in-flight fetches and the waiters attached to each.
#[derive(Default)]
pub struct FetchRegistry {
    pending: Mutex<HashMap<VariantKey, PendingFetch>>,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any style of `url` has a pending fetch.
    pub fn is_in_flight(&self, url: &Url) -> bool {
        self.pending.lock().keys().any(|key| key.url() == url)
    }

    /// Whether this exact variant has a pending fetch.
    pub fn is_pending(&self, key: &VariantKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Attach `waiter` to the pending fetch for `key`, creating it if needed.
    ///
    /// The check and the insert happen under one lock acquisition, so at
    /// most one caller per key is ever told it owns the fetch. The owner must
    /// eventually call [`complete`](Self::complete) for `key`.
    pub fn register_or_join(&self, key: &VariantKey, waiter: Waiter) -> Role {
        let mut pending = self.pending.lock();

        if let Some(fetch) = pending.get_mut(key) {
            fetch.waiters.push(waiter);
            return Role::JoinedExisting;
        }

        pending.insert(
            key.clone(),
            PendingFetch {
                waiters: vec![waiter],
                started: Instant::now(),
            },
        );
        Role::NewFetchOwner
    }

    /// Finish the pending fetch for `key` and fan `result` out to its waiters.
    ///
    /// Waiters are notified in registration order. A waiter that panics is
    /// counted in [`Completion::panicked`] and the rest are still notified.
    /// Anyone registering after the entry is removed starts a new pending
    /// fetch instead of being lost.
    /// Completing a key with no pending fetch is a no-op.
    pub fn complete(&self, key: &VariantKey, result: Result<Image, LoadError>) -> Completion {
        let Some(fetch) = self.pending.lock().remove(key) else {
            return Completion::default();
        };

        let mut completion = Completion {
            elapsed: fetch.started.elapsed(),
            ..Completion::default()
        };

        for waiter in fetch.waiters {
            let outcome = LoadOutcome {
                key: key.clone(),
                result: result.clone(),
            };
            // Each delivery is isolated from panics in the others
            let id = waiter.id();
            match panic::catch_unwind(AssertUnwindSafe(|| waiter.deliver(outcome))) {
                Ok(true) => completion.delivered += 1,
                Ok(false) => completion.skipped += 1,
                Err(_) => {
                    warn!("{} panicked while receiving the result for {}", id, key);
                    completion.panicked += 1;
                }
            }
        }

        completion
    }

    /// Detach the waiter `id` from every pending fetch in `scope`.
    ///
    /// The fetches keep running. Returns the number of detached waiters.
    pub fn remove_waiter(&self, id: WaiterId, scope: WaiterScope<'_>) -> usize {
        self.detach_where(scope, |waiter| waiter.id() == id)
    }

    /// Detach every waiter notifying `observer` within `scope`.
    pub fn remove_observer<O>(&self, observer: &Arc<O>, scope: WaiterScope<'_>) -> usize
    where
        O: ImageObserver + ?Sized,
    {
        self.detach_where(scope, |waiter| waiter.is_observer(observer))
    }

    /// Detach every waiter from every style of `url`.
    pub fn detach_all(&self, url: &Url) -> usize {
        self.detach_where(WaiterScope::Url(url), |_| true)
    }

    /// Detach every waiter from every pending fetch.
    ///
    /// Pending entries stay in place so their owners can still complete and
    /// no second fetch starts for a key that is already in flight.
    pub fn clear(&self) -> usize {
        self.detach_where(WaiterScope::All, |_| true)
    }

    /// Number of pending fetches.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of waiters attached to the pending fetch for `key`.
    pub fn waiter_count(&self, key: &VariantKey) -> usize {
        self.pending
            .lock()
            .get(key)
            .map_or(0, |fetch| fetch.waiters.len())
    }

    fn detach_where<F>(&self, scope: WaiterScope<'_>, predicate: F) -> usize
    where
        F: Fn(&Waiter) -> bool,
    {
        // Detached waiters are dropped after the lock is released: dropping a
        // callback may run arbitrary code.
        let mut detached = Vec::new();
        {
            let mut pending = self.pending.lock();
            for (key, fetch) in pending.iter_mut() {
                if !scope.matches(key) {
                    continue;
                }
                let mut i = 0;
                while i < fetch.waiters.len() {
                    if predicate(&fetch.waiters[i]) {
                        detached.push(fetch.waiters.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
        }
        detached.len()
    }
}
