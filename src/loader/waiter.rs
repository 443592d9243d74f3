//! Result sinks for fetches.
//!
//! A [`Waiter`] is anything that wants the terminal result of a load: an
//! owned completion callback, or a weakly-held [`ImageObserver`]. Both are
//! dispatched through [`Waiter::deliver`], which consumes the waiter so a
//! result can never be delivered twice.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use url::Url;

use super::key::VariantKey;
use super::Image;
use crate::error::LoadError;

/// Terminal result of one load, as seen by a waiter.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The variant that was requested
    pub key: VariantKey,

    /// The decoded image, or why it could not be produced
    pub result: Result<Image, LoadError>,
}

impl LoadOutcome {
    pub fn url(&self) -> &Url {
        self.key.url()
    }

    pub fn style(&self) -> Option<&str> {
        self.key.style()
    }

    pub fn image(&self) -> Option<&Image> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.result.as_ref().err()
    }
}

/// Subscriber notified when a load it waits on finishes.
///
/// The loader only holds a weak reference: dropping the last `Arc` of an
/// observer silently cancels delivery to it.
pub trait ImageObserver: Send + Sync {
    fn image_loaded(&self, outcome: &LoadOutcome);
}

/// Token identifying one registered waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaiterId(u64);

impl WaiterId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiter#{}", self.0)
    }
}

type Callback = Box<dyn FnOnce(LoadOutcome) + Send + 'static>;

enum Sink {
    Callback(Callback),
    Observer(Weak<dyn ImageObserver>),
}

/// A registered recipient of a load result.
pub struct Waiter {
    id: WaiterId,
    sink: Sink,
}

impl Waiter {
    /// Waiter that invokes `callback` exactly once with the outcome.
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnOnce(LoadOutcome) + Send + 'static,
    {
        Self {
            id: WaiterId::next(),
            sink: Sink::Callback(Box::new(callback)),
        }
    }

    /// Waiter that notifies `observer` without keeping it alive.
    pub fn observer<O>(observer: &Arc<O>) -> Self
    where
        O: ImageObserver + 'static,
    {
        let observer: Arc<dyn ImageObserver> = observer.clone();
        Self::observer_dyn(&observer)
    }

    /// Same as [`Waiter::observer`] for an already type-erased observer.
    pub fn observer_dyn(observer: &Arc<dyn ImageObserver>) -> Self {
        Self {
            id: WaiterId::next(),
            sink: Sink::Observer(Arc::downgrade(observer)),
        }
    }

    pub fn id(&self) -> WaiterId {
        self.id
    }

    /// Whether this waiter notifies the given observer.
    pub fn is_observer<O>(&self, observer: &Arc<O>) -> bool
    where
        O: ImageObserver + ?Sized,
    {
        match &self.sink {
            Sink::Observer(weak) => std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(observer)),
            Sink::Callback(_) => false,
        }
    }

    /// Deliver the outcome.
    ///
    /// Returns `false` if the waiter was an observer that no longer exists;
    /// the outcome is dropped in that case.
    pub fn deliver(self, outcome: LoadOutcome) -> bool {
        match self.sink {
            Sink::Callback(callback) => {
                callback(outcome);
                true
            }
            Sink::Observer(weak) => match weak.upgrade() {
                Some(observer) => {
                    observer.image_loaded(&outcome);
                    true
                }
                None => {
                    tracing::trace!(
                        "{} observer dropped before delivery of {}",
                        self.id,
                        outcome.key
                    );
                    false
                }
            },
        }
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sink {
            Sink::Callback(_) => "callback",
            Sink::Observer(_) => "observer",
        };
        f.debug_struct("Waiter")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}
