//! Deferred results.
//!
//! A [`Deferred`] is a single pending result that ends in exactly one of
//! three terminal outcomes: fulfilled with a value, rejected with a
//! [`Reason`], or cancelled with a [`Reason`]. Callbacks are grouped per
//! outcome and fire once, in registration order, when the matching outcome
//! is reached. A callback registered after the fact fires immediately if its
//! outcome matches and is dropped otherwise.
//!
//! Callbacks are never run while the internal lock is held, so a callback
//! may freely settle or subscribe to other deferreds (including this one).

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why an operation was rejected or cancelled.
///
/// An ordered list of strings. Protocol failures carry
/// `[reply code, channel, message]`; transport failures carry a single
/// word such as `"EOF"` or `"timeout"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Reason(Vec<String>);

impl Reason {
    /// Build a reason from its parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Part at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// The first part, conventionally a reply code or a short keyword.
    pub fn code(&self) -> Option<&str> {
        self.get(0)
    }

    /// All parts in order.
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl std::error::Error for Reason {}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        Self(vec![s.to_owned()])
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Self(vec![s])
    }
}

impl From<Vec<String>> for Reason {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

impl<const N: usize> From<[&str; N]> for Reason {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

/// Lifecycle state of a [`Deferred`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with a failure reason.
    Rejected,
    /// Settled by cancellation.
    Cancelled,
}

/// Terminal payload of a [`Deferred`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation succeeded.
    Fulfilled(T),
    /// The operation failed.
    Rejected(Reason),
    /// The operation was abandoned.
    Cancelled(Reason),
}

impl<T> Outcome<T> {
    /// The state this outcome corresponds to.
    pub fn state(&self) -> State {
        match self {
            Self::Fulfilled(_) => State::Fulfilled,
            Self::Rejected(_) => State::Rejected,
            Self::Cancelled(_) => State::Cancelled,
        }
    }

    /// The value, if fulfilled.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled(v) => Some(v),
            _ => None,
        }
    }

    /// The reason, if rejected or cancelled.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(r) | Self::Cancelled(r) => Some(r),
        }
    }

    /// Collapse into a `Result`, treating cancellation as an error.
    pub fn into_result(self) -> Result<T, Reason> {
        match self {
            Self::Fulfilled(v) => Ok(v),
            Self::Rejected(r) | Self::Cancelled(r) => Err(r),
        }
    }
}

type Callback<X> = Box<dyn FnOnce(&X) + Send>;

struct Inner<T> {
    outcome: Option<Arc<Outcome<T>>>,
    on_settle: Vec<Callback<Outcome<T>>>,
    on_success: Vec<Callback<T>>,
    on_error: Vec<Callback<Reason>>,
    on_cancel: Vec<Callback<Reason>>,
}

/// A single deferred result.
///
/// Cloning yields another handle to the same result.
pub struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .lock()
            .outcome
            .as_ref()
            .map_or(State::Pending, |o| o.state());
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T: Send + Sync + 'static> Deferred<T> {
    /// Create a pending, untracked deferred.
    ///
    /// Futures that should be cancelled on disconnect come from
    /// [`Registry::create`](crate::registry::Registry::create) instead.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                outcome: None,
                on_settle: Vec::new(),
                on_success: Vec::new(),
                on_error: Vec::new(),
                on_cancel: Vec::new(),
            })),
        }
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.inner
            .lock()
            .outcome
            .as_ref()
            .map_or(State::Pending, |o| o.state())
    }

    /// Whether no outcome has been reached yet.
    pub fn is_pending(&self) -> bool {
        self.inner.lock().outcome.is_none()
    }

    /// Fulfill with `value`. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Outcome::Fulfilled(value))
    }

    /// Reject with `reason`. Returns `false` if already settled.
    pub fn reject(&self, reason: impl Into<Reason>) -> bool {
        self.settle(Outcome::Rejected(reason.into()))
    }

    /// Cancel with `reason`. Returns `false` if already settled.
    pub fn cancel(&self, reason: impl Into<Reason>) -> bool {
        self.settle(Outcome::Cancelled(reason.into()))
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let (outcome, on_settle, on_success, on_error, on_cancel) = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() {
                return false;
            }
            let outcome = Arc::new(outcome);
            inner.outcome = Some(Arc::clone(&outcome));
            (
                outcome,
                mem::take(&mut inner.on_settle),
                mem::take(&mut inner.on_success),
                mem::take(&mut inner.on_error),
                mem::take(&mut inner.on_cancel),
            )
        };

        for hook in on_settle {
            hook(&outcome);
        }

        match &*outcome {
            Outcome::Fulfilled(value) => on_success.into_iter().for_each(|cb| cb(value)),
            Outcome::Rejected(reason) => on_error.into_iter().for_each(|cb| cb(reason)),
            Outcome::Cancelled(reason) => on_cancel.into_iter().for_each(|cb| cb(reason)),
        }
        true
    }

    /// Run `f` on whichever outcome is reached.
    ///
    /// Settle hooks run before the outcome-specific callbacks.
    pub fn on_settle(&self, f: impl FnOnce(&Outcome<T>) + Send + 'static) -> &Self {
        let outcome = {
            let mut inner = self.inner.lock();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    inner.on_settle.push(Box::new(f));
                    return self;
                }
            }
        };
        f(&outcome);
        self
    }

    /// Run `f` with the value once fulfilled.
    pub fn on_success(&self, f: impl FnOnce(&T) + Send + 'static) -> &Self {
        let outcome = {
            let mut inner = self.inner.lock();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    inner.on_success.push(Box::new(f));
                    return self;
                }
            }
        };
        if let Outcome::Fulfilled(value) = &*outcome {
            f(value);
        }
        self
    }

    /// Run `f` with the reason once rejected.
    pub fn on_error(&self, f: impl FnOnce(&Reason) + Send + 'static) -> &Self {
        let outcome = {
            let mut inner = self.inner.lock();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    inner.on_error.push(Box::new(f));
                    return self;
                }
            }
        };
        if let Outcome::Rejected(reason) = &*outcome {
            f(reason);
        }
        self
    }

    /// Run `f` with the reason once cancelled.
    pub fn on_cancel(&self, f: impl FnOnce(&Reason) + Send + 'static) -> &Self {
        let outcome = {
            let mut inner = self.inner.lock();
            match inner.outcome.clone() {
                Some(outcome) => outcome,
                None => {
                    inner.on_cancel.push(Box::new(f));
                    return self;
                }
            }
        };
        if let Outcome::Cancelled(reason) = &*outcome {
            f(reason);
        }
        self
    }

    /// Cancel with reason `"timeout"` if still pending after `after`.
    ///
    /// The timer is dropped as soon as the deferred settles. Outside a tokio
    /// runtime no timer can be scheduled and the call is ignored.
    pub fn timeout(&self, after: Duration) -> &Self {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(?after, "no runtime, timeout not scheduled");
            return self;
        };

        let weak = Arc::downgrade(&self.inner);
        let timer = handle.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(inner) = weak.upgrade() {
                if (Deferred { inner }).cancel("timeout") {
                    debug!(?after, "deferred timed out");
                }
            }
        });

        let abort = timer.abort_handle();
        self.on_settle(move |_| abort.abort())
    }

    /// Derive a deferred that settles when this one does.
    ///
    /// Fulfillment is mapped through `f`; rejection and cancellation pass
    /// through unchanged. Cancelling the derived deferred cancels this one.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let mapped = Deferred::new();
        {
            let mapped = mapped.clone();
            self.on_settle(move |outcome| {
                match outcome {
                    Outcome::Fulfilled(value) => mapped.resolve(f(value)),
                    Outcome::Rejected(reason) => mapped.reject(reason.clone()),
                    Outcome::Cancelled(reason) => mapped.cancel(reason.clone()),
                };
            });
        }
        {
            let source = self.clone();
            mapped.on_cancel(move |reason| {
                source.cancel(reason.clone());
            });
        }
        mapped
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// The terminal outcome, if reached.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.inner.lock().outcome.as_ref().map(|o| (**o).clone())
    }

    /// Wait asynchronously for the outcome.
    ///
    /// If every handle is dropped while still pending, the result is a
    /// cancellation with reason `"dropped"`.
    pub async fn wait(&self) -> Outcome<T> {
        let (tx, rx) = oneshot::channel();
        self.on_settle(move |outcome| {
            let _ = tx.send(outcome.clone());
        });
        rx.await
            .unwrap_or_else(|_| Outcome::Cancelled(Reason::from("dropped")))
    }
}
