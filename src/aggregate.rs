//! Combining several operations into one completion.
//!
//! An [`Aggregate`] tracks N sub-operations. Each one owns the result slot
//! at the index it was added with, so the final results come back in add
//! order however the operations settle. The group finishes exactly once,
//! either when every slot is filled after [`Aggregate::seal`], or when
//! [`Aggregate::finish`] forces it early.

use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::deferred::{Deferred, Outcome, Reason};

/// A sub-operation an [`Aggregate`] can wait on.
pub trait Operation<T>: Send + Sync {
    /// Register `handler` to run once with the terminal outcome.
    fn subscribe(&self, handler: Box<dyn FnOnce(&Outcome<T>) + Send>);

    /// Ask the operation to stop. Returns whether the request had effect.
    ///
    /// Operations without a cancel capability keep the default.
    fn try_cancel(&self, _reason: &Reason) -> bool {
        false
    }
}

impl<T: Send + Sync + 'static> Operation<T> for Deferred<T> {
    fn subscribe(&self, handler: Box<dyn FnOnce(&Outcome<T>) + Send>) {
        self.on_settle(handler);
    }

    fn try_cancel(&self, reason: &Reason) -> bool {
        self.cancel(reason.clone())
    }
}

/// Per-slot results, `None` where a slot never settled.
pub type Results<T> = Vec<Option<Outcome<T>>>;

type SlotCallback<X> = Arc<dyn Fn(usize, &X) + Send + Sync>;
type FinishCallback<T> = Box<dyn FnOnce(&[Option<Outcome<T>>]) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Accepting sub-operations; completion deferred until sealed.
    Collecting,
    /// No more adds expected; completes when the last slot fills.
    Sealed,
    /// Forced finish in progress.
    Finishing,
    Finished,
}

struct AggregateInner<T> {
    phase: Phase,
    ops: Vec<Option<Arc<dyn Operation<T>>>>,
    slots: Results<T>,
    remaining: usize,
    on_success: Vec<SlotCallback<T>>,
    on_error: Vec<SlotCallback<Reason>>,
    on_cancel: Vec<SlotCallback<Reason>>,
    on_finish: Vec<FinishCallback<T>>,
    results: Option<Arc<Results<T>>>,
}

impl<T: Clone> AggregateInner<T> {
    /// Settled slots whose outcome passes `keep`, in index order.
    fn settled(&self, keep: fn(&Outcome<T>) -> bool) -> Vec<(usize, Outcome<T>)> {
        let slots = self.results.as_deref().unwrap_or(&self.slots);
        slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|outcome| keep(outcome))
                    .map(|outcome| (index, outcome.clone()))
            })
            .collect()
    }
}

/// Ordered combinator over sub-operations.
pub struct Aggregate<T> {
    inner: Arc<Mutex<AggregateInner<T>>>,
}

impl<T> Clone for Aggregate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Aggregate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Aggregate<T> {
    /// Create an empty aggregate in the collecting phase.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(AggregateInner {
                phase: Phase::Collecting,
                ops: Vec::new(),
                slots: Vec::new(),
                remaining: 0,
                on_success: Vec::new(),
                on_error: Vec::new(),
                on_cancel: Vec::new(),
                on_finish: Vec::new(),
                results: None,
            })),
        }
    }

    /// Add a sub-operation and return its slot index.
    ///
    /// Once the aggregate has finished the operation is refused: it gets a
    /// cancel request instead and `None` is returned.
    pub fn add(&self, op: impl Operation<T> + 'static) -> Option<usize> {
        let op: Arc<dyn Operation<T>> = Arc::new(op);

        let index = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::Finishing | Phase::Finished => None,
                Phase::Collecting | Phase::Sealed => {
                    inner.ops.push(Some(Arc::clone(&op)));
                    inner.slots.push(None);
                    inner.remaining += 1;
                    Some(inner.slots.len() - 1)
                }
            }
        };

        let Some(index) = index else {
            warn!("operation added to a finished aggregate");
            op.try_cancel(&Reason::from("finished"));
            return None;
        };

        let aggregate = self.clone();
        op.subscribe(Box::new(move |outcome: &Outcome<T>| {
            aggregate.settle_slot(index, outcome)
        }));
        Some(index)
    }

    /// Mark the end of the add phase.
    ///
    /// Completes immediately if every slot has already settled.
    pub fn seal(&self) {
        let complete = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Collecting {
                return;
            }
            inner.phase = Phase::Sealed;
            inner.remaining == 0
        };
        if complete {
            self.complete();
        }
    }

    /// Finish now, cancelling every sub-operation that has not settled.
    ///
    /// Each pending sub-operation gets exactly one cancel request; the
    /// finish callbacks then see whatever results exist.
    pub fn finish(&self) {
        let pending: Vec<Arc<dyn Operation<T>>> = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::Finishing | Phase::Finished => return,
                Phase::Collecting | Phase::Sealed => inner.phase = Phase::Finishing,
            }
            inner.ops.iter().flatten().cloned().collect()
        };

        debug!(pending = pending.len(), "finishing aggregate early");
        let reason = Reason::from("finished");
        for op in pending {
            op.try_cancel(&reason);
        }
        self.complete();
    }

    fn settle_slot(&self, index: usize, outcome: &Outcome<T>) {
        let (success, error, cancel, complete) = {
            let mut inner = self.inner.lock();
            if inner.phase == Phase::Finished || inner.slots[index].is_some() {
                return;
            }
            inner.slots[index] = Some(outcome.clone());
            inner.ops[index] = None;
            inner.remaining -= 1;

            let complete = inner.remaining == 0 && inner.phase == Phase::Sealed;
            match outcome {
                Outcome::Fulfilled(_) => {
                    (inner.on_success.clone(), Vec::new(), Vec::new(), complete)
                }
                Outcome::Rejected(_) => (Vec::new(), inner.on_error.clone(), Vec::new(), complete),
                Outcome::Cancelled(_) => {
                    (Vec::new(), Vec::new(), inner.on_cancel.clone(), complete)
                }
            }
        };

        match outcome {
            Outcome::Fulfilled(value) => success.iter().for_each(|cb| cb(index, value)),
            Outcome::Rejected(reason) => error.iter().for_each(|cb| cb(index, reason)),
            Outcome::Cancelled(reason) => cancel.iter().for_each(|cb| cb(index, reason)),
        }

        if complete {
            self.complete();
        }
    }

    fn complete(&self) {
        let (callbacks, results) = {
            let mut inner = self.inner.lock();
            if inner.phase == Phase::Finished {
                return;
            }
            inner.phase = Phase::Finished;
            inner.ops.clear();
            inner.on_success.clear();
            inner.on_error.clear();
            inner.on_cancel.clear();

            let results = Arc::new(mem::take(&mut inner.slots));
            inner.results = Some(Arc::clone(&results));
            (mem::take(&mut inner.on_finish), results)
        };

        for cb in callbacks {
            cb(&results);
        }
    }

    /// Run `f` with `(index, value)` each time a slot is fulfilled.
    ///
    /// Slots fulfilled before registration are replayed at once, in index
    /// order.
    pub fn on_success(&self, f: impl Fn(usize, &T) + Send + Sync + 'static) -> &Self {
        let f: SlotCallback<T> = Arc::new(f);
        let replay = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Finished {
                inner.on_success.push(Arc::clone(&f));
            }
            inner.settled(|o| matches!(o, Outcome::Fulfilled(_)))
        };
        for (index, outcome) in &replay {
            if let Outcome::Fulfilled(value) = outcome {
                f(*index, value);
            }
        }
        self
    }

    /// Run `f` with `(index, reason)` each time a slot is rejected.
    ///
    /// Earlier rejections are replayed like [`on_success`](Self::on_success).
    pub fn on_error(&self, f: impl Fn(usize, &Reason) + Send + Sync + 'static) -> &Self {
        let f: SlotCallback<Reason> = Arc::new(f);
        let replay = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Finished {
                inner.on_error.push(Arc::clone(&f));
            }
            inner.settled(|o| matches!(o, Outcome::Rejected(_)))
        };
        for (index, outcome) in &replay {
            if let Outcome::Rejected(reason) = outcome {
                f(*index, reason);
            }
        }
        self
    }

    /// Run `f` with `(index, reason)` each time a slot is cancelled.
    ///
    /// Earlier cancellations are replayed like [`on_success`](Self::on_success).
    pub fn on_cancel(&self, f: impl Fn(usize, &Reason) + Send + Sync + 'static) -> &Self {
        let f: SlotCallback<Reason> = Arc::new(f);
        let replay = {
            let mut inner = self.inner.lock();
            if inner.phase != Phase::Finished {
                inner.on_cancel.push(Arc::clone(&f));
            }
            inner.settled(|o| matches!(o, Outcome::Cancelled(_)))
        };
        for (index, outcome) in &replay {
            if let Outcome::Cancelled(reason) = outcome {
                f(*index, reason);
            }
        }
        self
    }

    /// Run `f` once with every slot's result, in add order.
    ///
    /// Fires immediately if the aggregate has already finished.
    pub fn on_finish(&self, f: impl FnOnce(&[Option<Outcome<T>>]) + Send + 'static) -> &Self {
        let results = {
            let mut inner = self.inner.lock();
            match inner.results.clone() {
                Some(results) => results,
                None => {
                    inner.on_finish.push(Box::new(f));
                    return self;
                }
            }
        };
        f(&results);
        self
    }

    /// Wait asynchronously for the group to finish.
    pub async fn wait(&self) -> Results<T> {
        let (tx, rx) = oneshot::channel();
        self.on_finish(move |results| {
            let _ = tx.send(results.to_vec());
        });
        rx.await.unwrap_or_default()
    }

    /// Number of sub-operations added.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .results
            .as_ref()
            .map_or(inner.slots.len(), |r| r.len())
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sub-operations that have not settled.
    pub fn remaining(&self) -> usize {
        self.inner.lock().remaining
    }

    /// Whether the group has finished.
    pub fn is_finished(&self) -> bool {
        self.inner.lock().phase == Phase::Finished
    }
}
