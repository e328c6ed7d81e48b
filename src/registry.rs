//! Session-scoped bookkeeping of live deferreds.
//!
//! Every deferred a client hands out is created here so a disconnect can
//! terminate all of them at once. Entries remove themselves the moment they
//! settle, whatever the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::deferred::{Deferred, Reason};

/// Type-erased terminal operations of a [`Deferred`].
trait Settle: Send + Sync {
    fn cancel_with(&self, reason: &Reason) -> bool;
    fn reject_with(&self, reason: &Reason) -> bool;
}

impl<T: Send + Sync + 'static> Settle for Deferred<T> {
    fn cancel_with(&self, reason: &Reason) -> bool {
        self.cancel(reason.clone())
    }

    fn reject_with(&self, reason: &Reason) -> bool {
        self.reject(reason.clone())
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    pending: BTreeMap<u64, Arc<dyn Settle>>,
}

/// Set of pending deferreds belonging to one client.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracked deferred.
    pub fn create<T: Send + Sync + 'static>(&self) -> Deferred<T> {
        let deferred = Deferred::new();
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.pending.insert(id, Arc::new(deferred.clone()));
            id
        };

        let registry = Arc::downgrade(&self.inner);
        deferred.on_settle(move |_| {
            if let Some(registry) = registry.upgrade() {
                registry.lock().pending.remove(&id);
            }
        });
        deferred
    }

    /// Number of tracked deferreds still pending.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Cancel every pending deferred.
    pub fn cancel_all(&self, reason: impl Into<Reason>) -> usize {
        let reason = reason.into();
        let settled = self
            .snapshot()
            .into_iter()
            .filter(|d| d.cancel_with(&reason))
            .count();
        debug!(%reason, settled, "cancelled pending operations");
        settled
    }

    /// Reject every pending deferred.
    pub fn error_all(&self, reason: impl Into<Reason>) -> usize {
        let reason = reason.into();
        let settled = self
            .snapshot()
            .into_iter()
            .filter(|d| d.reject_with(&reason))
            .count();
        debug!(%reason, settled, "rejected pending operations");
        settled
    }

    /// Copy of the pending set, so settling (which removes entries) never
    /// runs under the lock.
    fn snapshot(&self) -> Vec<Arc<dyn Settle>> {
        self.inner.lock().pending.values().cloned().collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("pending", &self.pending())
            .finish()
    }
}
