//! Single-shot, cancellable result handoff between the host thread and a
//! blocked plugin thread.
//!
//! The cancel flag and the result slot are guarded separately. The executing
//! side holds the cancel lock for the whole operation (see
//! [`ApiPromise::lock`]), so a caller that cancels either waits for an
//! in-flight operation to finish or prevents it from starting at all.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::ApiResult;

struct Slot<T> {
    value: Mutex<Option<ApiResult<T>>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    fn store(&self, value: ApiResult<T>) -> bool {
        let mut slot = self.value.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.ready.notify_all();
        true
    }
}

/// Producer half. Shared between the caller and the queued operation.
pub struct ApiPromise<T> {
    cancelled: Mutex<bool>,
    slot: Arc<Slot<T>>,
}

/// Consumer half, held by the blocked caller.
pub struct ApiFuture<T> {
    slot: Arc<Slot<T>>,
}

/// Scoped lock over the cancel flag.
///
/// While a guard is alive nobody can cancel the promise, so checking
/// [`PromiseGuard::is_cancelled`] and later calling
/// [`PromiseGuard::set_value`] is atomic with respect to the caller.
pub struct PromiseGuard<'a, T> {
    promise: &'a ApiPromise<T>,
    cancelled: MutexGuard<'a, bool>,
}

impl<T> ApiPromise<T> {
    /// Create a promise together with its future.
    pub fn new() -> (Arc<Self>, ApiFuture<T>) {
        let slot = Arc::new(Slot {
            value: Mutex::new(None),
            ready: Condvar::new(),
        });
        let promise = Arc::new(Self {
            cancelled: Mutex::new(false),
            slot: Arc::clone(&slot),
        });
        (promise, ApiFuture { slot })
    }

    pub fn lock(&self) -> PromiseGuard<'_, T> {
        PromiseGuard {
            promise: self,
            cancelled: self.cancelled.lock(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Blocks while an operation holding the guard is in progress.
    pub fn cancel(&self) {
        *self.cancelled.lock() = true;
    }

    /// Store the result. Only the first write is kept; returns whether this
    /// call was that write.
    pub fn set_value(&self, value: ApiResult<T>) -> bool {
        let stored = self.slot.store(value);
        if !stored {
            tracing::debug!("Ignoring second write to an already fulfilled API promise");
        }
        stored
    }
}

impl<T> PromiseGuard<'_, T> {
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled
    }

    pub fn set_value(&self, value: ApiResult<T>) -> bool {
        self.promise.set_value(value)
    }
}

impl<T> ApiFuture<T> {
    pub fn is_ready(&self) -> bool {
        self.slot.value.lock().is_some()
    }

    /// Wait until a value is present or `timeout` elapses. Returns readiness.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.value.lock();
        while slot.is_none() {
            if self.slot.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.is_some();
            }
        }
        true
    }

    /// Block until the value arrives and take it.
    pub fn get(self) -> ApiResult<T> {
        let mut slot = self.slot.value.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.slot.ready.wait(&mut slot);
        }
    }
}
