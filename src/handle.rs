//! Pending operation handles.
//!
//! An `OperationHandle` represents a single in-flight request to the
//! underlying cache client. It supports non-blocking completion notification
//! (one listener, fired at most once), cancellation, and non-blocking
//! retrieval of the outcome once done. The driver side holds the matching
//! `Completer` and delivers exactly one outcome.
//!
//! # Lifecycle
//!
//! ```text
//! pending --complete--> done       (listener fires with the outcome)
//! pending --cancel----> cancelled  (listener fires, observes is_cancelled)
//! ```
//!
//! Both transitions are one-way and race-safe. An outcome delivered after
//! cancellation is dropped: cancellation wins, even when a value was
//! technically available. Handles are owned by exactly one subscription and
//! are never shared or reused.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, OperationFailure};

/// Outcome of a completed operation.
///
/// `Ok(None)` is the absent-value marker (for example a cache miss); it is a
/// successful completion, not an error.
pub type Outcome<T> = Result<Option<T>, OperationFailure>;

/// Completion listener attached to a handle. Fires at most once, possibly on
/// the driver's callback thread.
pub type CompletionListener<T> = Box<dyn FnOnce(&OperationHandle<T>) + Send>;

/// Handle for a bulk operation yielding a keyed mapping. Same contract as a
/// scalar handle; only the listener's value type differs.
pub type BulkHandle<T> = OperationHandle<HashMap<String, T>>;

/// Completion listener for a bulk handle.
pub type BulkCompletionListener<T> = CompletionListener<HashMap<String, T>>;

enum State<T> {
    Pending {
        listener: Option<CompletionListener<T>>,
    },
    Done {
        outcome: Option<Outcome<T>>,
        notified: bool,
    },
    Cancelled {
        notified: bool,
    },
}

struct Inner<T> {
    state: Mutex<State<T>>,
    cancel_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    token: CancellationToken,
}

/// A single in-flight cache operation.
///
/// Cloning yields another view of the same operation; it does not start new
/// work.
pub struct OperationHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for OperationHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> OperationHandle<T> {
    /// Creates a pending handle together with the driver-side completer.
    pub fn pending() -> (Self, Completer<T>) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::Pending { listener: None }),
            cancel_hook: Mutex::new(None),
            token: CancellationToken::new(),
        });
        let token = inner.token.clone();
        (
            Self {
                inner: Arc::clone(&inner),
            },
            Completer {
                inner: Some(inner),
                token,
            },
        )
    }

    /// Creates a handle that is already done with the given outcome.
    ///
    /// Useful for drivers that can answer synchronously; the listener still
    /// fires, immediately, when attached.
    pub fn completed(outcome: Outcome<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Done {
                    outcome: Some(outcome),
                    notified: false,
                }),
                cancel_hook: Mutex::new(None),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Attaches the completion listener.
    ///
    /// The listener fires exactly once: when the operation completes or is
    /// cancelled, or immediately if that already happened. Attaching a second
    /// listener fails synchronously; each handle notifies one observer.
    pub fn on_complete(
        &self,
        listener: impl FnOnce(&OperationHandle<T>) + Send + 'static,
    ) -> Result<(), CacheError> {
        let fire_now = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { listener: slot } => {
                    if slot.is_some() {
                        return Err(CacheError::Listener(
                            "a completion listener is already attached".to_string(),
                        ));
                    }
                    *slot = Some(Box::new(listener));
                    None
                }
                State::Done { notified, .. } | State::Cancelled { notified } => {
                    if *notified {
                        return Err(CacheError::Listener(
                            "the completion listener already fired".to_string(),
                        ));
                    }
                    *notified = true;
                    Some(Box::new(listener) as CompletionListener<T>)
                }
            }
        };
        if let Some(listener) = fire_now {
            listener(self);
        }
        Ok(())
    }

    /// Whether the operation reached a terminal state (done or cancelled).
    pub fn is_done(&self) -> bool {
        !matches!(&*self.inner.state.lock(), State::Pending { .. })
    }

    /// Whether the operation was cancelled before completing.
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.inner.state.lock(), State::Cancelled { .. })
    }

    /// Requests cancellation of the operation.
    ///
    /// Best effort: the driver decides whether in-flight work actually stops.
    /// The first cancel of a pending handle trips the driver-visible token,
    /// runs the cancel hook, and notifies the listener. Cancelling a handle
    /// that already completed is a no-op, as is cancelling twice.
    pub fn cancel(&self) {
        let (listener, hook) = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { listener } => {
                    let listener = listener.take();
                    let notified = listener.is_some();
                    *state = State::Cancelled { notified };
                    (listener, self.inner.cancel_hook.lock().take())
                }
                _ => return,
            }
        };
        self.inner.token.cancel();
        if let Some(hook) = hook {
            hook();
        }
        if let Some(listener) = listener {
            listener(self);
        }
    }

    /// Retrieves the outcome of a completed operation.
    ///
    /// Non-blocking; returns `None` while pending, after cancellation, or if
    /// the outcome was already taken. The outcome can be taken once.
    pub fn take_outcome(&self) -> Option<Outcome<T>> {
        match &mut *self.inner.state.lock() {
            State::Done { outcome, .. } => outcome.take(),
            _ => None,
        }
    }

    /// Registers an action to run on the first cancel of this handle.
    fn set_cancel_hook(&self, hook: impl FnOnce() + Send + 'static) {
        *self.inner.cancel_hook.lock() = Some(Box::new(hook));
    }
}

impl<T: Send + 'static> OperationHandle<T> {
    /// Adapts this handle into one yielding a different value type.
    ///
    /// The mapping runs on the completion path, once, when this handle
    /// completes with a value. Cancelling the mapped handle cancels this one;
    /// cancellation of this handle cancels the mapped one. A mapping failure
    /// travels through the failure envelope and keeps its identity when the
    /// subscriber unwraps it.
    ///
    /// Fails synchronously if this handle already has a listener attached.
    pub fn map<U, F>(self, map: F) -> Result<OperationHandle<U>, CacheError>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, CacheError> + Send + 'static,
    {
        let (mapped, completer) = OperationHandle::pending();
        mapped.set_cancel_hook({
            let raw = self.clone();
            move || raw.cancel()
        });
        self.on_complete(move |raw| {
            if raw.is_cancelled() {
                completer.cancel();
                return;
            }
            match raw.take_outcome() {
                Some(Ok(Some(value))) => match map(value) {
                    Ok(mapped_value) => completer.complete(Ok(Some(mapped_value))),
                    Err(err) => completer.complete(Err(OperationFailure::new(err))),
                },
                Some(Ok(None)) => completer.complete(Ok(None)),
                Some(Err(failure)) => completer.complete(Err(failure)),
                None => completer.complete(Err(OperationFailure::message(
                    "operation completed without an outcome",
                ))),
            }
        })?;
        Ok(mapped)
    }
}

/// Driver-side handle used to deliver the outcome of an operation.
///
/// Exactly one of `complete` or `cancel` should be called. Dropping a
/// completer without delivering anything fails the handle, so a subscriber
/// never waits forever on a driver that lost track of an operation.
pub struct Completer<T> {
    inner: Option<Arc<Inner<T>>>,
    token: CancellationToken,
}

impl<T> Completer<T> {
    /// Delivers the outcome and notifies the listener.
    ///
    /// If the handle was cancelled in the meantime the outcome is silently
    /// dropped; cancellation wins.
    pub fn complete(mut self, outcome: Outcome<T>) {
        if let Some(inner) = self.inner.take() {
            deliver(inner, outcome);
        }
    }

    /// Marks the handle cancelled from the driver side.
    pub fn cancel(mut self) {
        if let Some(inner) = self.inner.take() {
            OperationHandle { inner }.cancel();
        }
    }

    /// Whether cancellation was requested for this operation.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token the driver can select on to observe cancellation requests.
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            deliver(
                inner,
                Err(OperationFailure::message(
                    "operation was abandoned by the driver",
                )),
            );
        }
    }
}

fn deliver<T>(inner: Arc<Inner<T>>, outcome: Outcome<T>) {
    let listener = {
        let mut state = inner.state.lock();
        match &mut *state {
            State::Pending { listener } => {
                let listener = listener.take();
                let notified = listener.is_some();
                *state = State::Done {
                    outcome: Some(outcome),
                    notified,
                };
                listener
            }
            // Cancellation wins: a result arriving afterwards is dropped.
            State::Cancelled { .. } => return,
            State::Done { .. } => return,
        }
    };
    if let Some(listener) = listener {
        listener(&OperationHandle { inner });
    }
}
