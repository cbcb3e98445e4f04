//! Future-to-reactive bridge.
//!
//! Converts an eagerly-started operation handle into a cold, single-value
//! publisher. Nothing happens when a `Mono` is built; every `subscribe` call
//! starts one fresh underlying operation, attaches the completion listener,
//! and relays the terminal signal through a one-shot channel. Cancelling the
//! subscription (explicitly or by dropping it before completion) requests
//! cancellation of the underlying handle.
//!
//! Exactly one terminal signal reaches the subscriber: a value, an error, or
//! an empty completion. Cancellation is the empty completion, never an error.
//!
//! The completion listener may fire on the driver's callback thread. The
//! relay only forwards into the channel and never blocks, so no particular
//! emission thread is assumed.

use std::collections::HashMap;
use std::future::{Future, IntoFuture};
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::handle::{BulkHandle, OperationHandle};

type StartFn<T> = Arc<dyn Fn() -> Result<OperationHandle<T>, CacheError> + Send + Sync>;

/// Terminal signal relayed from the completion listener to the subscriber.
/// An empty completion is signalled by dropping the sender without sending.
type Signal<T> = Result<Option<T>, CacheError>;

/// Cold publisher of at most one value.
///
/// Holds a start function and nothing else. Each subscription invokes it
/// once, so independent subscriptions map to independent underlying
/// operations with no shared state between them.
pub struct Mono<T> {
    start: StartFn<T>,
}

impl<T> Clone for Mono<T> {
    fn clone(&self) -> Self {
        Self {
            start: Arc::clone(&self.start),
        }
    }
}

impl<T: Send + 'static> Mono<T> {
    /// Defers an operation behind a cold publisher.
    ///
    /// `start` must begin the operation and return its handle without
    /// blocking. A synchronous `Err` (for example a value that cannot be
    /// encoded) becomes the subscription's error without any driver call.
    pub(crate) fn defer(
        start: impl Fn() -> Result<OperationHandle<T>, CacheError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    /// Starts one underlying operation and returns the subscription
    /// observing its terminal signal.
    pub fn subscribe(&self) -> Subscription<T> {
        let handle = match (self.start)() {
            Ok(handle) => handle,
            Err(err) => {
                debug!(error = %err, "operation could not be started");
                return Subscription::failed(err);
            }
        };

        let (tx, rx) = oneshot::channel::<Signal<T>>();
        let attached = handle.on_complete(move |h| {
            if h.is_cancelled() {
                // Dropping the sender yields the empty completion.
                return;
            }
            match h.take_outcome() {
                Some(Ok(value)) => {
                    let _ = tx.send(Ok(value));
                }
                Some(Err(failure)) => {
                    let _ = tx.send(Err(CacheError::from_failure(failure)));
                }
                // Outcome already consumed elsewhere; nothing left to relay.
                None => {}
            }
        });

        if let Err(err) = attached {
            // Nobody can observe this handle any more; stop the work it started.
            debug!(error = %err, "completion listener rejected, cancelling handle");
            handle.cancel();
            return Subscription::failed(err);
        }

        trace!("operation started and listener attached");
        Subscription::waiting(handle, rx)
    }
}

impl<T: Send + 'static> Mono<HashMap<String, T>> {
    /// Bulk variant of [`Mono::defer`].
    ///
    /// The bridge logic is identical; only the handle's listener type
    /// differs, carrying a keyed mapping instead of a scalar.
    pub(crate) fn defer_bulk(
        start: impl Fn() -> Result<BulkHandle<T>, CacheError> + Send + Sync + 'static,
    ) -> Self {
        Self::defer(start)
    }
}

impl<T: Send + 'static> IntoFuture for Mono<T> {
    type Output = Result<Option<T>, CacheError>;
    type IntoFuture = Subscription<T>;

    /// Subscribes once. The publisher stays cold until awaited.
    fn into_future(self) -> Self::IntoFuture {
        self.subscribe()
    }
}

enum SubscriptionState<T> {
    /// The start function or listener attachment failed synchronously.
    Failed(CacheError),
    /// Operation in flight; waiting for the relayed terminal signal.
    Waiting {
        handle: OperationHandle<T>,
        rx: oneshot::Receiver<Signal<T>>,
    },
    Finished,
}

/// One observer's interest in the outcome of one operation.
///
/// Resolves to `Ok(Some(value))`, `Ok(None)` for an empty completion
/// (cancellation, or an absent value such as a cache miss), or `Err` with the
/// underlying cause. Dropping the subscription before it resolves requests
/// cancellation of the underlying operation.
pub struct Subscription<T> {
    state: SubscriptionState<T>,
}

impl<T> Subscription<T> {
    fn failed(err: CacheError) -> Self {
        Self {
            state: SubscriptionState::Failed(err),
        }
    }

    fn waiting(handle: OperationHandle<T>, rx: oneshot::Receiver<Signal<T>>) -> Self {
        Self {
            state: SubscriptionState::Waiting { handle, rx },
        }
    }

    /// Requests cancellation of the underlying operation.
    ///
    /// Best effort and idempotent. The subscription then resolves with an
    /// empty completion.
    pub fn cancel(&self) {
        if let SubscriptionState::Waiting { handle, .. } = &self.state {
            handle.cancel();
        }
    }
}

impl<T> Future for Subscription<T> {
    type Output = Result<Option<T>, CacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match mem::replace(&mut this.state, SubscriptionState::Finished) {
            SubscriptionState::Failed(err) => Poll::Ready(Err(err)),
            SubscriptionState::Waiting { handle, mut rx } => match Pin::new(&mut rx).poll(cx) {
                Poll::Ready(Ok(signal)) => Poll::Ready(signal),
                // Sender dropped without a signal: cancelled, complete empty.
                Poll::Ready(Err(_)) => Poll::Ready(Ok(None)),
                Poll::Pending => {
                    this.state = SubscriptionState::Waiting { handle, rx };
                    Poll::Pending
                }
            },
            SubscriptionState::Finished => panic!("subscription polled after completion"),
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        // A subscription abandoned mid-flight cancels its operation. After a
        // terminal signal the state is Finished and this is a no-op.
        if let SubscriptionState::Waiting { handle, .. } = &self.state {
            handle.cancel();
        }
    }
}
