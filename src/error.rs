//! Error taxonomy for the reactive facade.
//!
//! Only three things can go wrong in this layer:
//! - the underlying operation itself fails (the driver reports a failure
//!   through its completion callback),
//! - attaching the completion listener fails synchronously,
//! - a value cannot be encoded or decoded by a transcoder.
//!
//! Cancellation is deliberately *not* an error. A cancelled subscription
//! completes empty, with no value and no error.

use thiserror::Error;

/// Boxed error cause, as delivered by the underlying client.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced through a subscription's error channel.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying operation failed. Carries the original cause,
    /// unwrapped from the driver's asynchronous failure envelope.
    #[error("cache operation failed: {0}")]
    Operation(Cause),

    /// A completion listener could not be attached to the operation handle.
    #[error("could not attach completion listener: {0}")]
    Listener(String),

    /// Encoding or decoding a value failed.
    #[error("value transcoding failed: {0}")]
    Transcode(Cause),
}

impl CacheError {
    /// Unwraps an asynchronous failure envelope into the error a subscriber
    /// should observe.
    ///
    /// If the envelope carries a `CacheError` it is surfaced directly, so a
    /// transcoding failure that crossed the completion callback keeps its
    /// identity. Any other cause becomes an `Operation` error.
    pub(crate) fn from_failure(failure: OperationFailure) -> Self {
        match failure.into_cause().downcast::<CacheError>() {
            Ok(inner) => *inner,
            Err(cause) => CacheError::Operation(cause),
        }
    }
}

/// Failure envelope used by operation handles.
///
/// The underlying client delivers failures to its completion callback wrapped
/// in an envelope, the same way a blocking `get` on its future would rethrow
/// a wrapped exception. Subscribers never see the envelope itself; the bridge
/// unwraps it and emits the cause.
#[derive(Debug, Error)]
#[error("asynchronous operation failed: {cause}")]
pub struct OperationFailure {
    cause: Cause,
}

impl OperationFailure {
    /// Wraps a concrete cause.
    pub fn new(cause: impl Into<Cause>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// Wraps a plain message when no richer cause is available.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            cause: message.into().into(),
        }
    }

    /// Borrows the wrapped cause.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// Consumes the envelope, yielding the wrapped cause.
    pub fn into_cause(self) -> Cause {
        self.cause
    }
}
