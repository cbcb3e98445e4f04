//! reactive-memcache - Single-subscription reactive facade for memcached
//!
//! This library bridges an asynchronous, handle-based memcached driver into
//! cold single-value publishers. Building an operation performs no work;
//! each subscription starts one fresh driver operation and relays exactly
//! one terminal signal: a value, an empty completion for a miss, or an
//! error. Dropping or cancelling a subscription cancels the underlying
//! operation.
//!
//! ```ignore
//! use std::sync::Arc;
//! use reactive_memcache::{MemoryDriver, ReactiveMemcache};
//! use reactive_memcache::transcoder::StringTranscoder;
//!
//! let cache = ReactiveMemcache::new(Arc::new(MemoryDriver::new()));
//!
//! cache.set_with("greeting", 60, "hello".to_string(), StringTranscoder)
//!     .subscribe()
//!     .await?;
//! let value = cache.get_with("greeting", StringTranscoder).subscribe().await?;
//! assert_eq!(value.as_deref(), Some("hello"));
//! ```

pub mod bridge;
pub mod client;
pub mod driver;
pub mod error;
pub mod handle;
pub mod transcoder;

pub use bridge::{Mono, Subscription};
pub use client::ReactiveMemcache;
pub use driver::{CasOutcome, CasValue, MemcacheDriver, MemoryDriver};
pub use error::{CacheError, OperationFailure};
pub use handle::{BulkHandle, Completer, OperationHandle, Outcome};
pub use transcoder::{BytesTranscoder, JsonTranscoder, StringTranscoder, Transcoder};
