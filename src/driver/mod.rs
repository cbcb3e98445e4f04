//! Underlying client interface.
//!
//! The driver is the external collaborator that actually talks memcached:
//! connections, hashing, timeouts and retries all live behind this trait.
//! Every method starts one asynchronous operation without blocking and
//! returns its handle; completion arrives later on the driver's callback
//! thread. This crate never interprets the work, it only observes handles.
//!
//! The interface is byte-level (`Bytes` values); typed access is layered on
//! top by the facade through transcoders.

use std::time::Duration;

use bytes::Bytes;

use crate::handle::{BulkHandle, OperationHandle};

pub mod memory;

pub use memory::MemoryDriver;

/// Handle for operations yielding a raw value; absent on a miss.
pub type ValueHandle = OperationHandle<Bytes>;

/// Handle for operations yielding a success flag.
pub type StatusHandle = OperationHandle<bool>;

/// Handle for counter operations; absent when the key does not exist.
pub type CounterHandle = OperationHandle<u64>;

/// Handle for compare-and-swap stores.
pub type CasHandle = OperationHandle<CasOutcome>;

/// Handle for reads that also return the value's cas token.
pub type CasValueHandle = OperationHandle<CasValue<Bytes>>;

/// A value paired with the cas token it was read under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CasValue<T> {
    /// Token identifying the stored version of the value.
    pub cas: u64,
    /// The value itself.
    pub value: T,
}

/// Result of a compare-and-swap store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The value was stored; the token matched.
    Stored,
    /// The key exists but the token did not match.
    Exists,
    /// The key does not exist.
    NotFound,
}

/// Asynchronous memcached client.
///
/// Expirations are relative seconds; `0` means the entry never expires.
/// Counter values are unsigned 64-bit, stored in the ASCII-decimal form the
/// protocol uses.
pub trait MemcacheDriver: Send + Sync + 'static {
    /// Fetches the value for a key.
    fn get(&self, key: &str) -> ValueHandle;

    /// Fetches the value and its cas token.
    fn gets(&self, key: &str) -> CasValueHandle;

    /// Fetches the value and updates its expiration.
    fn get_and_touch(&self, key: &str, exp: u32) -> CasValueHandle;

    /// Fetches values for several keys. Keys without a value are absent from
    /// the resulting mapping; the mapping itself is always delivered.
    fn get_bulk(&self, keys: &[String]) -> BulkHandle<Bytes>;

    /// Stores a value unconditionally.
    fn set(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle;

    /// Stores a value only if the key does not exist.
    fn add(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle;

    /// Stores a value only if the key already exists.
    fn replace(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle;

    /// Appends bytes to an existing value.
    fn append(&self, key: &str, value: Bytes) -> StatusHandle;

    /// Appends bytes when the cas token still matches.
    fn append_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle;

    /// Prepends bytes to an existing value.
    fn prepend(&self, key: &str, value: Bytes) -> StatusHandle;

    /// Prepends bytes when the cas token still matches.
    fn prepend_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle;

    /// Stores a value when the cas token still matches. `exp` of `None`
    /// leaves the current expiration untouched.
    fn cas(&self, key: &str, cas: u64, exp: Option<u32>, value: Bytes) -> CasHandle;

    /// Updates the expiration of an existing value.
    fn touch(&self, key: &str, exp: u32) -> StatusHandle;

    /// Increments a numeric value.
    fn incr(&self, key: &str, by: u64) -> CounterHandle;

    /// Increments a numeric value, seeding it when the key is missing.
    fn incr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle;

    /// Decrements a numeric value; the protocol floors at zero.
    fn decr(&self, key: &str, by: u64) -> CounterHandle;

    /// Decrements a numeric value, seeding it when the key is missing.
    fn decr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle;

    /// Deletes a key.
    fn delete(&self, key: &str) -> StatusHandle;

    /// Deletes a key when the cas token still matches.
    fn delete_cas(&self, key: &str, cas: u64) -> StatusHandle;

    /// Invalidates all entries.
    fn flush(&self) -> StatusHandle;

    /// Invalidates all entries after a delay.
    fn flush_delayed(&self, delay: Duration) -> StatusHandle;
}
