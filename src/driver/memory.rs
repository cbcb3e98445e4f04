//! In-process driver.
//!
//! `MemoryDriver` implements the full driver interface over a shared map,
//! with memcached-faithful semantics: cas tokens, ASCII-decimal counters
//! that floor at zero on decrement, lazy expiry, and delayed flush. It
//! stands in for a networked client in tests and examples.
//!
//! Completions are delivered from a spawned task rather than the calling
//! thread, so callers see the same callback-thread behavior a real client
//! produces. Cancellation is honored: an operation cancelled before its task
//! delivers never emits an outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use tokio::runtime::Handle as RuntimeHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::driver::{
    CasHandle, CasOutcome, CasValue, CasValueHandle, CounterHandle, MemcacheDriver, StatusHandle,
    ValueHandle,
};
use crate::error::OperationFailure;
use crate::handle::{BulkHandle, OperationHandle, Outcome};

#[derive(Clone)]
struct Entry {
    value: Bytes,
    cas: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

struct Shared {
    store: DashMap<String, Entry>,
    cas_counter: AtomicU64,
}

impl Shared {
    fn next_cas(&self) -> u64 {
        self.cas_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns a live (non-expired) entry, evicting it lazily if its
    /// expiration passed.
    fn lookup(&self, key: &str) -> Option<Entry> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value().clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.store.remove(key);
        }
        None
    }

    fn insert(&self, key: &str, exp: u32, value: Bytes) -> u64 {
        let cas = self.next_cas();
        self.store.insert(
            key.to_owned(),
            Entry {
                value,
                cas,
                expires_at: expires_at(exp),
            },
        );
        cas
    }
}

fn expires_at(exp: u32) -> Option<Instant> {
    // Relative seconds only; 0 means the entry never expires. The absolute
    // unix-timestamp form of the protocol is not modeled here.
    (exp > 0).then(|| Instant::now() + Duration::from_secs(u64::from(exp)))
}

fn concat(existing: &Bytes, extra: &Bytes, front: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(existing.len() + extra.len());
    if front {
        buf.extend_from_slice(extra);
        buf.extend_from_slice(existing);
    } else {
        buf.extend_from_slice(existing);
        buf.extend_from_slice(extra);
    }
    buf.freeze()
}

fn splice(shared: &Shared, key: &str, extra: Bytes, cas: Option<u64>, front: bool) -> Outcome<bool> {
    if shared.lookup(key).is_none() {
        return Ok(Some(false));
    }
    let Some(mut entry) = shared.store.get_mut(key) else {
        return Ok(Some(false));
    };
    if let Some(expected) = cas {
        if entry.cas != expected {
            return Ok(Some(false));
        }
    }
    entry.value = concat(&entry.value, &extra, front);
    entry.cas = shared.next_cas();
    Ok(Some(true))
}

fn counter(
    shared: &Shared,
    key: &str,
    apply: impl FnOnce(u64) -> u64,
    default: Option<(u64, u32)>,
) -> Outcome<u64> {
    if shared.lookup(key).is_none() {
        return match default {
            Some((seed, exp)) => {
                shared.insert(key, exp, Bytes::from(seed.to_string()));
                Ok(Some(seed))
            }
            None => Ok(None),
        };
    }
    let Some(mut entry) = shared.store.get_mut(key) else {
        return Ok(None);
    };
    let current: u64 = match std::str::from_utf8(&entry.value)
        .ok()
        .and_then(|text| text.trim().parse().ok())
    {
        Some(n) => n,
        None => {
            return Err(OperationFailure::message(
                "cannot increment or decrement non-numeric value",
            ))
        }
    };
    let next = apply(current);
    entry.value = Bytes::from(next.to_string());
    entry.cas = shared.next_cas();
    Ok(Some(next))
}

/// Driver keeping all entries in process memory.
#[derive(Clone)]
pub struct MemoryDriver {
    shared: Arc<Shared>,
    runtime: RuntimeHandle,
}

impl MemoryDriver {
    /// Creates an empty driver.
    ///
    /// Must be called inside a tokio runtime: completions are delivered from
    /// tasks spawned on it.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                store: DashMap::new(),
                cas_counter: AtomicU64::new(1),
            }),
            runtime: RuntimeHandle::current(),
        }
    }

    /// Number of live entries, for diagnostics.
    pub fn entry_count(&self) -> usize {
        self.shared.store.len()
    }

    /// Starts one operation: the work runs on a spawned task and the outcome
    /// is delivered through the completer, unless cancellation wins first.
    fn start<T, F>(&self, op: F) -> OperationHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&Shared) -> Outcome<T> + Send + 'static,
    {
        let (handle, completer) = OperationHandle::pending();
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let outcome = op(&shared);
            completer.complete(outcome);
        });
        handle
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemcacheDriver for MemoryDriver {
    fn get(&self, key: &str) -> ValueHandle {
        let key = key.to_owned();
        self.start(move |shared| Ok(shared.lookup(&key).map(|entry| entry.value)))
    }

    fn gets(&self, key: &str) -> CasValueHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            Ok(shared.lookup(&key).map(|entry| CasValue {
                cas: entry.cas,
                value: entry.value,
            }))
        })
    }

    fn get_and_touch(&self, key: &str, exp: u32) -> CasValueHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            if shared.lookup(&key).is_none() {
                return Ok(None);
            }
            let Some(mut entry) = shared.store.get_mut(&key) else {
                return Ok(None);
            };
            entry.expires_at = expires_at(exp);
            Ok(Some(CasValue {
                cas: entry.cas,
                value: entry.value.clone(),
            }))
        })
    }

    fn get_bulk(&self, keys: &[String]) -> BulkHandle<Bytes> {
        let keys = keys.to_vec();
        self.start(move |shared| {
            let mut values = HashMap::new();
            for key in keys {
                if let Some(entry) = shared.lookup(&key) {
                    values.insert(key, entry.value);
                }
            }
            Ok(Some(values))
        })
    }

    fn set(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            shared.insert(&key, exp, value);
            trace!(key = %key, "set");
            Ok(Some(true))
        })
    }

    fn add(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            if shared.lookup(&key).is_some() {
                return Ok(Some(false));
            }
            shared.insert(&key, exp, value);
            Ok(Some(true))
        })
    }

    fn replace(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            if shared.lookup(&key).is_none() {
                return Ok(Some(false));
            }
            shared.insert(&key, exp, value);
            Ok(Some(true))
        })
    }

    fn append(&self, key: &str, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| splice(shared, &key, value, None, false))
    }

    fn append_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| splice(shared, &key, value, Some(cas), false))
    }

    fn prepend(&self, key: &str, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| splice(shared, &key, value, None, true))
    }

    fn prepend_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| splice(shared, &key, value, Some(cas), true))
    }

    fn cas(&self, key: &str, cas: u64, exp: Option<u32>, value: Bytes) -> CasHandle {
        let key = key.to_owned();
        self.start(move |shared| match shared.lookup(&key) {
            None => Ok(Some(CasOutcome::NotFound)),
            Some(current) if current.cas != cas => Ok(Some(CasOutcome::Exists)),
            Some(current) => {
                let entry = Entry {
                    value,
                    cas: shared.next_cas(),
                    expires_at: match exp {
                        Some(exp) => expires_at(exp),
                        None => current.expires_at,
                    },
                };
                shared.store.insert(key, entry);
                Ok(Some(CasOutcome::Stored))
            }
        })
    }

    fn touch(&self, key: &str, exp: u32) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            if shared.lookup(&key).is_none() {
                return Ok(Some(false));
            }
            let Some(mut entry) = shared.store.get_mut(&key) else {
                return Ok(Some(false));
            };
            entry.expires_at = expires_at(exp);
            Ok(Some(true))
        })
    }

    fn incr(&self, key: &str, by: u64) -> CounterHandle {
        let key = key.to_owned();
        self.start(move |shared| counter(shared, &key, |n| n.wrapping_add(by), None))
    }

    fn incr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            counter(shared, &key, |n| n.wrapping_add(by), Some((default, exp)))
        })
    }

    fn decr(&self, key: &str, by: u64) -> CounterHandle {
        let key = key.to_owned();
        self.start(move |shared| counter(shared, &key, |n| n.saturating_sub(by), None))
    }

    fn decr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            counter(shared, &key, |n| n.saturating_sub(by), Some((default, exp)))
        })
    }

    fn delete(&self, key: &str) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| {
            if shared.lookup(&key).is_none() {
                return Ok(Some(false));
            }
            Ok(Some(shared.store.remove(&key).is_some()))
        })
    }

    fn delete_cas(&self, key: &str, cas: u64) -> StatusHandle {
        let key = key.to_owned();
        self.start(move |shared| match shared.lookup(&key) {
            Some(current) if current.cas == cas => Ok(Some(shared.store.remove(&key).is_some())),
            _ => Ok(Some(false)),
        })
    }

    fn flush(&self) -> StatusHandle {
        self.start(move |shared| {
            let entries = shared.store.len();
            shared.store.clear();
            debug!(entries, "flushed all entries");
            Ok(Some(true))
        })
    }

    fn flush_delayed(&self, delay: Duration) -> StatusHandle {
        let (handle, completer) = OperationHandle::pending();
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            let cancelled = completer.cancellation();
            tokio::select! {
                _ = cancelled.cancelled() => {
                    trace!("delayed flush cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    let entries = shared.store.len();
                    shared.store.clear();
                    debug!(entries, delay_secs = delay.as_secs(), "flushed all entries");
                    completer.complete(Ok(Some(true)));
                }
            }
        });
        handle
    }
}
