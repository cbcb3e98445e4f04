//! Typed operation facade.
//!
//! `ReactiveMemcache` exposes one method per cache operation. Each method is
//! a pure pass-through: it forwards its parameters to the matching driver
//! method and hands the resulting handle to the bridge. No validation, no
//! business logic, no state; every failure a subscriber observes originates
//! in the driver (or a transcoder) and is relayed verbatim.
//!
//! Methods come in two flavors. The plain form works on raw [`Bytes`]. The
//! `_with` form threads a [`Transcoder`] through the completion path, so
//! values are encoded and decoded per subscription and a codec failure
//! surfaces on the error channel without ever touching the driver.
//!
//! Every returned [`Mono`] is cold: building it performs no work, and each
//! subscription starts one fresh underlying operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::bridge::Mono;
use crate::driver::{CasOutcome, CasValue, MemcacheDriver};
use crate::transcoder::Transcoder;

/// Reactive facade over an asynchronous memcached driver.
///
/// Cheap to clone; clones share the same driver.
#[derive(Clone)]
pub struct ReactiveMemcache {
    driver: Arc<dyn MemcacheDriver>,
}

impl ReactiveMemcache {
    /// Wraps a driver.
    pub fn new(driver: Arc<dyn MemcacheDriver>) -> Self {
        Self { driver }
    }

    /// Fetches the raw value for a key. Misses complete empty.
    pub fn get(&self, key: &str) -> Mono<Bytes> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.get(&key)))
    }

    /// Fetches and decodes the value for a key.
    pub fn get_with<T, C>(&self, key: &str, transcoder: C) -> Mono<T>
    where
        T: Send + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let transcoder = Arc::new(transcoder);
        Mono::defer(move || {
            let transcoder = Arc::clone(&transcoder);
            driver.get(&key).map(move |data| transcoder.decode(data))
        })
    }

    /// Fetches the raw value together with its cas token.
    pub fn gets(&self, key: &str) -> Mono<CasValue<Bytes>> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.gets(&key)))
    }

    /// Fetches and decodes the value together with its cas token.
    pub fn gets_with<T, C>(&self, key: &str, transcoder: C) -> Mono<CasValue<T>>
    where
        T: Send + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let transcoder = Arc::new(transcoder);
        Mono::defer(move || {
            let transcoder = Arc::clone(&transcoder);
            driver.gets(&key).map(move |read| {
                Ok(CasValue {
                    cas: read.cas,
                    value: transcoder.decode(read.value)?,
                })
            })
        })
    }

    /// Fetches the value and updates its expiration.
    pub fn get_and_touch(&self, key: &str, exp: u32) -> Mono<CasValue<Bytes>> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.get_and_touch(&key, exp)))
    }

    /// Fetches and decodes the value, updating its expiration.
    pub fn get_and_touch_with<T, C>(&self, key: &str, exp: u32, transcoder: C) -> Mono<CasValue<T>>
    where
        T: Send + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let transcoder = Arc::new(transcoder);
        Mono::defer(move || {
            let transcoder = Arc::clone(&transcoder);
            driver.get_and_touch(&key, exp).map(move |read| {
                Ok(CasValue {
                    cas: read.cas,
                    value: transcoder.decode(read.value)?,
                })
            })
        })
    }

    /// Fetches raw values for several keys. The mapping contains only the
    /// keys that had a value.
    pub fn get_bulk(&self, keys: &[&str]) -> Mono<HashMap<String, Bytes>> {
        let driver = Arc::clone(&self.driver);
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        Mono::defer_bulk(move || Ok(driver.get_bulk(&keys)))
    }

    /// Fetches and decodes values for several keys.
    pub fn get_bulk_with<T, C>(&self, keys: &[&str], transcoder: C) -> Mono<HashMap<String, T>>
    where
        T: Send + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        let transcoder = Arc::new(transcoder);
        Mono::defer_bulk(move || {
            let transcoder = Arc::clone(&transcoder);
            driver.get_bulk(&keys).map(move |values| {
                values
                    .into_iter()
                    .map(|(key, data)| Ok((key, transcoder.decode(data)?)))
                    .collect()
            })
        })
    }

    /// Stores a raw value unconditionally.
    pub fn set(&self, key: &str, exp: u32, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.set(&key, exp, value.clone())))
    }

    /// Encodes and stores a value unconditionally.
    pub fn set_with<T, C>(&self, key: &str, exp: u32, value: T, transcoder: C) -> Mono<bool>
    where
        T: Send + Sync + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || {
            let data = transcoder.encode(&value)?;
            Ok(driver.set(&key, exp, data))
        })
    }

    /// Stores a raw value only if the key does not exist.
    pub fn add(&self, key: &str, exp: u32, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.add(&key, exp, value.clone())))
    }

    /// Encodes and stores a value only if the key does not exist.
    pub fn add_with<T, C>(&self, key: &str, exp: u32, value: T, transcoder: C) -> Mono<bool>
    where
        T: Send + Sync + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || {
            let data = transcoder.encode(&value)?;
            Ok(driver.add(&key, exp, data))
        })
    }

    /// Stores a raw value only if the key already exists.
    pub fn replace(&self, key: &str, exp: u32, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.replace(&key, exp, value.clone())))
    }

    /// Encodes and stores a value only if the key already exists.
    pub fn replace_with<T, C>(&self, key: &str, exp: u32, value: T, transcoder: C) -> Mono<bool>
    where
        T: Send + Sync + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || {
            let data = transcoder.encode(&value)?;
            Ok(driver.replace(&key, exp, data))
        })
    }

    /// Appends raw bytes to an existing value.
    pub fn append(&self, key: &str, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.append(&key, value.clone())))
    }

    /// Appends raw bytes when the cas token still matches.
    pub fn append_cas(&self, cas: u64, key: &str, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.append_cas(cas, &key, value.clone())))
    }

    /// Prepends raw bytes to an existing value.
    pub fn prepend(&self, key: &str, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.prepend(&key, value.clone())))
    }

    /// Prepends raw bytes when the cas token still matches.
    pub fn prepend_cas(&self, cas: u64, key: &str, value: impl Into<Bytes>) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.prepend_cas(cas, &key, value.clone())))
    }

    /// Stores a raw value when the cas token still matches. `exp` of `None`
    /// leaves the current expiration untouched.
    pub fn cas(
        &self,
        key: &str,
        cas: u64,
        exp: Option<u32>,
        value: impl Into<Bytes>,
    ) -> Mono<CasOutcome> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        let value = value.into();
        Mono::defer(move || Ok(driver.cas(&key, cas, exp, value.clone())))
    }

    /// Encodes and stores a value when the cas token still matches.
    pub fn cas_with<T, C>(
        &self,
        key: &str,
        cas: u64,
        exp: Option<u32>,
        value: T,
        transcoder: C,
    ) -> Mono<CasOutcome>
    where
        T: Send + Sync + 'static,
        C: Transcoder<T> + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || {
            let data = transcoder.encode(&value)?;
            Ok(driver.cas(&key, cas, exp, data))
        })
    }

    /// Updates the expiration of an existing value.
    pub fn touch(&self, key: &str, exp: u32) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.touch(&key, exp)))
    }

    /// Increments a numeric value. Completes empty if the key is missing.
    pub fn incr(&self, key: &str, by: u64) -> Mono<u64> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.incr(&key, by)))
    }

    /// Increments a numeric value, seeding it when the key is missing.
    pub fn incr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> Mono<u64> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.incr_with_default(&key, by, default, exp)))
    }

    /// Decrements a numeric value. Completes empty if the key is missing.
    pub fn decr(&self, key: &str, by: u64) -> Mono<u64> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.decr(&key, by)))
    }

    /// Decrements a numeric value, seeding it when the key is missing.
    pub fn decr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> Mono<u64> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.decr_with_default(&key, by, default, exp)))
    }

    /// Deletes a key.
    pub fn delete(&self, key: &str) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.delete(&key)))
    }

    /// Deletes a key when the cas token still matches.
    pub fn delete_cas(&self, key: &str, cas: u64) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        let key = key.to_owned();
        Mono::defer(move || Ok(driver.delete_cas(&key, cas)))
    }

    /// Invalidates all entries.
    pub fn flush(&self) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        Mono::defer(move || Ok(driver.flush()))
    }

    /// Invalidates all entries after a delay.
    pub fn flush_delayed(&self, delay: Duration) -> Mono<bool> {
        let driver = Arc::clone(&self.driver);
        Mono::defer(move || Ok(driver.flush_delayed(delay)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CasValueHandle, CounterHandle, StatusHandle, ValueHandle};
    use crate::error::CacheError;
    use crate::handle::{BulkHandle, OperationHandle};
    use crate::transcoder::StringTranscoder;
    use parking_lot::Mutex;

    /// Driver double that records every call and answers with canned
    /// outcomes, so forwarding and laziness can be asserted per operation.
    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingDriver {
        fn record(&self, call: String) {
            self.calls.lock().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    fn text(value: &Bytes) -> String {
        String::from_utf8_lossy(value).into_owned()
    }

    impl MemcacheDriver for RecordingDriver {
        fn get(&self, key: &str) -> ValueHandle {
            self.record(format!("get {key}"));
            OperationHandle::completed(Ok(Some(Bytes::from_static(b"value"))))
        }

        fn gets(&self, key: &str) -> CasValueHandle {
            self.record(format!("gets {key}"));
            OperationHandle::completed(Ok(Some(CasValue {
                cas: 7,
                value: Bytes::from_static(b"value"),
            })))
        }

        fn get_and_touch(&self, key: &str, exp: u32) -> CasValueHandle {
            self.record(format!("get_and_touch {key} {exp}"));
            OperationHandle::completed(Ok(Some(CasValue {
                cas: 7,
                value: Bytes::from_static(b"value"),
            })))
        }

        fn get_bulk(&self, keys: &[String]) -> BulkHandle<Bytes> {
            self.record(format!("get_bulk {}", keys.join(",")));
            let values = keys
                .iter()
                .map(|k| (k.clone(), Bytes::from_static(b"value")))
                .collect();
            OperationHandle::completed(Ok(Some(values)))
        }

        fn set(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
            self.record(format!("set {key} {exp} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn add(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
            self.record(format!("add {key} {exp} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn replace(&self, key: &str, exp: u32, value: Bytes) -> StatusHandle {
            self.record(format!("replace {key} {exp} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn append(&self, key: &str, value: Bytes) -> StatusHandle {
            self.record(format!("append {key} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn append_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle {
            self.record(format!("append_cas {cas} {key} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn prepend(&self, key: &str, value: Bytes) -> StatusHandle {
            self.record(format!("prepend {key} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn prepend_cas(&self, cas: u64, key: &str, value: Bytes) -> StatusHandle {
            self.record(format!("prepend_cas {cas} {key} {}", text(&value)));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn cas(&self, key: &str, cas: u64, exp: Option<u32>, value: Bytes) -> crate::driver::CasHandle {
            self.record(format!("cas {key} {cas} {exp:?} {}", text(&value)));
            OperationHandle::completed(Ok(Some(CasOutcome::Stored)))
        }

        fn touch(&self, key: &str, exp: u32) -> StatusHandle {
            self.record(format!("touch {key} {exp}"));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn incr(&self, key: &str, by: u64) -> CounterHandle {
            self.record(format!("incr {key} {by}"));
            OperationHandle::completed(Ok(Some(42)))
        }

        fn incr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle {
            self.record(format!("incr_with_default {key} {by} {default} {exp}"));
            OperationHandle::completed(Ok(Some(42)))
        }

        fn decr(&self, key: &str, by: u64) -> CounterHandle {
            self.record(format!("decr {key} {by}"));
            OperationHandle::completed(Ok(Some(42)))
        }

        fn decr_with_default(&self, key: &str, by: u64, default: u64, exp: u32) -> CounterHandle {
            self.record(format!("decr_with_default {key} {by} {default} {exp}"));
            OperationHandle::completed(Ok(Some(42)))
        }

        fn delete(&self, key: &str) -> StatusHandle {
            self.record(format!("delete {key}"));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn delete_cas(&self, key: &str, cas: u64) -> StatusHandle {
            self.record(format!("delete_cas {key} {cas}"));
            OperationHandle::completed(Ok(Some(true)))
        }

        fn flush(&self) -> StatusHandle {
            self.record("flush".to_string());
            OperationHandle::completed(Ok(Some(true)))
        }

        fn flush_delayed(&self, delay: Duration) -> StatusHandle {
            self.record(format!("flush_delayed {delay:?}"));
            OperationHandle::completed(Ok(Some(true)))
        }
    }

    fn recording_client() -> (Arc<RecordingDriver>, ReactiveMemcache) {
        let driver = Arc::new(RecordingDriver::default());
        let client = ReactiveMemcache::new(driver.clone());
        (driver, client)
    }

    /// One test per operation: no driver call before subscription, exactly
    /// one forwarded call with the given arguments afterwards.
    macro_rules! forwards_lazily {
        ($name:ident, $call:expr, $expected:expr) => {
            #[tokio::test]
            async fn $name() {
                let (driver, client) = recording_client();
                let mono = ($call)(&client);
                assert!(
                    driver.calls().is_empty(),
                    "driver invoked before subscription"
                );
                let _ = mono.subscribe().await;
                assert_eq!(driver.calls(), vec![$expected.to_string()]);
            }
        };
    }

    forwards_lazily!(test_get_forwards, |c: &ReactiveMemcache| c.get("k"), "get k");
    forwards_lazily!(
        test_get_with_forwards,
        |c: &ReactiveMemcache| c.get_with("k", StringTranscoder),
        "get k"
    );
    forwards_lazily!(test_gets_forwards, |c: &ReactiveMemcache| c.gets("k"), "gets k");
    forwards_lazily!(
        test_gets_with_forwards,
        |c: &ReactiveMemcache| c.gets_with("k", StringTranscoder),
        "gets k"
    );
    forwards_lazily!(
        test_get_and_touch_forwards,
        |c: &ReactiveMemcache| c.get_and_touch("k", 60),
        "get_and_touch k 60"
    );
    forwards_lazily!(
        test_get_and_touch_with_forwards,
        |c: &ReactiveMemcache| c.get_and_touch_with("k", 60, StringTranscoder),
        "get_and_touch k 60"
    );
    forwards_lazily!(
        test_get_bulk_forwards,
        |c: &ReactiveMemcache| c.get_bulk(&["a", "b"]),
        "get_bulk a,b"
    );
    forwards_lazily!(
        test_get_bulk_with_forwards,
        |c: &ReactiveMemcache| c.get_bulk_with(&["a", "b"], StringTranscoder),
        "get_bulk a,b"
    );
    forwards_lazily!(
        test_set_forwards,
        |c: &ReactiveMemcache| c.set("k", 60, "v"),
        "set k 60 v"
    );
    forwards_lazily!(
        test_set_with_forwards,
        |c: &ReactiveMemcache| c.set_with("k", 60, "v".to_string(), StringTranscoder),
        "set k 60 v"
    );
    forwards_lazily!(
        test_add_forwards,
        |c: &ReactiveMemcache| c.add("k", 60, "v"),
        "add k 60 v"
    );
    forwards_lazily!(
        test_add_with_forwards,
        |c: &ReactiveMemcache| c.add_with("k", 60, "v".to_string(), StringTranscoder),
        "add k 60 v"
    );
    forwards_lazily!(
        test_replace_forwards,
        |c: &ReactiveMemcache| c.replace("k", 60, "v"),
        "replace k 60 v"
    );
    forwards_lazily!(
        test_replace_with_forwards,
        |c: &ReactiveMemcache| c.replace_with("k", 60, "v".to_string(), StringTranscoder),
        "replace k 60 v"
    );
    forwards_lazily!(
        test_append_forwards,
        |c: &ReactiveMemcache| c.append("k", "v"),
        "append k v"
    );
    forwards_lazily!(
        test_append_cas_forwards,
        |c: &ReactiveMemcache| c.append_cas(9, "k", "v"),
        "append_cas 9 k v"
    );
    forwards_lazily!(
        test_prepend_forwards,
        |c: &ReactiveMemcache| c.prepend("k", "v"),
        "prepend k v"
    );
    forwards_lazily!(
        test_prepend_cas_forwards,
        |c: &ReactiveMemcache| c.prepend_cas(9, "k", "v"),
        "prepend_cas 9 k v"
    );
    forwards_lazily!(
        test_cas_forwards,
        |c: &ReactiveMemcache| c.cas("k", 9, Some(60), "v"),
        "cas k 9 Some(60) v"
    );
    forwards_lazily!(
        test_cas_with_forwards,
        |c: &ReactiveMemcache| c.cas_with("k", 9, None, "v".to_string(), StringTranscoder),
        "cas k 9 None v"
    );
    forwards_lazily!(
        test_touch_forwards,
        |c: &ReactiveMemcache| c.touch("k", 60),
        "touch k 60"
    );
    forwards_lazily!(test_incr_forwards, |c: &ReactiveMemcache| c.incr("k", 2), "incr k 2");
    forwards_lazily!(
        test_incr_with_default_forwards,
        |c: &ReactiveMemcache| c.incr_with_default("k", 2, 10, 60),
        "incr_with_default k 2 10 60"
    );
    forwards_lazily!(test_decr_forwards, |c: &ReactiveMemcache| c.decr("k", 2), "decr k 2");
    forwards_lazily!(
        test_decr_with_default_forwards,
        |c: &ReactiveMemcache| c.decr_with_default("k", 2, 10, 60),
        "decr_with_default k 2 10 60"
    );
    forwards_lazily!(
        test_delete_forwards,
        |c: &ReactiveMemcache| c.delete("k"),
        "delete k"
    );
    forwards_lazily!(
        test_delete_cas_forwards,
        |c: &ReactiveMemcache| c.delete_cas("k", 9),
        "delete_cas k 9"
    );
    forwards_lazily!(test_flush_forwards, |c: &ReactiveMemcache| c.flush(), "flush");
    forwards_lazily!(
        test_flush_delayed_forwards,
        |c: &ReactiveMemcache| c.flush_delayed(Duration::from_secs(30)),
        "flush_delayed 30s"
    );

    #[tokio::test]
    async fn test_each_subscription_reaches_the_driver() {
        let (driver, client) = recording_client();
        let mono = client.get("k");

        let _ = mono.subscribe().await;
        let _ = mono.subscribe().await;

        assert_eq!(driver.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_get_with_decodes_value() {
        let (_driver, client) = recording_client();
        let value = client
            .get_with("k", StringTranscoder)
            .subscribe()
            .await
            .unwrap();
        assert_eq!(value, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_gets_with_decodes_value_and_keeps_token() {
        let (_driver, client) = recording_client();
        let read = client
            .gets_with("k", StringTranscoder)
            .subscribe()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.cas, 7);
        assert_eq!(read.value, "value");
    }

    #[tokio::test]
    async fn test_get_bulk_with_decodes_all_values() {
        let (_driver, client) = recording_client();
        let values = client
            .get_bulk_with(&["a", "b"], StringTranscoder)
            .subscribe()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["a"], "value");
        assert_eq!(values["b"], "value");
    }

    struct RejectingTranscoder;

    impl Transcoder<String> for RejectingTranscoder {
        fn encode(&self, _value: &String) -> Result<Bytes, CacheError> {
            Err(CacheError::Transcode("refused".to_string().into()))
        }

        fn decode(&self, _data: Bytes) -> Result<String, CacheError> {
            Err(CacheError::Transcode("refused".to_string().into()))
        }
    }

    #[tokio::test]
    async fn test_encode_failure_never_reaches_the_driver() {
        let (driver, client) = recording_client();
        let result = client
            .set_with("k", 60, "v".to_string(), RejectingTranscoder)
            .subscribe()
            .await;

        assert!(matches!(result, Err(CacheError::Transcode(_))));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces_as_transcode_error() {
        let (_driver, client) = recording_client();
        let result = client.get_with("k", RejectingTranscoder).subscribe().await;
        assert!(matches!(result, Err(CacheError::Transcode(_))));
    }
}
