//! Value transcoders.
//!
//! A transcoder converts between stored bytes and typed values. The facade
//! wires a transcoder through the completion path of a typed operation;
//! everything below the facade works on raw bytes and has no serialization
//! opinions.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CacheError;

/// Converts between typed values and the bytes the cache stores.
///
/// Implementations must be cheap to call on the completion path and must not
/// block; a failure surfaces as [`CacheError::Transcode`] on the
/// subscription's error channel.
pub trait Transcoder<T>: Send + Sync {
    /// Encodes a value into its stored byte form.
    fn encode(&self, value: &T) -> Result<Bytes, CacheError>;

    /// Decodes stored bytes back into a value.
    fn decode(&self, data: Bytes) -> Result<T, CacheError>;
}

/// Identity transcoder for raw byte values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesTranscoder;

impl Transcoder<Bytes> for BytesTranscoder {
    fn encode(&self, value: &Bytes) -> Result<Bytes, CacheError> {
        Ok(value.clone())
    }

    fn decode(&self, data: Bytes) -> Result<Bytes, CacheError> {
        Ok(data)
    }
}

/// UTF-8 string transcoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTranscoder;

impl Transcoder<String> for StringTranscoder {
    fn encode(&self, value: &String) -> Result<Bytes, CacheError> {
        Ok(Bytes::copy_from_slice(value.as_bytes()))
    }

    fn decode(&self, data: Bytes) -> Result<String, CacheError> {
        String::from_utf8(data.to_vec()).map_err(|e| CacheError::Transcode(e.into()))
    }
}

/// JSON transcoder for any serde-serializable type.
#[derive(Debug)]
pub struct JsonTranscoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonTranscoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonTranscoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonTranscoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Transcoder<T> for JsonTranscoder<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, value: &T) -> Result<Bytes, CacheError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| CacheError::Transcode(e.into()))
    }

    fn decode(&self, data: Bytes) -> Result<T, CacheError> {
        serde_json::from_slice(&data).map_err(|e| CacheError::Transcode(e.into()))
    }
}
