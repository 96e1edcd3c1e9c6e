//! Built-in record codecs

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ArchiveError, Result};

use super::EntryCodec;

/// Opaque byte payloads, stored as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl EntryCodec<Vec<u8>> for RawCodec {
    const KIND: u8 = 0;

    fn encode(&self, record: &Vec<u8>, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(record);
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 text
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl EntryCodec<String> for TextCodec {
    const KIND: u8 = 1;

    fn encode(&self, record: &String, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(record.as_bytes());
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ArchiveError::Serialization(format!("text entry is not UTF-8: {}", e)))
    }
}

/// JSON documents via serde_json
pub struct JsonCodec<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> EntryCodec<T> for JsonCodec<T> {
    const KIND: u8 = 2;

    fn encode(&self, record: &T, out: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(out, record).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}

/// Compact binary records via bincode
pub struct BincodeCodec<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> EntryCodec<T> for BincodeCodec<T> {
    const KIND: u8 = 3;

    fn encode(&self, record: &T, out: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(out, record).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}
