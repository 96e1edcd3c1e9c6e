//! Bookmarks

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};
use crate::record::EntryCodec;
use crate::volume::EntryLocation;

/// Entry kind used for bookmark records
pub const INDEX_KIND: u8 = 16;

/// A correlation key and where its record was committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark<K> {
    pub key: K,
    pub location: EntryLocation,
}

impl<K> Bookmark<K> {
    pub fn new(key: K, location: EntryLocation) -> Self {
        Self { key, location }
    }
}

/// Bincode codec for bookmarks, tagged with [`INDEX_KIND`]
pub struct BookmarkCodec<K> {
    _key: PhantomData<fn() -> K>,
}

impl<K> BookmarkCodec<K> {
    pub fn new() -> Self {
        Self { _key: PhantomData }
    }
}

impl<K> Default for BookmarkCodec<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Serialize + DeserializeOwned> EntryCodec<Bookmark<K>> for BookmarkCodec<K> {
    const KIND: u8 = INDEX_KIND;

    fn encode(&self, record: &Bookmark<K>, out: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(out, record).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bookmark<K>> {
        bincode::deserialize(bytes).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}
