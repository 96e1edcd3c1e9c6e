//! Point lookup and index rebuild
//!
//! A lookup resolves a key to a bookmark, seeks the data volume straight to
//! the bookmarked page, decodes only that page, and confirms the key against
//! the record itself.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ArchiveError, Result};
use crate::record::{decode_entry, EntryCodec};
use crate::volume::{EntryLocation, Volume};

use super::appender::IndexAppender;
use super::bookmark::{Bookmark, BookmarkCodec, INDEX_KIND};

/// A record found by lookup, with where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub record: T,
    pub location: EntryLocation,
}

// =============================================================================
// In-memory Index
// =============================================================================

/// Bookmarks of an index volume loaded into an ordered map.
///
/// When a key appears more than once the latest bookmark wins.
#[derive(Debug, Clone)]
pub struct BookmarkIndex<K> {
    map: BTreeMap<K, EntryLocation>,
}

impl<K: Ord + Serialize + DeserializeOwned> BookmarkIndex<K> {
    /// Read every bookmark of `index`; entries of other kinds are ignored
    pub fn load<S: Read + Seek>(index: &Volume<S>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for_each_bookmark(index, |Bookmark { key, location }| {
            map.insert(key, location);
        })?;
        Ok(Self { map })
    }

    pub fn get(&self, key: &K) -> Option<EntryLocation> {
        self.map.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    /// Fetch the record for `key` from `data`
    pub fn find<T, C, S, F>(
        &self,
        data: &Volume<S>,
        key: &K,
        codec: &C,
        key_of: F,
    ) -> Result<Option<Located<T>>>
    where
        C: EntryCodec<T>,
        S: Read + Seek,
        F: Fn(&T) -> K,
    {
        match self.get(key) {
            Some(location) => fetch(data, location, key, codec, key_of),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Streaming Lookup
// =============================================================================

/// Find `key` by scanning `index` (without loading it) and fetching the hit
/// from `data`. The latest matching bookmark wins.
pub fn lookup<K, T, C, S1, S2, F>(
    data: &Volume<S1>,
    index: &Volume<S2>,
    key: &K,
    codec: &C,
    key_of: F,
) -> Result<Option<Located<T>>>
where
    K: PartialEq + Serialize + DeserializeOwned,
    C: EntryCodec<T>,
    S1: Read + Seek,
    S2: Read + Seek,
    F: Fn(&T) -> K,
{
    let mut found = None;
    for_each_bookmark(index, |bookmark: Bookmark<K>| {
        if bookmark.key == *key {
            found = Some(bookmark.location);
        }
    })?;

    match found {
        Some(location) => fetch(data, location, key, codec, key_of),
        None => Ok(None),
    }
}

/// Decode the page at `location` and return the record matching `key`.
///
/// The bookmarked entry offset is tried first; the rest of the page is
/// scanned if it does not match.
pub fn fetch<K, T, C, S, F>(
    data: &Volume<S>,
    location: EntryLocation,
    key: &K,
    codec: &C,
    key_of: F,
) -> Result<Option<Located<T>>>
where
    K: PartialEq,
    C: EntryCodec<T>,
    S: Read + Seek,
    F: Fn(&T) -> K,
{
    let page = data.read_page_at(location.page_offset)?;
    if page.id() != location.page_id {
        return Err(ArchiveError::corrupt(
            location.page_offset,
            format!(
                "bookmark expects page {}, found page {}",
                location.page_id,
                page.id()
            ),
        ));
    }

    if let Ok(entry) = page.entry_at(location.entry_offset) {
        if entry.kind == C::KIND {
            let record = codec.decode(&entry.data)?;
            if key_of(&record) == *key {
                return Ok(Some(Located {
                    record,
                    location: entry.location(),
                }));
            }
        }
    }

    for entry in page.entries() {
        let entry = entry?;
        if entry.kind != C::KIND {
            continue;
        }
        let record = codec.decode(&entry.data)?;
        if key_of(&record) == *key {
            return Ok(Some(Located {
                record,
                location: entry.location(),
            }));
        }
    }

    Ok(None)
}

fn for_each_bookmark<K, S, F>(index: &Volume<S>, mut f: F) -> Result<()>
where
    K: Serialize + DeserializeOwned,
    S: Read + Seek,
    F: FnMut(Bookmark<K>),
{
    let codec = BookmarkCodec::<K>::new();
    for entry in index.entries() {
        let entry = entry?;
        if entry.kind != INDEX_KIND {
            continue;
        }
        f(codec.decode(&entry.data)?);
    }
    Ok(())
}

// =============================================================================
// Rebuild
// =============================================================================

/// Replay `data` and write one bookmark per record of `codec`'s kind.
///
/// Entries of other kinds are skipped. Returns the number of bookmarks
/// written; the caller disposes `index` afterwards.
pub fn rebuild_index<K, T, C, S1, S2, F>(
    data: &Volume<S1>,
    codec: &C,
    key_of: F,
    index: &mut IndexAppender<'_, K, S2>,
) -> Result<u64>
where
    K: Serialize + DeserializeOwned,
    C: EntryCodec<T>,
    S1: Read + Seek,
    S2: Write + Seek,
    F: Fn(&T) -> K,
{
    let mut count = 0;
    for entry in data.entries() {
        let entry = entry?;
        if entry.kind != C::KIND {
            continue;
        }
        let record = decode_entry(codec, &entry)?;
        index.append(key_of(&record), entry.location())?;
        count += 1;
    }

    tracing::info!(
        volume = %data.metadata().name(),
        bookmarks = count,
        "Rebuilt index"
    );
    Ok(count)
}
