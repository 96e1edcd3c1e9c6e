//! Index Appender
//!
//! Writes bookmarks into an index volume. Input arrives either directly from
//! a primary appender's observer (`observe`) or through a bookmark channel
//! shared by several primary appenders (`drain`).

use std::io::{Seek, Write};

use crossbeam::channel::{self, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::appender::{Appender, AppenderStats, Origin};
use crate::error::{ArchiveError, Result};
use crate::volume::{EntryLocation, Volume};

use super::bookmark::{Bookmark, BookmarkCodec};

/// Appender specialized for bookmarks
pub struct IndexAppender<'a, K, S> {
    appender: Appender<'a, Bookmark<K>, BookmarkCodec<K>, S>,
    /// First failure seen by `observe`, reported by `dispose`
    deferred: Option<ArchiveError>,
}

impl<'a, K: Serialize + DeserializeOwned, S: Write + Seek> IndexAppender<'a, K, S> {
    pub fn new(volume: &'a Volume<S>, origin: Origin) -> Self {
        Self {
            appender: Appender::new(volume, BookmarkCodec::new(), origin),
            deferred: None,
        }
    }

    /// Append a bookmark for a committed entry
    pub fn append(&mut self, key: K, location: EntryLocation) -> Result<()> {
        self.appender.append(Bookmark::new(key, location))
    }

    /// Infallible form of `append` for use inside commit observers.
    ///
    /// The first failure is logged and kept; later calls are ignored and
    /// `dispose` returns the failure.
    pub fn observe(&mut self, key: K, location: EntryLocation) {
        if self.deferred.is_some() {
            return;
        }
        if let Err(e) = self.append(key, location) {
            tracing::error!(
                volume = %self.appender.volume().metadata().name(),
                page_id = location.page_id,
                "Bookmark append failed; index stops here: {}",
                e
            );
            self.deferred = Some(e);
        }
    }

    /// Append every bookmark from `receiver` until all senders are dropped.
    ///
    /// Returns the number of bookmarks written.
    pub fn drain(&mut self, receiver: &Receiver<Bookmark<K>>) -> Result<u64> {
        let mut count = 0;
        for bookmark in receiver.iter() {
            self.appender.append(bookmark)?;
            count += 1;
        }
        Ok(count)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.appender.flush().map(|_| ())
    }

    /// Flush and release; reports a failure deferred by `observe`
    pub fn dispose(self) -> Result<AppenderStats> {
        if let Some(e) = self.deferred {
            return Err(e);
        }
        self.appender.dispose()
    }

    pub fn stats(&self) -> AppenderStats {
        self.appender.stats()
    }
}

// =============================================================================
// Bookmark Channel
// =============================================================================

/// Cloneable sending half handed to primary appenders' observers
pub struct BookmarkSender<K> {
    sender: Sender<Bookmark<K>>,
}

impl<K> Clone for BookmarkSender<K> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<K> BookmarkSender<K> {
    /// Queue a bookmark. Never blocks; if the index side is gone the
    /// bookmark is dropped, since the index can be rebuilt from the data.
    pub fn send(&self, key: K, location: EntryLocation) {
        if self.sender.send(Bookmark::new(key, location)).is_err() {
            tracing::debug!(page_id = location.page_id, "Bookmark receiver gone; bookmark dropped");
        }
    }
}

/// Unbounded channel connecting primary appenders to one index appender
pub fn bookmark_channel<K>() -> (BookmarkSender<K>, Receiver<Bookmark<K>>) {
    let (sender, receiver) = channel::unbounded();
    (BookmarkSender { sender }, receiver)
}
