//! Appender Module
//!
//! Typed, single-owner writers that batch records into pages.
//!
//! ## Responsibilities
//! - Serialize records through an [`EntryCodec`]
//! - Frame them into the current page buffer
//! - Commit the page through the volume when it is full
//! - Notify an observer about every record once its page is durable
//!
//! ## Ownership
//! An appender belongs to one producer and needs no locking of its own.
//! Several appenders may share one volume; their pages interleave in commit
//! order while each appender's records stay in append order.

mod origin;

use std::io::{Seek, Write};

use crate::error::{ArchiveError, Result};
use crate::record::EntryCodec;
use crate::volume::{EntryLocation, PageBuffer, PageLocation, Volume, ENTRY_HEADER_SIZE};

pub use origin::{FixedClock, Origin, SystemClock, TimeSource};

/// Called once per record after the page holding it is committed
pub type CommitObserver<'a, T> = Box<dyn FnMut(&T, EntryLocation) + Send + 'a>;

/// Counters for one appender's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppenderStats {
    /// Records accepted by `append`
    pub records: u64,
    /// Pages committed
    pub pages: u64,
    /// Framed (pre-codec) bytes committed
    pub bytes: u64,
}

/// Typed writer bound to one volume
pub struct Appender<'a, T, C, S> {
    volume: &'a Volume<S>,
    codec: C,
    origin: Origin,
    /// Page being filled
    page: PageBuffer,
    /// Encode target; keeps a failed encode away from `page`
    scratch: Vec<u8>,
    /// Records of the current page awaiting the observer
    pending: Vec<(T, u32)>,
    observer: Option<CommitObserver<'a, T>>,
    /// Encoded stamp size, fixed by the origin's identity
    stamp_overhead: Option<usize>,
    stats: AppenderStats,
}

impl<'a, T, C: EntryCodec<T>, S: Write + Seek> Appender<'a, T, C, S> {
    /// Create an appender writing to `volume`
    pub fn new(volume: &'a Volume<S>, codec: C, origin: Origin) -> Self {
        Self {
            volume,
            codec,
            origin,
            page: PageBuffer::default(),
            scratch: Vec::new(),
            pending: Vec::new(),
            observer: None,
            stamp_overhead: None,
            stats: AppenderStats::default(),
        }
    }

    /// Install the page-commit observer.
    ///
    /// The observer sees each record with its location, in append order,
    /// only after the volume has committed the page. It cannot fail or undo
    /// the commit.
    pub fn with_observer(mut self, observer: impl FnMut(&T, EntryLocation) + Send + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Append one record.
    ///
    /// Commits the current page first when the record would not fit. A record
    /// that does not fit even an empty page, stamp included, is committed
    /// alone as an oversized page. When a full page fails to commit, the new
    /// record is taken back out so a retry does not store it twice.
    pub fn append(&mut self, record: T) -> Result<()> {
        self.volume.ensure_not_faulted()?;

        self.scratch.clear();
        self.codec.encode(&record, &mut self.scratch)?;

        let size = self.scratch.len();
        let limit = self.volume.config().max_entry_bytes;
        if size > limit {
            return Err(ArchiveError::EntryTooLarge { size, limit });
        }

        self.volume.freeze_layout();
        let page_size = self.volume.page_size_bytes();
        self.ensure_stamp_fits(page_size)?;

        // A started page already counts its stamp in `len`
        if self.page.entries() > 0 && self.page.len() + ENTRY_HEADER_SIZE + size > page_size {
            self.commit()?;
        }
        if !self.page.is_started() {
            self.page.begin(&self.origin.stamp())?;
        }

        let offset = self.page.push(C::KIND, &self.scratch);
        if self.observer.is_some() {
            self.pending.push((record, offset));
        }

        if self.page.len() >= page_size {
            if let Err(e) = self.commit() {
                self.page.pop_entry(offset);
                if self.observer.is_some() {
                    self.pending.pop();
                }
                return Err(e);
            }
        }
        self.stats.records += 1;
        Ok(())
    }

    /// Commit the buffered entries as a (possibly short) page
    pub fn flush(&mut self) -> Result<Option<PageLocation>> {
        self.commit()
    }

    /// Flush remaining entries and release the appender.
    ///
    /// Does not close the volume.
    pub fn dispose(mut self) -> Result<AppenderStats> {
        self.volume.ensure_not_faulted()?;
        self.commit()?;
        Ok(self.stats)
    }

    /// Records buffered but not yet committed
    pub fn buffered_records(&self) -> usize {
        self.page.entries()
    }

    pub fn stats(&self) -> AppenderStats {
        self.stats
    }

    pub fn volume(&self) -> &'a Volume<S> {
        self.volume
    }

    /// Fail when this appender's page stamp leaves no room for an entry
    fn ensure_stamp_fits(&mut self, page_size: usize) -> Result<()> {
        let overhead = match self.stamp_overhead {
            Some(overhead) => overhead,
            None => {
                let overhead = PageBuffer::stamp_overhead(&self.origin.stamp())?;
                self.stamp_overhead = Some(overhead);
                overhead
            }
        };
        if overhead + ENTRY_HEADER_SIZE >= page_size {
            return Err(ArchiveError::Validation(format!(
                "Origin stamp of {} bytes leaves no room for entries in {}-byte pages",
                overhead, page_size
            )));
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<Option<PageLocation>> {
        if self.page.entries() == 0 {
            return Ok(None);
        }

        let location = self.volume.commit_page(self.page.as_bytes())?;
        self.stats.pages += 1;
        self.stats.bytes += self.page.len() as u64;
        self.page.reset();

        if let Some(observer) = self.observer.as_mut() {
            for (record, offset) in self.pending.drain(..) {
                observer(&record, location.entry(offset));
            }
        }

        Ok(Some(location))
    }
}

impl<'a, T, C, S> Drop for Appender<'a, T, C, S> {
    fn drop(&mut self) {
        if self.page.entries() > 0 {
            tracing::warn!(
                volume = %self.volume.metadata().name(),
                records = self.page.entries(),
                "Appender dropped without dispose; buffered records are lost"
            );
        }
    }
}
