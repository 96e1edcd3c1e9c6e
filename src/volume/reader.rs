//! Volume Reader
//!
//! Opens existing volumes and iterates pages, entries and typed records in
//! commit order.

use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize};

use parking_lot::Mutex;

use crate::config::{CorruptionPolicy, VolumeConfig};
use crate::error::{ArchiveError, Result};
use crate::record::EntryCodec;
use crate::scheme::SchemeRegistry;

use super::page::{self, Frame, RawFrame};
use super::{
    header, Entry, Page, PageEntries, Volume, VolumeInner, VolumeMode, VolumeState, END_MAGIC,
    PAGE_MAGIC,
};

/// Chunk size used while scanning for the next frame after damage
const RESYNC_CHUNK: usize = 64 * 1024;

impl<S: Read + Seek> Volume<S> {
    /// Open an existing volume with default config and the global registry
    pub fn open_for_read(stream: S) -> Result<Self> {
        Self::open_for_read_with(stream, VolumeConfig::default(), &SchemeRegistry::global())
    }

    /// Open an existing volume: validate the header and resolve its schemes.
    ///
    /// Nothing is created if the header is invalid or a scheme is unknown.
    pub fn open_for_read_with(mut stream: S, config: VolumeConfig, registry: &SchemeRegistry) -> Result<Self> {
        let base = stream.stream_position()?;
        let (metadata, header_len) = header::read_header(&mut stream)?;
        let pipeline = registry.resolve(metadata.compression(), metadata.encryption())?;
        let stream_len = stream.seek(SeekFrom::End(0))?;

        tracing::info!(
            volume = %metadata.name(),
            version = %metadata.version(),
            channel = %metadata.channel(),
            "Opened volume for read"
        );

        Ok(Self {
            page_size_bytes: AtomicUsize::new(config.page_size_bytes),
            metadata,
            pipeline,
            config,
            mode: VolumeMode::Read,
            data_start: base + header_len,
            layout_frozen: AtomicBool::new(true),
            faulted: AtomicBool::new(false),
            inner: Mutex::new(VolumeInner {
                stream,
                state: VolumeState::Opened,
                cursor: stream_len,
                next_page_id: 0,
                pages_committed: 0,
            }),
        })
    }

    /// Lazy iterator over all pages in commit order
    pub fn pages(&self) -> PageIter<'_, S> {
        PageIter {
            volume: self,
            next_offset: self.data_start,
            policy: self.config.corruption_policy,
            last_page_id: None,
            skipped: 0,
            done: false,
        }
    }

    /// Lazy iterator over every entry of every page, in append order
    pub fn entries(&self) -> EntryIter<'_, S> {
        EntryIter {
            pages: self.pages(),
            current: None,
        }
    }

    /// Lazy iterator decoding every entry with `codec`
    pub fn records<'a, T, C: EntryCodec<T>>(&'a self, codec: &'a C) -> RecordIter<'a, S, T, C> {
        RecordIter {
            entries: self.entries(),
            codec,
            _record: PhantomData,
        }
    }

    /// Read and decode the single page whose frame starts at `offset`
    pub fn read_page_at(&self, offset: u64) -> Result<Page> {
        match self.read_frame(offset)? {
            Frame::Page(raw) => self.decode_frame(raw),
            Frame::Torn(reason) => Err(ArchiveError::corrupt(offset, reason)),
            Frame::BadMagic(magic) => Err(ArchiveError::corrupt(
                offset,
                format!("no page frame here (found {:?})", magic),
            )),
            Frame::End { .. } | Frame::Eof => Err(ArchiveError::corrupt(offset, "offset is past the last page")),
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Seek and read one frame while holding the stream lock
    fn read_frame(&self, offset: u64) -> Result<Frame> {
        let mut inner = self.inner.lock();
        match inner.state {
            VolumeState::Closed => return Err(ArchiveError::InvalidState("volume is closed".to_string())),
            VolumeState::Opened => inner.state = VolumeState::Reading,
            _ => {}
        }
        if self.mode != VolumeMode::Read {
            return Err(ArchiveError::InvalidState("volume is opened for write".to_string()));
        }
        if offset < self.data_start {
            return Err(ArchiveError::InvalidState(format!(
                "offset {} is inside the volume header",
                offset
            )));
        }

        let stream_len = inner.cursor;
        inner.stream.seek(SeekFrom::Start(offset))?;
        page::read_frame(&mut inner.stream, offset, stream_len)
    }

    /// Verify and decode a frame outside the lock
    fn decode_frame(&self, raw: RawFrame) -> Result<Page> {
        raw.verify()?;
        let decoded = self
            .pipeline
            .decode_page(&raw.stored, raw.raw_len as usize, raw.offset)?;
        Page::parse(raw.page_id, raw.offset, decoded)
    }

    /// Offset of the next page magic or end magic at or after `from`
    fn find_next_frame(&self, from: u64) -> Result<Option<u64>> {
        let mut inner = self.inner.lock();
        let stream_len = inner.cursor;
        let mut pos = from;
        let mut chunk = vec![0u8; RESYNC_CHUNK];

        while pos < stream_len {
            inner.stream.seek(SeekFrom::Start(pos))?;
            let n = page::read_full(&mut inner.stream, &mut chunk)?;
            if n < 4 {
                break;
            }
            if let Some(i) = chunk[..n]
                .windows(4)
                .position(|w| w == PAGE_MAGIC || w == END_MAGIC)
            {
                return Ok(Some(pos + i as u64));
            }
            // Overlap so a magic split across chunks is still found
            pos += (n - 3) as u64;
        }
        Ok(None)
    }
}

// =============================================================================
// Page Iterator
// =============================================================================

/// Forward-only iterator over committed pages
pub struct PageIter<'a, S> {
    volume: &'a Volume<S>,
    next_offset: u64,
    policy: CorruptionPolicy,
    last_page_id: Option<u64>,
    skipped: u64,
    done: bool,
}

impl<'a, S: Read + Seek> PageIter<'a, S> {
    /// Override the volume's corruption policy for this iteration
    pub fn with_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pages skipped because they were damaged
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Apply the corruption policy to a damaged frame at `offset`.
    /// Returns `Some(err)` when iteration must stop with that error.
    fn on_corruption(&mut self, offset: u64, err: ArchiveError) -> Option<ArchiveError> {
        match self.policy {
            CorruptionPolicy::Halt => {
                self.done = true;
                Some(err)
            }
            CorruptionPolicy::Skip => {
                self.skipped += 1;
                tracing::warn!(
                    volume = %self.volume.metadata().name(),
                    offset,
                    "Skipping corrupt page: {}",
                    err
                );
                match self.volume.find_next_frame(offset + 1) {
                    Ok(Some(next)) => {
                        self.next_offset = next;
                        None
                    }
                    Ok(None) => {
                        self.done = true;
                        None
                    }
                    Err(e) => {
                        self.done = true;
                        Some(e)
                    }
                }
            }
        }
    }

    /// Apply the corruption policy to a page whose frame decoded but whose
    /// entry framing is broken. The rest of that page is dropped.
    fn on_damaged_entries(&mut self, err: ArchiveError) -> Option<ArchiveError> {
        match self.policy {
            CorruptionPolicy::Halt => {
                self.done = true;
                Some(err)
            }
            CorruptionPolicy::Skip => {
                self.skipped += 1;
                tracing::warn!(
                    volume = %self.volume.metadata().name(),
                    "Skipping rest of damaged page: {}",
                    err
                );
                None
            }
        }
    }
}

impl<'a, S: Read + Seek> Iterator for PageIter<'a, S> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let offset = self.next_offset;

            let frame = match self.volume.read_frame(offset) {
                Ok(frame) => frame,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let err = match frame {
                Frame::Eof => {
                    tracing::debug!(volume = %self.volume.metadata().name(), offset, "Volume is not sealed");
                    self.done = true;
                    return None;
                }
                Frame::End { page_count } => {
                    if self.skipped == 0 && self.last_page_id.unwrap_or(0) != page_count {
                        tracing::warn!(
                            volume = %self.volume.metadata().name(),
                            page_count,
                            last_page_id = self.last_page_id.unwrap_or(0),
                            "End marker page count disagrees with pages read"
                        );
                    }
                    self.done = true;
                    return None;
                }
                // A real torn tail has no magic after it, so Skip ends here;
                // a false magic hit during resync keeps scanning
                Frame::Torn(reason) => ArchiveError::corrupt(offset, reason),
                Frame::BadMagic(magic) => {
                    ArchiveError::corrupt(offset, format!("bad page magic {:?}", magic))
                }
                Frame::Page(raw) => {
                    let frame_len = raw.frame_len();
                    match self.volume.decode_frame(raw) {
                        Ok(page) => match self.last_page_id {
                            Some(last) if page.id() <= last => ArchiveError::corrupt(
                                offset,
                                format!("page id {} does not follow {}", page.id(), last),
                            ),
                            _ => {
                                self.next_offset = offset + frame_len;
                                self.last_page_id = Some(page.id());
                                return Some(Ok(page));
                            }
                        },
                        Err(e) if e.is_corruption() => e,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    }
                }
            };

            if let Some(e) = self.on_corruption(offset, err) {
                return Some(Err(e));
            }
        }
        None
    }
}

// =============================================================================
// Entry Iterator
// =============================================================================

/// Every entry of every page, in append order
pub struct EntryIter<'a, S> {
    pages: PageIter<'a, S>,
    current: Option<PageEntries>,
}

impl<'a, S: Read + Seek> EntryIter<'a, S> {
    /// Pages skipped so far by the underlying page iterator
    pub fn skipped_pages(&self) -> u64 {
        self.pages.skipped()
    }
}

impl<'a, S: Read + Seek> Iterator for EntryIter<'a, S> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entries) = self.current.as_mut() {
                match entries.next() {
                    Some(Err(e)) if e.is_corruption() => {
                        self.current = None;
                        if let Some(e) = self.pages.on_damaged_entries(e) {
                            return Some(Err(e));
                        }
                    }
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }

            match self.pages.next()? {
                Ok(page) => self.current = Some(page.entries()),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

// =============================================================================
// Record Iterator
// =============================================================================

/// Entries decoded into records of type `T`
pub struct RecordIter<'a, S, T, C> {
    entries: EntryIter<'a, S>,
    codec: &'a C,
    _record: PhantomData<fn() -> T>,
}

impl<'a, S: Read + Seek, T, C: EntryCodec<T>> Iterator for RecordIter<'a, S, T, C> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.entries.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        Some(crate::record::decode_entry(self.codec, &entry))
    }
}
