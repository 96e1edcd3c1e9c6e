//! Volume Module
//!
//! An append-only container: one header followed by checksummed pages.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header                                                          │
//! │   Magic "ATAR" (4) | FmtVersion (2) | Len (4) | Meta | CRC (4)  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Page 1                                                          │
//! │   "ATPG" (4) | PageId (8) | RawLen (4) | StoredLen (4)          │
//! │   Payload (compressed + encrypted) | CRC (4)                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ ... Page N                                                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ End Marker                                                      │
//! │   "ATEN" (4) | PageCount (8)                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! A volume is shared by reference between appenders on several threads.
//! `commit_page` is the only synchronized write: "assign page id → write
//! frame → advance cursor" runs under one mutex. Encoding happens outside it.

mod header;
mod page;
mod reader;

use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{VolumeConfig, MIN_PAGE_SIZE_BYTES};
use crate::error::{ArchiveError, Result};
use crate::metadata::VolumeMetadata;
use crate::scheme::{CodecPipeline, SchemeRegistry};

pub use page::{Entry, Page, PageEntries, PageStamp};
pub use reader::{EntryIter, PageIter, RecordIter};

pub(crate) use page::PageBuffer;

// =============================================================================
// Format Constants
// =============================================================================

/// Magic bytes identifying an AtlasArc volume
pub(crate) const MAGIC: &[u8; 4] = b"ATAR";

/// Current volume format version
pub(crate) const FORMAT_VERSION: u16 = 1;

/// Magic bytes opening every page frame
pub(crate) const PAGE_MAGIC: &[u8; 4] = b"ATPG";

/// Magic bytes of the end-of-volume marker
pub(crate) const END_MAGIC: &[u8; 4] = b"ATEN";

/// Page frame header: Magic (4) + PageId (8) + RawLen (4) + StoredLen (4)
pub(crate) const PAGE_HEADER_SIZE: u64 = 20;

/// End marker: Magic (4) + PageCount (8)
pub(crate) const END_MARKER_SIZE: u64 = 12;

/// Entry frame header inside a page: Kind (1) + Len (4)
pub const ENTRY_HEADER_SIZE: usize = 5;

/// Upper bound for serialized metadata
pub(crate) const MAX_HEADER_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Locations
// =============================================================================

/// Where a committed page starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageLocation {
    pub page_id: u64,
    /// Stream offset of the page frame
    pub offset: u64,
}

impl PageLocation {
    /// Location of an entry framed at `entry_offset` inside this page
    pub fn entry(&self, entry_offset: u32) -> EntryLocation {
        EntryLocation {
            page_id: self.page_id,
            page_offset: self.offset,
            entry_offset,
        }
    }
}

/// Where a committed entry lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryLocation {
    pub page_id: u64,
    /// Stream offset of the page frame
    pub page_offset: u64,
    /// Offset of the entry frame inside the decoded page
    pub entry_offset: u32,
}

// =============================================================================
// Volume State
// =============================================================================

/// Whether a volume handle writes or reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    Write,
    Read,
}

/// Lifecycle state.
///
/// Write: `HeaderWritten → Appending → Closed`, `Appending → Faulted`.
/// Read: `Opened → Reading → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    HeaderWritten,
    Appending,
    Faulted,
    Opened,
    Reading,
    Closed,
}

/// Mutable state behind the volume mutex
struct VolumeInner<S> {
    stream: S,
    state: VolumeState,
    /// Write mode: offset of the next frame. Read mode: stream length.
    cursor: u64,
    next_page_id: u64,
    pages_committed: u64,
}

// =============================================================================
// Volume
// =============================================================================

/// An archive volume over a byte stream `S`.
///
/// Pass `S` by value to hand the stream to the volume (get it back with
/// [`Volume::into_stream`]), or pass `&mut S` to lend it.
pub struct Volume<S> {
    metadata: VolumeMetadata,
    pipeline: CodecPipeline,
    config: VolumeConfig,
    mode: VolumeMode,
    /// Stream offset of the first page
    data_start: u64,
    page_size_bytes: AtomicUsize,
    /// Set once any appender buffers an entry; page size is fixed after that
    layout_frozen: AtomicBool,
    /// Mirrors `VolumeState::Faulted` for lock-free checks
    faulted: AtomicBool,
    inner: Mutex<VolumeInner<S>>,
}

impl<S: Write + Seek> Volume<S> {
    /// Create a volume on `stream` with default config and the global registry
    pub fn open_for_write(metadata: VolumeMetadata, stream: S) -> Result<Self> {
        Self::open_for_write_with(metadata, stream, VolumeConfig::default(), &SchemeRegistry::global())
    }

    /// Create a volume on `stream`, writing the header immediately.
    ///
    /// Schemes are resolved before any byte is written.
    pub fn open_for_write_with(
        metadata: VolumeMetadata,
        mut stream: S,
        config: VolumeConfig,
        registry: &SchemeRegistry,
    ) -> Result<Self> {
        validate_config(&config)?;
        let pipeline = registry.resolve(metadata.compression(), metadata.encryption())?;

        let base = stream.stream_position()?;
        let header_len = header::write_header(&mut stream, &metadata)?;
        let data_start = base + header_len;

        tracing::info!(
            volume = %metadata.name(),
            channel = %metadata.channel(),
            compression = %pipeline.compression(),
            encryption = %pipeline.encryption(),
            "Opened volume for write"
        );

        Ok(Self {
            page_size_bytes: AtomicUsize::new(config.page_size_bytes),
            metadata,
            pipeline,
            config,
            mode: VolumeMode::Write,
            data_start,
            layout_frozen: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            inner: Mutex::new(VolumeInner {
                stream,
                state: VolumeState::HeaderWritten,
                cursor: data_start,
                next_page_id: 1,
                pages_committed: 0,
            }),
        })
    }

    /// Change the page size.
    ///
    /// Only allowed before the first entry is buffered by any appender.
    pub fn set_page_size_bytes(&self, size: usize) -> Result<()> {
        if self.mode != VolumeMode::Write {
            return Err(ArchiveError::InvalidState(
                "page size only applies to volumes opened for write".to_string(),
            ));
        }
        if size < MIN_PAGE_SIZE_BYTES {
            return Err(ArchiveError::Config(format!(
                "page size {} is below the minimum of {}",
                size, MIN_PAGE_SIZE_BYTES
            )));
        }

        // Check and store under the volume mutex so a concurrent freeze
        // either sees the new size or makes this call fail
        let _inner = self.inner.lock();
        if self.layout_frozen.load(Ordering::Acquire) {
            return Err(ArchiveError::InvalidState(
                "page size cannot change after the first entry is buffered".to_string(),
            ));
        }
        self.page_size_bytes.store(size, Ordering::Release);
        Ok(())
    }

    /// Commit one page of framed entries (`StampLen | Stamp | Entry*`).
    ///
    /// The framing is checked first, so a page that readers could not decode
    /// is rejected with `Validation`. Encodes outside the lock, then assigns
    /// the next page id, writes and flushes the frame, and advances the
    /// cursor. An I/O failure faults the volume permanently.
    pub fn commit_page(&self, framed: &[u8]) -> Result<PageLocation> {
        self.check_writable()?;
        if framed.is_empty() {
            return Err(ArchiveError::InvalidState("cannot commit an empty page".to_string()));
        }
        page::check_framing(framed)?;
        if framed.len() > u32::MAX as usize {
            return Err(ArchiveError::EntryTooLarge {
                size: framed.len(),
                limit: u32::MAX as usize,
            });
        }

        let stored = self.pipeline.encode_page(framed)?;
        if stored.len() > u32::MAX as usize {
            return Err(ArchiveError::Codec(format!(
                "encoded page of {} bytes does not fit a frame",
                stored.len()
            )));
        }

        let mut inner = self.inner.lock();
        match inner.state {
            VolumeState::Faulted => return Err(ArchiveError::VolumeFaulted),
            VolumeState::Closed => {
                return Err(ArchiveError::InvalidState("volume is closed".to_string()))
            }
            _ => {}
        }

        let page_id = inner.next_page_id;
        let offset = inner.cursor;

        let written = page::write_frame(&mut inner.stream, page_id, framed.len() as u32, &stored)
            .and_then(|len| inner.stream.flush().map(|_| len));

        let frame_len = match written {
            Ok(len) => len,
            Err(e) => {
                inner.state = VolumeState::Faulted;
                self.faulted.store(true, Ordering::Release);
                tracing::error!(
                    volume = %self.metadata.name(),
                    page_id,
                    offset,
                    "Page commit failed, volume faulted: {}",
                    e
                );
                return Err(ArchiveError::Io(e));
            }
        };

        inner.cursor += frame_len;
        inner.next_page_id += 1;
        inner.pages_committed += 1;
        inner.state = VolumeState::Appending;
        drop(inner);

        tracing::debug!(
            volume = %self.metadata.name(),
            page_id,
            offset,
            raw_len = framed.len(),
            stored_len = stored.len(),
            "Committed page"
        );

        Ok(PageLocation { page_id, offset })
    }

    /// Seal the volume with the end marker.
    ///
    /// Appenders must be disposed first; their buffered entries are not
    /// flushed by the volume. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            VolumeState::Closed => return Ok(()),
            VolumeState::Faulted => return Err(ArchiveError::VolumeFaulted),
            _ => {}
        }

        if self.mode == VolumeMode::Write {
            let pages = inner.pages_committed;
            let sealed = inner
                .stream
                .write_all(END_MAGIC)
                .and_then(|_| inner.stream.write_all(&pages.to_le_bytes()))
                .and_then(|_| inner.stream.flush());

            if let Err(e) = sealed {
                inner.state = VolumeState::Faulted;
                self.faulted.store(true, Ordering::Release);
                tracing::error!(volume = %self.metadata.name(), "Writing end marker failed: {}", e);
                return Err(ArchiveError::Io(e));
            }
            inner.cursor += END_MARKER_SIZE;
        }

        inner.state = VolumeState::Closed;
        tracing::info!(
            volume = %self.metadata.name(),
            pages = inner.pages_committed,
            "Closed volume"
        );
        Ok(())
    }

    /// Mark the layout as fixed (first buffered entry)
    pub(crate) fn freeze_layout(&self) {
        if !self.layout_frozen.load(Ordering::Acquire) {
            let _inner = self.inner.lock();
            self.layout_frozen.store(true, Ordering::Release);
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode != VolumeMode::Write {
            return Err(ArchiveError::InvalidState("volume is opened for read".to_string()));
        }
        if self.faulted.load(Ordering::Acquire) {
            return Err(ArchiveError::VolumeFaulted);
        }
        Ok(())
    }
}

impl<S> Volume<S> {
    pub fn metadata(&self) -> &VolumeMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    pub fn mode(&self) -> VolumeMode {
        self.mode
    }

    pub fn state(&self) -> VolumeState {
        self.inner.lock().state
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Current page size (pre-codec framed bytes)
    pub fn page_size_bytes(&self) -> usize {
        self.page_size_bytes.load(Ordering::Acquire)
    }

    /// Pages committed through this handle
    pub fn pages_committed(&self) -> u64 {
        self.inner.lock().pages_committed
    }

    /// Stream offset of the first page
    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Fail fast if writes are no longer possible
    pub(crate) fn ensure_not_faulted(&self) -> Result<()> {
        if self.is_faulted() {
            return Err(ArchiveError::VolumeFaulted);
        }
        Ok(())
    }

    /// Release the stream to the caller
    pub fn into_stream(self) -> S {
        self.inner.into_inner().stream
    }
}

impl<S> std::fmt::Debug for Volume<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("name", &self.metadata.name())
            .field("mode", &self.mode)
            .field("pipeline", &self.pipeline)
            .field("page_size_bytes", &self.page_size_bytes())
            .finish()
    }
}

fn validate_config(config: &VolumeConfig) -> Result<()> {
    if config.page_size_bytes < MIN_PAGE_SIZE_BYTES {
        return Err(ArchiveError::Config(format!(
            "page size {} is below the minimum of {}",
            config.page_size_bytes, MIN_PAGE_SIZE_BYTES
        )));
    }
    if config.max_entry_bytes == 0 || config.max_entry_bytes > u32::MAX as usize - ENTRY_HEADER_SIZE {
        return Err(ArchiveError::Config(format!(
            "max entry size {} must be in 1..={}",
            config.max_entry_bytes,
            u32::MAX as usize - ENTRY_HEADER_SIZE
        )));
    }
    Ok(())
}
