//! Pages and entries
//!
//! ## Page Frame (on the stream)
//! ```text
//! ┌──────────┬────────────┬──────────────┬──────────────┬─────────────┬─────────┐
//! │ "ATPG"(4)│ PageId (8) │ RawLen (4)   │ StoredLen (4)│ Payload     │ CRC (4) │
//! └──────────┴────────────┴──────────────┴──────────────┴─────────────┴─────────┘
//! ```
//! CRC covers PageId, both lengths and the stored payload.
//!
//! ## Page Payload (after decrypt + decompress)
//! ```text
//! ┌─────────────┬───────────────┬──────────────────────────────────────┐
//! │ StampLen(2) │ Stamp (var)   │ Entry*  = Kind (1) | Len (4) | Bytes │
//! └─────────────┴───────────────┴──────────────────────────────────────┘
//! ```

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

use super::{EntryLocation, END_MAGIC, ENTRY_HEADER_SIZE, PAGE_HEADER_SIZE, PAGE_MAGIC};

// =============================================================================
// Page Stamp
// =============================================================================

/// Who wrote a page and when; stamped by the appender from its `Origin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStamp {
    /// Unix milliseconds when the page was started
    pub created_unix_ms: u64,
    pub app_id: String,
    pub actor: String,
}

// =============================================================================
// Page Buffer (write side)
// =============================================================================

/// Framed bytes of the page an appender is currently filling
#[derive(Debug, Default)]
pub(crate) struct PageBuffer {
    bytes: Vec<u8>,
    entries: usize,
}

impl PageBuffer {
    /// Bytes a page spends on its stamp before the first entry
    pub(crate) fn stamp_overhead(stamp: &PageStamp) -> Result<usize> {
        encode_stamp(stamp).map(|encoded| 2 + encoded.len())
    }

    /// Start a fresh page with the given stamp
    pub(crate) fn begin(&mut self, stamp: &PageStamp) -> Result<()> {
        let encoded = encode_stamp(stamp)?;

        self.bytes.clear();
        self.entries = 0;
        self.bytes.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(&encoded);
        Ok(())
    }

    /// Frame one entry; returns its offset inside the payload
    pub(crate) fn push(&mut self, kind: u8, data: &[u8]) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.push(kind);
        self.bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(data);
        self.entries += 1;
        offset
    }

    /// True when a page has been started (stamp written)
    pub(crate) fn is_started(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// Drop the last entry, framed at `offset` by `push`
    pub(crate) fn pop_entry(&mut self, offset: u32) {
        self.bytes.truncate(offset as usize);
        self.entries -= 1;
        if self.entries == 0 {
            self.reset();
        }
    }

    pub(crate) fn entries(&self) -> usize {
        self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn reset(&mut self) {
        self.bytes.clear();
        self.entries = 0;
    }
}

fn encode_stamp(stamp: &PageStamp) -> Result<Vec<u8>> {
    let encoded =
        bincode::serialize(stamp).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
    if encoded.len() > u16::MAX as usize {
        return Err(ArchiveError::Validation(format!(
            "Page stamp is {} bytes (max {})",
            encoded.len(),
            u16::MAX
        )));
    }
    Ok(encoded)
}

/// Check that `framed` is a readable stamp followed by whole entry frames.
///
/// Returns the number of entries.
pub(crate) fn check_framing(framed: &[u8]) -> Result<usize> {
    let malformed = |reason: String| ArchiveError::Validation(format!("Malformed page: {}", reason));

    if framed.len() < 2 {
        return Err(malformed("missing stamp length".to_string()));
    }
    let entries_start = 2 + u16::from_le_bytes([framed[0], framed[1]]) as usize;
    if framed.len() < entries_start {
        return Err(malformed("stamp overruns payload".to_string()));
    }
    bincode::deserialize::<PageStamp>(&framed[2..entries_start])
        .map_err(|e| malformed(format!("unreadable stamp: {}", e)))?;

    let mut pos = entries_start;
    let mut entries = 0;
    while pos < framed.len() {
        let header_end = pos + ENTRY_HEADER_SIZE;
        if header_end > framed.len() {
            return Err(malformed(format!("truncated entry header at {}", pos)));
        }
        let len = u32::from_le_bytes(framed[pos + 1..header_end].try_into().unwrap()) as usize;
        if header_end + len > framed.len() {
            return Err(malformed(format!("entry at {} overruns payload", pos)));
        }
        pos = header_end + len;
        entries += 1;
    }

    if entries == 0 {
        return Err(malformed("no entries".to_string()));
    }
    Ok(entries)
}

// =============================================================================
// Frame I/O
// =============================================================================

/// Write a page frame; returns the frame length
pub(crate) fn write_frame<W: Write>(writer: &mut W, page_id: u64, raw_len: u32, stored: &[u8]) -> std::io::Result<u64> {
    let mut header = [0u8; PAGE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(PAGE_MAGIC);
    header[4..12].copy_from_slice(&page_id.to_le_bytes());
    header[12..16].copy_from_slice(&raw_len.to_le_bytes());
    header[16..20].copy_from_slice(&(stored.len() as u32).to_le_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[4..]);
    hasher.update(stored);
    let crc = hasher.finalize();

    writer.write_all(&header)?;
    writer.write_all(stored)?;
    writer.write_all(&crc.to_le_bytes())?;

    Ok(frame_len(stored.len()))
}

/// Total on-stream size of a page frame with `stored_len` payload bytes
pub(crate) fn frame_len(stored_len: usize) -> u64 {
    PAGE_HEADER_SIZE + stored_len as u64 + 4
}

/// A page frame as read from the stream, not yet verified
#[derive(Debug)]
pub(crate) struct RawFrame {
    pub page_id: u64,
    pub offset: u64,
    pub raw_len: u32,
    pub stored: Vec<u8>,
    pub checksum: u32,
}

impl RawFrame {
    pub(crate) fn frame_len(&self) -> u64 {
        frame_len(self.stored.len())
    }

    /// Check the CRC over id, lengths and payload
    pub(crate) fn verify(&self) -> Result<()> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.page_id.to_le_bytes());
        hasher.update(&self.raw_len.to_le_bytes());
        hasher.update(&(self.stored.len() as u32).to_le_bytes());
        hasher.update(&self.stored);
        let actual = hasher.finalize();

        if actual != self.checksum {
            return Err(ArchiveError::corrupt(
                self.offset,
                format!(
                    "checksum mismatch on page {}: stored 0x{:08x}, computed 0x{:08x}",
                    self.page_id, self.checksum, actual
                ),
            ));
        }
        Ok(())
    }
}

/// What sits at a frame boundary
#[derive(Debug)]
pub(crate) enum Frame {
    Page(RawFrame),
    /// End-of-volume marker with the writer's page count
    End { page_count: u64 },
    /// Clean end of stream at a frame boundary (unsealed volume)
    Eof,
    /// Stream ends inside a frame
    Torn(String),
    /// Bytes at this offset are not a frame
    BadMagic([u8; 4]),
}

/// Read the frame starting at the reader's current position.
///
/// `offset` is that position; `stream_len` bounds the payload allocation.
pub(crate) fn read_frame<R: Read>(reader: &mut R, offset: u64, stream_len: u64) -> Result<Frame> {
    let mut magic = [0u8; 4];
    match read_full(reader, &mut magic)? {
        0 => return Ok(Frame::Eof),
        4 => {}
        n => return Ok(Frame::Torn(format!("{} stray bytes after last frame", n))),
    }

    if &magic == END_MAGIC {
        let mut count = [0u8; 8];
        if read_full(reader, &mut count)? != 8 {
            return Ok(Frame::Torn("truncated end marker".to_string()));
        }
        // A real end marker is the last thing on the stream
        if offset + super::END_MARKER_SIZE != stream_len {
            return Ok(Frame::BadMagic(magic));
        }
        return Ok(Frame::End {
            page_count: u64::from_le_bytes(count),
        });
    }

    if &magic != PAGE_MAGIC {
        return Ok(Frame::BadMagic(magic));
    }

    let mut rest = [0u8; (PAGE_HEADER_SIZE - 4) as usize];
    if read_full(reader, &mut rest)? != rest.len() {
        return Ok(Frame::Torn("truncated page header".to_string()));
    }
    let page_id = u64::from_le_bytes(rest[0..8].try_into().unwrap());
    let raw_len = u32::from_le_bytes(rest[8..12].try_into().unwrap());
    let stored_len = u32::from_le_bytes(rest[12..16].try_into().unwrap()) as usize;

    if offset + frame_len(stored_len) > stream_len {
        return Ok(Frame::Torn(format!(
            "page {} claims {} payload bytes past end of stream",
            page_id, stored_len
        )));
    }

    let mut stored = vec![0u8; stored_len];
    if read_full(reader, &mut stored)? != stored_len {
        return Ok(Frame::Torn("truncated page payload".to_string()));
    }
    let mut crc = [0u8; 4];
    if read_full(reader, &mut crc)? != 4 {
        return Ok(Frame::Torn("truncated page checksum".to_string()));
    }

    Ok(Frame::Page(RawFrame {
        page_id,
        offset,
        raw_len,
        stored,
        checksum: u32::from_le_bytes(crc),
    }))
}

/// Fill `buf` as far as the stream allows; returns bytes read
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

// =============================================================================
// Decoded Page (read side)
// =============================================================================

/// A committed page after verification and decoding
#[derive(Debug, Clone)]
pub struct Page {
    id: u64,
    offset: u64,
    stamp: PageStamp,
    payload: Bytes,
    entries_start: usize,
}

impl Page {
    /// Parse a decoded payload
    pub(crate) fn parse(id: u64, offset: u64, raw: Vec<u8>) -> Result<Self> {
        if raw.len() < 2 {
            return Err(ArchiveError::corrupt(offset, "page payload shorter than its stamp length"));
        }
        let stamp_len = u16::from_le_bytes([raw[0], raw[1]]) as usize;
        let entries_start = 2 + stamp_len;
        if raw.len() < entries_start {
            return Err(ArchiveError::corrupt(offset, "page stamp overruns payload"));
        }
        let stamp: PageStamp = bincode::deserialize(&raw[2..entries_start])
            .map_err(|e| ArchiveError::corrupt(offset, format!("unreadable page stamp: {}", e)))?;

        Ok(Self {
            id,
            offset,
            stamp,
            payload: Bytes::from(raw),
            entries_start,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stream offset of the page frame
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn stamp(&self) -> &PageStamp {
        &self.stamp
    }

    /// Framed (pre-codec) size of the page
    pub fn raw_len(&self) -> usize {
        self.payload.len()
    }

    /// Entries in append order
    pub fn entries(&self) -> PageEntries {
        PageEntries {
            page_id: self.id,
            page_offset: self.offset,
            payload: self.payload.clone(),
            pos: self.entries_start,
        }
    }

    /// The entry framed at `offset` within the payload
    pub fn entry_at(&self, offset: u32) -> Result<Entry> {
        let offset = offset as usize;
        if offset < self.entries_start || offset >= self.payload.len() {
            return Err(ArchiveError::corrupt(
                self.offset,
                format!("entry offset {} outside page {}", offset, self.id),
            ));
        }
        decode_entry(self.id, self.offset, &self.payload, offset).map(|(entry, _)| entry)
    }
}

/// One framed record inside a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub page_id: u64,
    pub page_offset: u64,
    /// Offset of the entry frame inside the page payload
    pub offset: u32,
    /// Type discriminator from the record codec
    pub kind: u8,
    pub data: Bytes,
}

impl Entry {
    pub fn location(&self) -> EntryLocation {
        EntryLocation {
            page_id: self.page_id,
            page_offset: self.page_offset,
            entry_offset: self.offset,
        }
    }
}

/// Iterator over a page's entries
pub struct PageEntries {
    page_id: u64,
    page_offset: u64,
    payload: Bytes,
    pos: usize,
}

impl Iterator for PageEntries {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.payload.len() {
            return None;
        }
        match decode_entry(self.page_id, self.page_offset, &self.payload, self.pos) {
            Ok((entry, next)) => {
                self.pos = next;
                Some(Ok(entry))
            }
            Err(e) => {
                // Framing is broken; nothing after this point is trustworthy
                self.pos = self.payload.len();
                Some(Err(e))
            }
        }
    }
}

/// Decode the entry at `pos`; returns it and the position after it
fn decode_entry(page_id: u64, page_offset: u64, payload: &Bytes, pos: usize) -> Result<(Entry, usize)> {
    let header_end = pos + ENTRY_HEADER_SIZE;
    if header_end > payload.len() {
        return Err(ArchiveError::corrupt(
            page_offset,
            format!("truncated entry header at {} in page {}", pos, page_id),
        ));
    }
    let kind = payload[pos];
    let len = u32::from_le_bytes(payload[pos + 1..header_end].try_into().unwrap()) as usize;
    let end = header_end + len;
    if end > payload.len() {
        return Err(ArchiveError::corrupt(
            page_offset,
            format!("entry at {} in page {} overruns payload", pos, page_id),
        ));
    }

    let entry = Entry {
        page_id,
        page_offset,
        offset: pos as u32,
        kind,
        data: payload.slice(header_end..end),
    };
    Ok((entry, end))
}
