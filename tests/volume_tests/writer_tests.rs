//! Tests for the volume write path
//!
//! These tests verify:
//! - Page ids are assigned 1, 2, 3... in commit order
//! - Pages readers could not decode are refused before any write
//! - Page size can only change before the first entry is buffered
//! - An I/O failure faults the volume for good
//! - Close seals the volume once and rejects later commits

use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atlasarc::appender::{Appender, Origin};
use atlasarc::config::{VolumeConfig, MIN_PAGE_SIZE_BYTES};
use atlasarc::metadata::VolumeMetadata;
use atlasarc::record::TextCodec;
use atlasarc::scheme::SchemeRegistry;
use atlasarc::volume::{PageStamp, Volume, VolumeState};
use atlasarc::ArchiveError;

// =============================================================================
// Helper Functions
// =============================================================================

fn metadata() -> VolumeMetadata {
    VolumeMetadata::builder("writer-test").version(1, 0).build().unwrap()
}

fn origin() -> Origin {
    Origin::new("writer-tests", "test")
}

/// Frame `entries` as one raw-kind page the way an appender would
fn framed_page(entries: &[&[u8]]) -> Vec<u8> {
    let stamp = bincode::serialize(&PageStamp {
        created_unix_ms: 1_700_000_000_000,
        app_id: "writer-tests".to_string(),
        actor: "test".to_string(),
    })
    .unwrap();

    let mut page = (stamp.len() as u16).to_le_bytes().to_vec();
    page.extend_from_slice(&stamp);
    for data in entries {
        page.push(0);
        page.extend_from_slice(&(data.len() as u32).to_le_bytes());
        page.extend_from_slice(data);
    }
    page
}

/// Stream whose writes start failing once `fail` is set
struct FlakyStream {
    inner: Cursor<Vec<u8>>,
    fail: Arc<AtomicBool>,
}

impl Write for FlakyStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "device full"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FlakyStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

fn flaky_volume() -> (Volume<FlakyStream>, Arc<AtomicBool>) {
    let fail = Arc::new(AtomicBool::new(false));
    let stream = FlakyStream {
        inner: Cursor::new(Vec::new()),
        fail: Arc::clone(&fail),
    };
    (Volume::open_for_write(metadata(), stream).unwrap(), fail)
}

// =============================================================================
// Commit Tests
// =============================================================================

#[test]
fn test_page_ids_start_at_one_and_increase() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();

    let first = volume.commit_page(&framed_page(&[b"page one"])).unwrap();
    let second = volume.commit_page(&framed_page(&[b"page two"])).unwrap();
    let third = volume.commit_page(&framed_page(&[b"page three"])).unwrap();

    assert_eq!((first.page_id, second.page_id, third.page_id), (1, 2, 3));
    assert_eq!(first.offset, volume.data_start());
    assert!(second.offset > first.offset);
    assert!(third.offset > second.offset);
    assert_eq!(volume.pages_committed(), 3);
    assert_eq!(volume.state(), VolumeState::Appending);
}

#[test]
fn test_empty_page_rejected() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();

    assert!(matches!(volume.commit_page(&[]), Err(ArchiveError::InvalidState(_))));
    assert_eq!(volume.state(), VolumeState::HeaderWritten);
}

#[test]
fn test_unframed_bytes_rejected() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();

    assert!(matches!(volume.commit_page(b"opaque"), Err(ArchiveError::Validation(_))));

    // Entry length running past the payload
    let mut truncated = framed_page(&[b"complete entry"]);
    truncated.truncate(truncated.len() - 3);
    assert!(matches!(volume.commit_page(&truncated), Err(ArchiveError::Validation(_))));

    // A stamp with no entries
    assert!(matches!(volume.commit_page(&framed_page(&[])), Err(ArchiveError::Validation(_))));

    assert_eq!(volume.pages_committed(), 0);
    assert_eq!(volume.state(), VolumeState::HeaderWritten);
}

#[test]
fn test_committed_page_reads_back() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    volume.commit_page(&framed_page(&[b"alpha", b"beta"])).unwrap();
    volume.close().unwrap();

    let reader = Volume::open_for_read(Cursor::new(volume.into_stream().into_inner())).unwrap();
    let data: Vec<Vec<u8>> = reader.entries().map(|e| e.unwrap().data.to_vec()).collect();

    assert_eq!(data, vec![b"alpha".to_vec(), b"beta".to_vec()]);
}

#[test]
fn test_commit_after_close_rejected() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    volume.close().unwrap();

    let result = volume.commit_page(&framed_page(&[b"late"]));
    assert!(matches!(result, Err(ArchiveError::InvalidState(_))));
}

// =============================================================================
// Page Size Tests
// =============================================================================

#[test]
fn test_set_page_size_before_first_append() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();

    volume.set_page_size_bytes(4096).unwrap();

    assert_eq!(volume.page_size_bytes(), 4096);
}

#[test]
fn test_set_page_size_below_minimum() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();

    let result = volume.set_page_size_bytes(MIN_PAGE_SIZE_BYTES - 1);

    assert!(matches!(result, Err(ArchiveError::Config(_))));
}

#[test]
fn test_page_size_frozen_after_first_append() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    let mut appender = Appender::new(&volume, TextCodec, origin());
    appender.append("first".to_string()).unwrap();

    let result = volume.set_page_size_bytes(8192);

    assert!(matches!(result, Err(ArchiveError::InvalidState(_))));
    appender.dispose().unwrap();
}

#[test]
fn test_invalid_config_rejected_at_open() {
    let config = VolumeConfig::builder().page_size_bytes(16).build();

    let result = Volume::open_for_write_with(
        metadata(),
        Cursor::new(Vec::new()),
        config,
        &SchemeRegistry::with_builtins(),
    );

    assert!(matches!(result, Err(ArchiveError::Config(_))));
}

// =============================================================================
// Fault Tests
// =============================================================================

#[test]
fn test_io_failure_faults_volume() {
    let (volume, fail) = flaky_volume();
    volume.commit_page(&framed_page(&[b"good page"])).unwrap();

    fail.store(true, Ordering::SeqCst);
    let result = volume.commit_page(&framed_page(&[b"doomed page"]));
    assert!(matches!(result, Err(ArchiveError::Io(_))));
    assert!(volume.is_faulted());
    assert_eq!(volume.state(), VolumeState::Faulted);

    // The fault is permanent even after the device recovers
    fail.store(false, Ordering::SeqCst);
    assert!(matches!(
        volume.commit_page(&framed_page(&[b"retry"])),
        Err(ArchiveError::VolumeFaulted)
    ));
    assert!(matches!(volume.close(), Err(ArchiveError::VolumeFaulted)));
}

#[test]
fn test_faulted_volume_rejects_appends() {
    let (volume, fail) = flaky_volume();
    let mut appender = Appender::new(&volume, TextCodec, origin());
    appender.append("buffered".to_string()).unwrap();

    fail.store(true, Ordering::SeqCst);
    assert!(matches!(appender.flush(), Err(ArchiveError::Io(_))));

    assert!(matches!(
        appender.append("after fault".to_string()),
        Err(ArchiveError::VolumeFaulted)
    ));
    assert!(matches!(appender.dispose(), Err(ArchiveError::VolumeFaulted)));
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_writes_end_marker() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    volume.commit_page(&framed_page(&[b"one"])).unwrap();
    volume.commit_page(&framed_page(&[b"two"])).unwrap();
    volume.close().unwrap();
    assert_eq!(volume.state(), VolumeState::Closed);

    let bytes = volume.into_stream().into_inner();
    let tail = &bytes[bytes.len() - 12..];

    assert_eq!(&tail[0..4], b"ATEN");
    assert_eq!(u64::from_le_bytes(tail[4..12].try_into().unwrap()), 2);
}

#[test]
fn test_close_twice_is_noop() {
    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    volume.close().unwrap();
    let len_after_first = volume.into_stream().into_inner().len();

    let volume = Volume::open_for_write(metadata(), Cursor::new(Vec::new())).unwrap();
    volume.close().unwrap();
    volume.close().unwrap();
    let len_after_second = volume.into_stream().into_inner().len();

    assert_eq!(len_after_first, len_after_second);
}

#[test]
fn test_file_backed_volume() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("archive.vol");

    {
        let file = std::fs::File::create(&path).unwrap();
        let volume = Volume::open_for_write(metadata(), file).unwrap();
        let mut appender = Appender::new(&volume, TextCodec, origin());
        appender.append("on disk".to_string()).unwrap();
        appender.dispose().unwrap();
        volume.close().unwrap();
    }

    let file = std::fs::File::open(&path).unwrap();
    let volume = Volume::open_for_read(file).unwrap();
    let records: Vec<String> = volume.records(&TextCodec).collect::<Result<_, _>>().unwrap();

    assert_eq!(records, vec!["on disk".to_string()]);
}
