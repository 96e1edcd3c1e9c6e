//! Tests for the volume read path
//!
//! These tests verify:
//! - Pages, entries and records come back in commit order
//! - Sealed and unsealed volumes both read cleanly
//! - Damaged pages halt iteration or are skipped, per policy
//! - A torn tail is reported under Halt and ignored under Skip
//! - Broken entry framing inside a verified page follows the same policy

use std::io::Cursor;
use std::sync::Arc;

use atlasarc::appender::{Appender, FixedClock, Origin};
use atlasarc::config::{CorruptionPolicy, VolumeConfig};
use atlasarc::metadata::VolumeMetadata;
use atlasarc::record::{RawCodec, TextCodec};
use atlasarc::scheme::SchemeRegistry;
use atlasarc::volume::{Volume, VolumeState};
use atlasarc::ArchiveError;

// =============================================================================
// Helper Functions
// =============================================================================

const STAMP_TIME: u64 = 1_700_000_000_000;

fn origin() -> Origin {
    Origin::with_clock("reader-tests", "writer-1", Arc::new(FixedClock(STAMP_TIME)))
}

fn record(i: usize) -> String {
    format!("record-{:04}-payload", i)
}

/// Write `count` text records with a small page size.
/// Returns the volume bytes and the offset of the first page.
fn write_volume(count: usize, compression: &str, seal: bool) -> (Vec<u8>, u64) {
    let meta = VolumeMetadata::builder("reader-test")
        .version(1, 0)
        .compression_scheme(compression)
        .build()
        .unwrap();
    let volume = Volume::open_for_write(meta, Cursor::new(Vec::new())).unwrap();
    volume.set_page_size_bytes(256).unwrap();

    let mut appender = Appender::new(&volume, TextCodec, origin());
    for i in 0..count {
        appender.append(record(i)).unwrap();
    }
    appender.dispose().unwrap();
    if seal {
        volume.close().unwrap();
    }

    let data_start = volume.data_start();
    (volume.into_stream().into_inner(), data_start)
}

fn open(bytes: Vec<u8>, policy: CorruptionPolicy) -> Volume<Cursor<Vec<u8>>> {
    let config = VolumeConfig::builder().corruption_policy(policy).build();
    Volume::open_for_read_with(Cursor::new(bytes), config, &SchemeRegistry::global()).unwrap()
}

fn read_all(volume: &Volume<Cursor<Vec<u8>>>) -> Vec<String> {
    volume.records(&TextCodec).collect::<Result<_, _>>().unwrap()
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_records_in_append_order() {
    let (bytes, _) = write_volume(100, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    let expected: Vec<String> = (0..100).map(record).collect();
    assert_eq!(read_all(&volume), expected);
    assert_eq!(volume.state(), VolumeState::Reading);
}

#[test]
fn test_page_ids_are_gap_free() {
    let (bytes, _) = write_volume(100, "gzip", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    let ids: Vec<u64> = volume.pages().map(|page| page.unwrap().id()).collect();

    assert!(ids.len() > 1);
    assert_eq!(ids, (1..=ids.len() as u64).collect::<Vec<_>>());
}

#[test]
fn test_pages_carry_stamp() {
    let (bytes, _) = write_volume(10, "zstd", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    for page in volume.pages() {
        let page = page.unwrap();
        assert_eq!(page.stamp().created_unix_ms, STAMP_TIME);
        assert_eq!(page.stamp().app_id, "reader-tests");
        assert_eq!(page.stamp().actor, "writer-1");
        assert!(page.raw_len() <= 256);
    }
}

#[test]
fn test_unsealed_volume_reads_cleanly() {
    let (bytes, _) = write_volume(40, "none", false);
    let volume = open(bytes, CorruptionPolicy::Halt);

    assert_eq!(read_all(&volume).len(), 40);
}

#[test]
fn test_empty_volume_has_no_pages() {
    let (bytes, _) = write_volume(0, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    assert_eq!(volume.pages().count(), 0);
}

#[test]
fn test_entry_locations_resolve_to_their_page() {
    let (bytes, _) = write_volume(30, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    for entry in volume.entries() {
        let entry = entry.unwrap();
        let page = volume.read_page_at(entry.page_offset).unwrap();
        let again = page.entry_at(entry.offset).unwrap();

        assert_eq!(page.id(), entry.page_id);
        assert_eq!(again, entry);
    }
}

#[test]
fn test_wrong_codec_kind_is_error() {
    let (bytes, _) = write_volume(3, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    let first = volume.records(&RawCodec).next().unwrap();

    assert!(matches!(first, Err(ArchiveError::Serialization(_))));
}

#[test]
fn test_read_page_inside_header_rejected() {
    let (bytes, _) = write_volume(3, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    assert!(matches!(volume.read_page_at(0), Err(ArchiveError::InvalidState(_))));
}

#[test]
fn test_read_page_at_non_frame_offset() {
    let (bytes, data_start) = write_volume(3, "none", true);
    let volume = open(bytes, CorruptionPolicy::Halt);

    let err = volume.read_page_at(data_start + 1).unwrap_err();

    assert!(err.is_corruption());
}

#[test]
fn test_reading_a_write_volume_rejected() {
    let meta = VolumeMetadata::builder("w").version(1, 0).build().unwrap();
    let volume = Volume::open_for_write(meta, Cursor::new(Vec::new())).unwrap();

    let first = volume.pages().next().unwrap();

    assert!(matches!(first, Err(ArchiveError::InvalidState(_))));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_flipped_byte_halts_with_corrupt_page() {
    let (mut bytes, data_start) = write_volume(50, "none", true);
    // First byte of page 1's payload
    bytes[data_start as usize + 20] ^= 0xFF;

    let volume = open(bytes, CorruptionPolicy::Halt);
    let mut pages = volume.pages();

    match pages.next() {
        Some(Err(ArchiveError::CorruptPage { offset, .. })) => assert_eq!(offset, data_start),
        other => panic!("expected corrupt page, got {:?}", other.map(|r| r.map(|p| p.id()))),
    }
    assert!(pages.next().is_none());
}

#[test]
fn test_flipped_byte_skipped_under_skip_policy() {
    let (clean, _) = write_volume(50, "none", true);
    let total_pages = open(clean, CorruptionPolicy::Halt).pages().count() as u64;

    let (mut bytes, data_start) = write_volume(50, "none", true);
    bytes[data_start as usize + 24] ^= 0xFF;

    let volume = open(bytes, CorruptionPolicy::Skip);
    let mut pages = volume.pages();
    let ids: Vec<u64> = pages.by_ref().map(|page| page.unwrap().id()).collect();

    assert_eq!(pages.skipped(), 1);
    assert_eq!(ids.first(), Some(&2));
    assert_eq!(ids.len() as u64, total_pages - 1);
}

#[test]
fn test_policy_override_per_iteration() {
    let (mut bytes, data_start) = write_volume(50, "gzip", true);
    bytes[data_start as usize + 22] ^= 0xFF;

    let volume = open(bytes, CorruptionPolicy::Halt);
    let skipped: Vec<_> = volume
        .pages()
        .with_policy(CorruptionPolicy::Skip)
        .collect::<Result<_, _>>()
        .unwrap();

    assert!(!skipped.is_empty());
}

#[test]
fn test_torn_tail_under_halt() {
    let (bytes, _) = write_volume(50, "none", false);
    let torn = bytes[..bytes.len() - 7].to_vec();

    let volume = open(torn, CorruptionPolicy::Halt);
    let results: Vec<_> = volume.pages().collect();

    assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
    assert!(matches!(results.last(), Some(Err(ArchiveError::CorruptPage { .. }))));
}

#[test]
fn test_torn_tail_under_skip() {
    let (bytes, _) = write_volume(50, "none", false);
    let full_pages = open(bytes.clone(), CorruptionPolicy::Halt).pages().count();
    let torn = bytes[..bytes.len() - 7].to_vec();

    let volume = open(torn, CorruptionPolicy::Skip);
    let mut pages = volume.pages();
    let survivors = pages.by_ref().filter(|r| r.is_ok()).count();

    assert_eq!(survivors, full_pages - 1);
    assert_eq!(pages.skipped(), 1);
}

#[test]
fn test_stray_bytes_after_end_marker() {
    let (mut bytes, _) = write_volume(10, "none", true);
    bytes.extend_from_slice(b"junk");

    // The end marker is no longer last, so it is not trusted as one
    let volume = open(bytes, CorruptionPolicy::Halt);
    let last = volume.pages().last().unwrap();

    assert!(last.unwrap_err().is_corruption());
}

/// Break the first entry's length on page 1 and re-seal its checksum, so the
/// frame verifies but the entries inside it do not
fn break_first_entry(bytes: &mut [u8], data_start: u64) {
    let page = data_start as usize;
    let stored_len = u32::from_le_bytes(bytes[page + 16..page + 20].try_into().unwrap()) as usize;
    let payload = page + 20;
    let stamp_len = u16::from_le_bytes([bytes[payload], bytes[payload + 1]]) as usize;
    let entry = payload + 2 + stamp_len;
    bytes[entry + 1..entry + 5].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());

    let crc = crc32fast::hash(&bytes[page + 4..payload + stored_len]);
    bytes[payload + stored_len..payload + stored_len + 4].copy_from_slice(&crc.to_le_bytes());
}

#[test]
fn test_broken_entry_framing_halts() {
    let (mut bytes, data_start) = write_volume(50, "none", true);
    break_first_entry(&mut bytes, data_start);

    let volume = open(bytes, CorruptionPolicy::Halt);
    let results: Vec<_> = volume.entries().collect();

    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0], Err(ArchiveError::CorruptPage { offset, .. }) if *offset == data_start));
}

#[test]
fn test_broken_entry_framing_skipped() {
    let (clean, _) = write_volume(50, "none", true);
    let first_page_entries = open(clean, CorruptionPolicy::Halt)
        .pages()
        .next()
        .unwrap()
        .unwrap()
        .entries()
        .count();

    let (mut bytes, data_start) = write_volume(50, "none", true);
    break_first_entry(&mut bytes, data_start);

    let volume = open(bytes, CorruptionPolicy::Skip);
    let mut entries = volume.entries();
    let survivors: Vec<String> = entries
        .by_ref()
        .map(|e| String::from_utf8(e.unwrap().data.to_vec()).unwrap())
        .collect();

    assert_eq!(entries.skipped_pages(), 1);
    assert_eq!(survivors.len(), 50 - first_page_entries);
    assert_eq!(survivors.first(), Some(&record(first_page_entries)));
}
