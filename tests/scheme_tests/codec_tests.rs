//! Tests for compression and encryption strategies
//!
//! These tests verify:
//! - Every built-in compressor restores its input
//! - Decompression never inflates far past the recorded length
//! - AES-256-GCM authenticates: wrong keys and flipped bits fail
//! - The pipeline reports decode failures as corrupt pages

use std::sync::Arc;

use atlasarc::scheme::{
    Aes256GcmCipher, Cipher, CodecPipeline, Compressor, GzipCompressor, NoCompression,
    NoEncryption, ZstdCompressor,
};
use atlasarc::ArchiveError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_payload() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..2_000u32 {
        data.extend_from_slice(format!("{{\"id\":{},\"status\":\"settled\"}}", i).as_bytes());
    }
    data
}

// =============================================================================
// Compression Tests
// =============================================================================

#[test]
fn test_builtin_compressors_restore_input() {
    let data = sample_payload();
    let compressors: Vec<Box<dyn Compressor>> = vec![
        Box::new(NoCompression),
        Box::new(GzipCompressor::standard()),
        Box::new(GzipCompressor::max()),
        Box::new(ZstdCompressor::standard()),
        Box::new(ZstdCompressor::max()),
    ];

    for compressor in compressors {
        let packed = compressor.compress(&data).unwrap();
        let unpacked = compressor.decompress(&packed, data.len()).unwrap();
        assert_eq!(unpacked, data, "scheme {}", compressor.name());
    }
}

#[test]
fn test_compressors_shrink_repetitive_input() {
    let data = sample_payload();

    assert!(GzipCompressor::max().compress(&data).unwrap().len() < data.len() / 4);
    assert!(ZstdCompressor::standard().compress(&data).unwrap().len() < data.len() / 4);
}

#[test]
fn test_compressor_names() {
    assert_eq!(NoCompression.name(), "none");
    assert_eq!(GzipCompressor::standard().name(), "gzip");
    assert_eq!(GzipCompressor::max().name(), "gzip-max");
    assert_eq!(ZstdCompressor::standard().name(), "zstd");
    assert_eq!(ZstdCompressor::max().name(), "zstd-max");
}

#[test]
fn test_decompression_stops_past_expected_length() {
    let data = vec![0u8; 1_000_000];
    let compressors: Vec<Box<dyn Compressor>> = vec![
        Box::new(GzipCompressor::standard()),
        Box::new(ZstdCompressor::standard()),
    ];

    for compressor in compressors {
        let packed = compressor.compress(&data).unwrap();
        let restored = compressor.decompress(&packed, 100).unwrap();

        assert_eq!(restored.len(), 101, "{} read past the bound", compressor.name());
    }
}

#[test]
fn test_gzip_rejects_garbage() {
    let result = GzipCompressor::standard().decompress(b"definitely not gzip", 100);

    assert!(matches!(result, Err(ArchiveError::Codec(_))));
}

// =============================================================================
// Encryption Tests
// =============================================================================

#[test]
fn test_aes_round_trip() {
    let cipher = Aes256GcmCipher::new("vault", &[7u8; 32]);
    let data = sample_payload();

    let sealed = cipher.encrypt(&data).unwrap();
    assert_ne!(&sealed[12..], &data[..]);

    let opened = cipher.decrypt(&sealed).unwrap();
    assert_eq!(opened, data);
}

#[test]
fn test_aes_nonce_differs_per_call() {
    let cipher = Aes256GcmCipher::from_passphrase("vault", "correct horse");

    let a = cipher.encrypt(b"same page").unwrap();
    let b = cipher.encrypt(b"same page").unwrap();

    assert_ne!(a, b);
}

#[test]
fn test_aes_wrong_key_fails() {
    let writer = Aes256GcmCipher::from_passphrase("vault", "right");
    let reader = Aes256GcmCipher::from_passphrase("vault", "wrong");

    let sealed = writer.encrypt(b"secret ledger").unwrap();

    assert!(matches!(reader.decrypt(&sealed), Err(ArchiveError::Codec(_))));
}

#[test]
fn test_aes_detects_tampering() {
    let cipher = Aes256GcmCipher::new("vault", &[1u8; 32]);
    let mut sealed = cipher.encrypt(b"secret ledger").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    assert!(cipher.decrypt(&sealed).is_err());
}

#[test]
fn test_aes_rejects_short_input() {
    let cipher = Aes256GcmCipher::new("vault", &[1u8; 32]);

    assert!(cipher.decrypt(&[0u8; 5]).is_err());
}

#[test]
fn test_no_encryption_is_identity() {
    assert_eq!(NoEncryption.encrypt(b"abc").unwrap(), b"abc");
    assert_eq!(NoEncryption.decrypt(b"abc").unwrap(), b"abc");
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[test]
fn test_pipeline_round_trip() {
    let pipeline = CodecPipeline::new(
        Arc::new(ZstdCompressor::standard()),
        Arc::new(Aes256GcmCipher::new("vault", &[9u8; 32])),
    );
    let data = sample_payload();

    let stored = pipeline.encode_page(&data).unwrap();
    let restored = pipeline.decode_page(&stored, data.len(), 4096).unwrap();

    assert_eq!(restored, data);
    assert_eq!(pipeline.compression(), "zstd");
    assert_eq!(pipeline.encryption(), "vault");
}

#[test]
fn test_pipeline_decode_failure_is_corruption() {
    let pipeline = CodecPipeline::new(
        Arc::new(GzipCompressor::standard()),
        Arc::new(NoEncryption),
    );

    let err = pipeline.decode_page(b"garbage", 64, 777).unwrap_err();

    assert!(err.is_corruption());
    assert!(matches!(err, ArchiveError::CorruptPage { offset: 777, .. }));
}

#[test]
fn test_pipeline_length_mismatch_is_corruption() {
    let pipeline = CodecPipeline::new(Arc::new(NoCompression), Arc::new(NoEncryption));

    let err = pipeline.decode_page(b"twelve bytes", 10, 0).unwrap_err();

    assert!(err.is_corruption());
}
