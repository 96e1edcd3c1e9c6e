//! Compression strategies

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{ArchiveError, Result};

/// Compression capability resolved by scheme name.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// volume that resolves its name.
pub trait Compressor: Send + Sync {
    /// Scheme token this strategy is registered under
    fn name(&self) -> &str;

    /// Compress a page's framed bytes
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Reverse `compress`. `expected_len` is the recorded uncompressed size;
    /// output may stop one byte past it, which callers treat as a mismatch.
    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

// =============================================================================
// Identity
// =============================================================================

/// Pass-through compressor registered as `"none"`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn name(&self) -> &str {
        "none"
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], _expected_len: usize) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// =============================================================================
// Gzip
// =============================================================================

/// Gzip (deflate) compressor
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    name: String,
    level: flate2::Compression,
}

impl GzipCompressor {
    /// `"gzip"`: balanced level
    pub fn standard() -> Self {
        Self::with_level("gzip", flate2::Compression::default())
    }

    /// `"gzip-max"`: best compression
    pub fn max() -> Self {
        Self::with_level("gzip-max", flate2::Compression::best())
    }

    pub fn with_level(name: impl Into<String>, level: flate2::Compression) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

impl Compressor for GzipCompressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .map_err(|e| ArchiveError::Codec(format!("gzip encode: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| ArchiveError::Codec(format!("gzip finish: {}", e)))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(expected_len);
        // One byte past the expected length is enough to report a mismatch
        GzDecoder::new(data)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| ArchiveError::Codec(format!("gzip decode: {}", e)))?;
        Ok(out)
    }
}

// =============================================================================
// Zstd
// =============================================================================

/// Zstandard compressor
#[derive(Debug, Clone)]
pub struct ZstdCompressor {
    name: String,
    level: i32,
}

impl ZstdCompressor {
    /// `"zstd"`: level 3
    pub fn standard() -> Self {
        Self::with_level("zstd", 3)
    }

    /// `"zstd-max"`: level 19
    pub fn max() -> Self {
        Self::with_level("zstd-max", 19)
    }

    pub fn with_level(name: impl Into<String>, level: i32) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::stream::encode_all(data, self.level)
            .map_err(|e| ArchiveError::Codec(format!("zstd encode: {}", e)))
    }

    fn decompress(&self, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| ArchiveError::Codec(format!("zstd decode: {}", e)))?;
        let mut out = Vec::with_capacity(expected_len);
        decoder
            .take(expected_len as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| ArchiveError::Codec(format!("zstd decode: {}", e)))?;
        Ok(out)
    }
}
