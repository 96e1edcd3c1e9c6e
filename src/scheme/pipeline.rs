//! Codec Pipeline
//!
//! The resolved compression + encryption pair a volume applies to every page.

use std::sync::Arc;

use crate::error::{ArchiveError, Result};

use super::compression::Compressor;
use super::encryption::Cipher;

/// Compression followed by encryption, resolved once per volume
#[derive(Clone)]
pub struct CodecPipeline {
    compressor: Arc<dyn Compressor>,
    cipher: Arc<dyn Cipher>,
}

impl CodecPipeline {
    pub fn new(compressor: Arc<dyn Compressor>, cipher: Arc<dyn Cipher>) -> Self {
        Self { compressor, cipher }
    }

    pub fn compression(&self) -> &str {
        self.compressor.name()
    }

    pub fn encryption(&self) -> &str {
        self.cipher.name()
    }

    /// raw framed entries → compress → encrypt
    pub fn encode_page(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let compressed = self.compressor.compress(raw)?;
        self.cipher.encrypt(&compressed)
    }

    /// Exact inverse of `encode_page`.
    ///
    /// Every failure here means the stored bytes cannot be trusted, so it is
    /// reported as a corrupt page at `offset`.
    pub fn decode_page(&self, stored: &[u8], uncompressed_len: usize, offset: u64) -> Result<Vec<u8>> {
        let compressed = self
            .cipher
            .decrypt(stored)
            .map_err(|e| ArchiveError::corrupt(offset, e.to_string()))?;
        let raw = self
            .compressor
            .decompress(&compressed, uncompressed_len)
            .map_err(|e| ArchiveError::corrupt(offset, e.to_string()))?;

        if raw.len() != uncompressed_len {
            return Err(ArchiveError::corrupt(
                offset,
                format!(
                    "decoded {} bytes, page header records {}",
                    raw.len(),
                    uncompressed_len
                ),
            ));
        }
        Ok(raw)
    }
}

impl std::fmt::Debug for CodecPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecPipeline")
            .field("compression", &self.compression())
            .field("encryption", &self.encryption())
            .finish()
    }
}
