//! Scheme Registry
//!
//! Maps scheme tokens to compression and encryption strategies.
//!
//! A process-wide registry pre-populated with the built-in schemes is
//! available through [`SchemeRegistry::global`]; callers can also build
//! private registries and hand them to `Volume::open_*_with`.
//!
//! ```ignore
//! use atlasarc::scheme::{register_cipher, Aes256GcmCipher};
//!
//! // Called once at initialization, before volumes using the scheme open
//! register_cipher(Aes256GcmCipher::from_passphrase("ops-keys", "correct horse"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use crate::error::{ArchiveError, Result, SchemeKind};
use crate::metadata::SCHEME_NONE;

use super::compression::{Compressor, GzipCompressor, NoCompression, ZstdCompressor};
use super::encryption::{Cipher, NoEncryption};
use super::pipeline::CodecPipeline;

/// Global registry, created with the built-ins on first use
static GLOBAL_REGISTRY: Lazy<RwLock<SchemeRegistry>> =
    Lazy::new(|| RwLock::new(SchemeRegistry::with_builtins()));

/// Name → strategy tables for both codec stages
#[derive(Clone)]
pub struct SchemeRegistry {
    compressors: HashMap<String, Arc<dyn Compressor>>,
    ciphers: HashMap<String, Arc<dyn Cipher>>,
}

impl SchemeRegistry {
    /// Registry holding only the `"none"` strategies
    pub fn new() -> Self {
        let mut registry = Self {
            compressors: HashMap::new(),
            ciphers: HashMap::new(),
        };
        registry
            .compressors
            .insert(SCHEME_NONE.to_string(), Arc::new(NoCompression));
        registry
            .ciphers
            .insert(SCHEME_NONE.to_string(), Arc::new(NoEncryption));
        registry
    }

    /// Registry with every built-in compressor (`gzip`, `gzip-max`, `zstd`,
    /// `zstd-max`) plus the `"none"` strategies
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.add_compressor(GzipCompressor::standard());
        registry.add_compressor(GzipCompressor::max());
        registry.add_compressor(ZstdCompressor::standard());
        registry.add_compressor(ZstdCompressor::max());
        registry
    }

    /// Snapshot of the process-wide registry
    pub fn global() -> SchemeRegistry {
        GLOBAL_REGISTRY.read().clone()
    }

    /// Add or replace a compressor under its own name.
    /// `"none"` is fixed and cannot be replaced.
    pub fn add_compressor(&mut self, compressor: impl Compressor + 'static) -> bool {
        let name = compressor.name().to_string();
        if name == SCHEME_NONE {
            return false;
        }
        self.compressors.insert(name, Arc::new(compressor));
        true
    }

    /// Add or replace a cipher under its own name.
    /// `"none"` is fixed and cannot be replaced.
    pub fn add_cipher(&mut self, cipher: impl Cipher + 'static) -> bool {
        let name = cipher.name().to_string();
        if name == SCHEME_NONE {
            return false;
        }
        self.ciphers.insert(name, Arc::new(cipher));
        true
    }

    pub fn compressor(&self, name: &str) -> Result<Arc<dyn Compressor>> {
        self.compressors
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::UnsupportedScheme {
                kind: SchemeKind::Compression,
                name: name.to_string(),
            })
    }

    pub fn cipher(&self, name: &str) -> Result<Arc<dyn Cipher>> {
        self.ciphers
            .get(name)
            .cloned()
            .ok_or_else(|| ArchiveError::UnsupportedScheme {
                kind: SchemeKind::Encryption,
                name: name.to_string(),
            })
    }

    /// Resolve both tokens into a pipeline
    pub fn resolve(&self, compression: &str, encryption: &str) -> Result<CodecPipeline> {
        Ok(CodecPipeline::new(self.compressor(compression)?, self.cipher(encryption)?))
    }

    /// Registered compression scheme names, sorted
    pub fn compression_schemes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.compressors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered encryption scheme names, sorted
    pub fn encryption_schemes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ciphers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("compression", &self.compression_schemes())
            .field("encryption", &self.encryption_schemes())
            .finish()
    }
}

// =============================================================================
// Process-wide Registration
// =============================================================================

/// Register a compressor in the global registry
pub fn register_compressor(compressor: impl Compressor + 'static) {
    let name = compressor.name().to_string();
    if GLOBAL_REGISTRY.write().add_compressor(compressor) {
        info!(scheme = %name, "Registered compression scheme");
    }
}

/// Register a cipher in the global registry
pub fn register_cipher(cipher: impl Cipher + 'static) {
    let name = cipher.name().to_string();
    if GLOBAL_REGISTRY.write().add_cipher(cipher) {
        info!(scheme = %name, "Registered encryption scheme");
    }
}
