//! Error types for AtlasArc
//!
//! Provides a unified error type for all volume operations.

use thiserror::Error;

/// Result type alias using ArchiveError
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Which half of the codec pipeline a scheme token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeKind {
    Compression,
    Encryption,
}

impl std::fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemeKind::Compression => write!(f, "compression"),
            SchemeKind::Encryption => write!(f, "encryption"),
        }
    }
}

/// Unified error type for AtlasArc operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    /// Bad magic, unsupported format version, or unparseable header
    #[error("Volume format error: {0}")]
    Format(String),

    /// Checksum mismatch, torn frame, or undecodable payload
    #[error("Corrupt page at offset {offset}: {reason}")]
    CorruptPage { offset: u64, reason: String },

    // -------------------------------------------------------------------------
    // Scheme Errors
    // -------------------------------------------------------------------------
    #[error("Unsupported {kind} scheme: '{name}'")]
    UnsupportedScheme { kind: SchemeKind, name: String },

    /// Compression or encryption failed on the write path
    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Write Path Errors
    // -------------------------------------------------------------------------
    #[error("Volume is faulted by an earlier I/O failure")]
    VolumeFaulted,

    #[error("Entry of {size} bytes exceeds the {limit} byte entry limit")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("Invalid volume state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Metadata Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Shorthand for a corrupt page error
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        ArchiveError::CorruptPage {
            offset,
            reason: reason.into(),
        }
    }

    /// True for errors that describe damaged page bytes
    pub fn is_corruption(&self) -> bool {
        matches!(self, ArchiveError::CorruptPage { .. })
    }
}
