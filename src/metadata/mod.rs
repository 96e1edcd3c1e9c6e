//! Volume Metadata Module
//!
//! The immutable header describing a volume's identity and codec choice.
//!
//! ## Responsibilities
//! - Identity: name, version, description, channel
//! - Codec selection: compression and encryption scheme tokens
//! - Opaque configuration sections for the application and the codecs
//!
//! Metadata is assembled once through [`MetadataBuilder`], frozen by
//! `build()`, written at the head of a volume and never rewritten.

mod builder;
mod channel;
mod section;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

pub use builder::MetadataBuilder;
pub use channel::{Channel, MAX_CHANNEL_LEN};
pub use section::{ConfigNode, ConfigValue};

/// Scheme token that always resolves to the identity codec
pub const SCHEME_NONE: &str = "none";

/// Application-level version of a volume's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Frozen volume header.
///
/// There are no setters; build one with [`VolumeMetadata::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMetadata {
    pub(crate) name: String,
    pub(crate) version: Version,
    pub(crate) description: String,
    pub(crate) channel: Channel,
    pub(crate) compression: String,
    pub(crate) encryption: String,
    pub(crate) application: Option<ConfigNode>,
    pub(crate) compression_section: Option<ConfigNode>,
    pub(crate) encryption_section: Option<ConfigNode>,
}

impl VolumeMetadata {
    /// Start building metadata for a volume called `name`
    pub fn builder(name: impl Into<String>) -> MetadataBuilder {
        MetadataBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Compression scheme token
    pub fn compression(&self) -> &str {
        &self.compression
    }

    /// Encryption scheme token
    pub fn encryption(&self) -> &str {
        &self.encryption
    }

    pub fn application_section(&self) -> Option<&ConfigNode> {
        self.application.as_ref()
    }

    pub fn compression_section(&self) -> Option<&ConfigNode> {
        self.compression_section.as_ref()
    }

    pub fn encryption_section(&self) -> Option<&ConfigNode> {
        self.encryption_section.as_ref()
    }

    // =========================================================================
    // Header Serialization
    // =========================================================================

    /// Serialize for the volume header
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    /// Parse header bytes; anything unparseable or invalid is a format error
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let meta: VolumeMetadata = bincode::deserialize(bytes)
            .map_err(|e| ArchiveError::Format(format!("Unparseable volume header: {}", e)))?;

        if meta.name.trim().is_empty() {
            return Err(ArchiveError::Format("Volume header has a blank name".to_string()));
        }
        Channel::from_raw(meta.channel.raw())
            .map_err(|e| ArchiveError::Format(format!("Volume header channel: {}", e)))?;

        Ok(meta)
    }
}
