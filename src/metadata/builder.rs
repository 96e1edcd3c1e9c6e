//! Metadata Builder
//!
//! Stages header fields in a mutable draft and freezes them into a
//! [`VolumeMetadata`]. Setters validate as they go; the first problem is
//! remembered and reported by `build()` so a chain never has to stop halfway.

use crate::error::{ArchiveError, Result};

use super::{Channel, ConfigNode, Version, VolumeMetadata, SCHEME_NONE};

/// Mutable state behind a builder
#[derive(Debug)]
struct Draft {
    name: String,
    version: Option<Version>,
    description: String,
    channel: Channel,
    compression: String,
    encryption: String,
    application: Option<ConfigNode>,
    compression_section: Option<ConfigNode>,
    encryption_section: Option<ConfigNode>,
}

/// Fluent builder for VolumeMetadata
#[derive(Debug)]
pub struct MetadataBuilder {
    draft: Draft,
    /// First validation failure seen by a setter
    error: Option<String>,
}

impl MetadataBuilder {
    /// Start a draft for a volume called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            draft: Draft {
                name: name.into(),
                version: None,
                description: String::new(),
                channel: Channel::ZERO,
                compression: SCHEME_NONE.to_string(),
                encryption: SCHEME_NONE.to_string(),
                application: None,
                compression_section: None,
                encryption_section: None,
            },
            error: None,
        }
    }

    /// Set the content version
    pub fn version(mut self, major: u32, minor: u32) -> Self {
        self.draft.version = Some(Version { major, minor });
        self
    }

    /// Set the free-text description
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.draft.description = text.into();
        self
    }

    /// Set the channel token (see [`Channel::encode`])
    pub fn channel(mut self, token: &str) -> Self {
        match Channel::encode(token) {
            Ok(channel) => self.draft.channel = channel,
            Err(e) => self.fail(e.to_string()),
        }
        self
    }

    /// Set the compression scheme token
    pub fn compression_scheme(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        match validate_scheme_token("compression", &token) {
            Ok(()) => self.draft.compression = token,
            Err(msg) => self.fail(msg),
        }
        self
    }

    /// Set the encryption scheme token
    pub fn encryption_scheme(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        match validate_scheme_token("encryption", &token) {
            Ok(()) => self.draft.encryption = token,
            Err(msg) => self.fail(msg),
        }
        self
    }

    /// Populate the application section. Repeated calls add to the same node.
    pub fn application_section(mut self, f: impl FnOnce(&mut ConfigNode)) -> Self {
        f(self.draft.application.get_or_insert_with(|| ConfigNode::new("application")));
        self
    }

    /// Populate the compression section. Repeated calls add to the same node.
    pub fn compression_section(mut self, f: impl FnOnce(&mut ConfigNode)) -> Self {
        f(self
            .draft
            .compression_section
            .get_or_insert_with(|| ConfigNode::new("compression")));
        self
    }

    /// Populate the encryption section. Repeated calls add to the same node.
    pub fn encryption_section(mut self, f: impl FnOnce(&mut ConfigNode)) -> Self {
        f(self
            .draft
            .encryption_section
            .get_or_insert_with(|| ConfigNode::new("encryption")));
        self
    }

    /// Freeze the draft.
    ///
    /// Fails if a setter rejected its input, the name is blank, or no
    /// version was set.
    pub fn build(self) -> Result<VolumeMetadata> {
        if let Some(msg) = self.error {
            return Err(ArchiveError::Validation(msg));
        }

        let draft = self.draft;
        if draft.name.trim().is_empty() {
            return Err(ArchiveError::Validation("Volume name must not be blank".to_string()));
        }
        let version = draft.version.ok_or_else(|| {
            ArchiveError::Validation(format!("Volume '{}' has no version set", draft.name))
        })?;

        Ok(VolumeMetadata {
            name: draft.name,
            version,
            description: draft.description,
            channel: draft.channel,
            compression: draft.compression,
            encryption: draft.encryption,
            application: draft.application,
            compression_section: draft.compression_section,
            encryption_section: draft.encryption_section,
        })
    }

    fn fail(&mut self, msg: String) {
        if self.error.is_none() {
            self.error = Some(msg);
        }
    }
}

fn validate_scheme_token(kind: &str, token: &str) -> std::result::Result<(), String> {
    if token.trim().is_empty() {
        return Err(format!("The {} scheme token must not be blank", kind));
    }
    if token.len() > 64 || token.chars().any(char::is_whitespace) {
        return Err(format!("Invalid {} scheme token '{}'", kind, token));
    }
    Ok(())
}
