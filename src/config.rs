//! Configuration for AtlasArc volumes
//!
//! Centralized volume configuration with sensible defaults.

/// Default page size: 1 MiB of framed entries before the codec pipeline
pub const DEFAULT_PAGE_SIZE_BYTES: usize = 1024 * 1024;

/// Smallest page size a volume accepts
pub const MIN_PAGE_SIZE_BYTES: usize = 256;

/// Default ceiling for a single serialized record (64 MiB)
pub const DEFAULT_MAX_ENTRY_BYTES: usize = 64 * 1024 * 1024;

/// Per-volume configuration
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Target size of a page's framed (pre-codec) bytes.
    /// A single record larger than this becomes its own oversized page.
    pub page_size_bytes: usize,

    /// Hard limit for one serialized record; larger records are rejected
    pub max_entry_bytes: usize,

    // -------------------------------------------------------------------------
    // Read Configuration
    // -------------------------------------------------------------------------
    /// What page iteration does when it meets a damaged page
    pub corruption_policy: CorruptionPolicy,
}

/// Reaction to a page that fails checksum or decoding during iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptionPolicy {
    /// Yield the error and stop iterating (default)
    #[default]
    Halt,

    /// Log, skip to the next page magic, and keep going
    Skip,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            page_size_bytes: DEFAULT_PAGE_SIZE_BYTES,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            corruption_policy: CorruptionPolicy::Halt,
        }
    }
}

impl VolumeConfig {
    /// Create a new config builder
    pub fn builder() -> VolumeConfigBuilder {
        VolumeConfigBuilder::default()
    }
}

/// Builder for VolumeConfig
#[derive(Default)]
pub struct VolumeConfigBuilder {
    config: VolumeConfig,
}

impl VolumeConfigBuilder {
    /// Set the page size (in bytes, pre-codec)
    pub fn page_size_bytes(mut self, size: usize) -> Self {
        self.config.page_size_bytes = size;
        self
    }

    /// Set the maximum serialized record size (in bytes)
    pub fn max_entry_bytes(mut self, size: usize) -> Self {
        self.config.max_entry_bytes = size;
        self
    }

    /// Set the corruption policy for page iteration
    pub fn corruption_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.config.corruption_policy = policy;
        self
    }

    pub fn build(self) -> VolumeConfig {
        self.config
    }
}
