//! # AtlasArc
//!
//! An append-only, page-structured archive format with:
//! - Self-describing volumes (versioned metadata header, channel tag)
//! - Pluggable per-page compression and encryption schemes
//! - Typed appenders that batch records into checksummed pages
//! - Commit observers and sparse bookmark indexes for point lookups
//! - Lenient readers that can skip damaged pages
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Appender<T> (one per producer)                  │
//! │        EntryCodec<T> → PageBuffer → commit observer          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ framed page
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Volume<S>                               │
//! │      CodecPipeline (compress → encrypt) + commit mutex       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Data Volume │◄─lookup──│ Index Volume│
//!   │  (records)  │          │ (bookmarks) │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod metadata;
pub mod scheme;
pub mod volume;
pub mod record;
pub mod appender;
pub mod index;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ArchiveError, Result};
pub use config::{CorruptionPolicy, VolumeConfig};
pub use metadata::{Channel, ConfigNode, MetadataBuilder, Version, VolumeMetadata};
pub use scheme::SchemeRegistry;
pub use volume::{Entry, EntryLocation, Page, PageLocation, Volume};
pub use record::EntryCodec;
pub use appender::{Appender, Origin};
pub use index::{BookmarkIndex, IndexAppender};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasArc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
