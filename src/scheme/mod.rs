//! Scheme Module
//!
//! Pluggable compression and encryption, selected by name at runtime.
//!
//! ## Page Codec Path
//! ```text
//!  write:  framed entries ──► compress ──► encrypt ──► stored payload
//!  read:   stored payload ──► decrypt ──► decompress ──► framed entries
//! ```
//!
//! ## Built-in Schemes
//! | Token      | Stage       | Implementation            |
//! |------------|-------------|---------------------------|
//! | `none`     | both        | identity (always present) |
//! | `gzip`     | compression | flate2, default level     |
//! | `gzip-max` | compression | flate2, best              |
//! | `zstd`     | compression | zstd level 3              |
//! | `zstd-max` | compression | zstd level 19             |
//!
//! Encryption schemes carry key material and are registered by the caller,
//! e.g. an [`Aes256GcmCipher`] under a key-set name.

mod compression;
mod encryption;
mod pipeline;
mod registry;

pub use compression::{Compressor, GzipCompressor, NoCompression, ZstdCompressor};
pub use encryption::{Aes256GcmCipher, Cipher, NoEncryption};
pub use pipeline::CodecPipeline;
pub use registry::{register_cipher, register_compressor, SchemeRegistry};
