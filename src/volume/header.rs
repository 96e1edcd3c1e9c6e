//! Volume Header
//!
//! Writes and validates the header that opens every volume.
//!
//! ```text
//! ┌───────────┬────────────────┬──────────────┬───────────────┬──────────────┐
//! │ Magic (4) │ FmtVersion (2) │ HeaderLen(4) │ Header (var)  │ HeaderCRC(4) │
//! └───────────┴────────────────┴──────────────┴───────────────┴──────────────┘
//! ```

use std::io::{ErrorKind, Read, Write};

use crate::error::{ArchiveError, Result};
use crate::metadata::VolumeMetadata;

use super::{FORMAT_VERSION, MAGIC, MAX_HEADER_BYTES};

/// Fixed bytes before the serialized metadata: Magic (4) + Version (2) + Len (4)
pub(crate) const HEADER_PREFIX_SIZE: u64 = 10;

/// Write the header; returns the number of bytes written
pub(crate) fn write_header<W: Write>(writer: &mut W, metadata: &VolumeMetadata) -> Result<u64> {
    let body = metadata.to_bytes()?;
    if body.len() > MAX_HEADER_BYTES {
        return Err(ArchiveError::Validation(format!(
            "Serialized metadata is {} bytes (max {})",
            body.len(),
            MAX_HEADER_BYTES
        )));
    }

    let crc = crc32fast::hash(&body);

    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(body.len() as u32).to_le_bytes())?;
    writer.write_all(&body)?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.flush()?;

    Ok(HEADER_PREFIX_SIZE + body.len() as u64 + 4)
}

/// Read and validate a header; returns the metadata and the header size
pub(crate) fn read_header<R: Read>(reader: &mut R) -> Result<(VolumeMetadata, u64)> {
    let mut prefix = [0u8; HEADER_PREFIX_SIZE as usize];
    read_exact_or_format(reader, &mut prefix, "header prefix")?;

    if &prefix[0..4] != MAGIC {
        return Err(ArchiveError::Format(format!(
            "Invalid volume magic: expected {:?}, got {:?}",
            MAGIC,
            &prefix[0..4]
        )));
    }

    let version = u16::from_le_bytes([prefix[4], prefix[5]]);
    if version != FORMAT_VERSION {
        return Err(ArchiveError::Format(format!(
            "Unsupported volume format version: {}",
            version
        )));
    }

    let body_len = u32::from_le_bytes([prefix[6], prefix[7], prefix[8], prefix[9]]) as usize;
    if body_len > MAX_HEADER_BYTES {
        return Err(ArchiveError::Format(format!(
            "Header length {} exceeds maximum {}",
            body_len, MAX_HEADER_BYTES
        )));
    }

    let mut body = vec![0u8; body_len];
    read_exact_or_format(reader, &mut body, "header body")?;

    let mut crc_bytes = [0u8; 4];
    read_exact_or_format(reader, &mut crc_bytes, "header checksum")?;
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let actual_crc = crc32fast::hash(&body);
    if stored_crc != actual_crc {
        return Err(ArchiveError::Format(format!(
            "Header checksum mismatch: stored 0x{:08x}, computed 0x{:08x}",
            stored_crc, actual_crc
        )));
    }

    let metadata = VolumeMetadata::from_bytes(&body)?;
    Ok((metadata, HEADER_PREFIX_SIZE + body_len as u64 + 4))
}

/// A short header is a format problem, not a plain I/O failure
fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ArchiveError::Format(format!("Truncated volume {}", what))
        } else {
            ArchiveError::Io(e)
        }
    })
}
