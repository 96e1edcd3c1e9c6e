//! Channel tokens
//!
//! A channel is a short routing token (1..=8 ASCII characters) packed into a
//! single `u64`, so comparing or storing channels never touches strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// Maximum number of characters in a channel token
pub const MAX_CHANNEL_LEN: usize = 8;

/// Interned channel token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Channel(u64);

impl Channel {
    /// The empty channel
    pub const ZERO: Channel = Channel(0);

    /// Pack a token into a channel.
    ///
    /// Accepts 1..=8 characters from `[A-Za-z0-9_-]`.
    pub fn encode(token: &str) -> Result<Self> {
        if token.is_empty() || token.len() > MAX_CHANNEL_LEN {
            return Err(ArchiveError::Validation(format!(
                "Channel '{}' must be 1..={} characters",
                token, MAX_CHANNEL_LEN
            )));
        }

        let mut raw = [0u8; 8];
        for (i, b) in token.bytes().enumerate() {
            if !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-') {
                return Err(ArchiveError::Validation(format!(
                    "Channel '{}' contains invalid character {:?}",
                    token, b as char
                )));
            }
            raw[i] = b;
        }

        Ok(Channel(u64::from_le_bytes(raw)))
    }

    /// Rebuild a channel from its packed form (e.g. read from a header)
    pub fn from_raw(raw: u64) -> Result<Self> {
        if raw == 0 {
            return Ok(Channel::ZERO);
        }
        let bytes = raw.to_le_bytes();
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(MAX_CHANNEL_LEN);
        if bytes[len..].iter().any(|&b| b != 0) {
            return Err(ArchiveError::Validation(format!(
                "Channel value 0x{:016x} has interior padding",
                raw
            )));
        }
        let token = std::str::from_utf8(&bytes[..len])
            .map_err(|_| ArchiveError::Validation(format!("Channel value 0x{:016x} is not ASCII", raw)))?;
        Channel::encode(token)
    }

    /// The packed `u64` value
    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The token text (empty for [`Channel::ZERO`])
    pub fn as_string(&self) -> String {
        self.0
            .to_le_bytes()
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}
