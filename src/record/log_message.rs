//! Log messages
//!
//! A ready-made record type for archiving application log output. Each
//! message carries a unique id, which makes it a natural bookmark key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArchiveError, Result};

use super::EntryCodec;

/// Severity of a log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// One archived log message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Unique message id
    pub id: Uuid,
    /// Id of a related message or operation, if any
    pub related_to: Option<Uuid>,
    pub level: LogLevel,
    pub topic: String,
    /// Component or method that emitted the message
    pub from: String,
    pub text: String,
    pub exception: Option<String>,
    /// Unix milliseconds
    pub utc_ms: u64,
}

impl LogMessage {
    /// A message with a fresh id and no relation or exception
    pub fn new(level: LogLevel, topic: impl Into<String>, text: impl Into<String>, utc_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            related_to: None,
            level,
            topic: topic.into(),
            from: String::new(),
            text: text.into(),
            exception: None,
            utc_ms,
        }
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn related_to(mut self, id: Uuid) -> Self {
        self.related_to = Some(id);
        self
    }

    pub fn exception(mut self, text: impl Into<String>) -> Self {
        self.exception = Some(text.into());
        self
    }
}

/// Bincode codec dedicated to log messages (kind 4)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageCodec;

impl EntryCodec<LogMessage> for LogMessageCodec {
    const KIND: u8 = 4;

    fn encode(&self, record: &LogMessage, out: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(out, record).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<LogMessage> {
        bincode::deserialize(bytes).map_err(|e| ArchiveError::Serialization(e.to_string()))
    }
}
