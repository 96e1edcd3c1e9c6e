//! Page origin
//!
//! Identity and clock an appender stamps onto every page it starts. Both are
//! supplied by the caller; the archive never invents them.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::volume::PageStamp;

/// Source of wall-clock time
pub trait TimeSource: Send + Sync {
    /// Current time in unix milliseconds
    fn now_unix_ms(&self) -> u64;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock stuck at one instant (replays, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl TimeSource for FixedClock {
    fn now_unix_ms(&self) -> u64 {
        self.0
    }
}

/// Application id, actor and clock for page stamps
#[derive(Clone)]
pub struct Origin {
    pub app_id: String,
    pub actor: String,
    pub clock: Arc<dyn TimeSource>,
}

impl Origin {
    /// Origin using the system clock
    pub fn new(app_id: impl Into<String>, actor: impl Into<String>) -> Self {
        Self::with_clock(app_id, actor, Arc::new(SystemClock))
    }

    pub fn with_clock(app_id: impl Into<String>, actor: impl Into<String>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            app_id: app_id.into(),
            actor: actor.into(),
            clock,
        }
    }

    /// Stamp for a page started now
    pub(crate) fn stamp(&self) -> PageStamp {
        PageStamp {
            created_unix_ms: self.clock.now_unix_ms(),
            app_id: self.app_id.clone(),
            actor: self.actor.clone(),
        }
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin")
            .field("app_id", &self.app_id)
            .field("actor", &self.actor)
            .finish_non_exhaustive()
    }
}
