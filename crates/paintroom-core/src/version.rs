//! Monotonic canvas version used for staleness checks.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// Version counter plus the time of the last bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasVersion {
    version: u64,
    last_modified: Timestamp,
}

impl CanvasVersion {
    /// Start at version 1.
    pub fn new(now: Timestamp) -> Self {
        Self {
            version: 1,
            last_modified: now,
        }
    }

    /// Increment by exactly one. Every call counts.
    pub fn bump(&mut self, now: Timestamp) -> u64 {
        self.version += 1;
        self.last_modified = now;
        self.version
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// True if the canvas changed since `seen` was read.
    pub fn is_newer_than(&self, seen: u64) -> bool {
        self.version > seen
    }
}

impl Default for CanvasVersion {
    fn default() -> Self {
        Self::new(Timestamp::now())
    }
}
