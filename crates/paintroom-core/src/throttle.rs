//! Time-windowed gate for network pushes.
//!
//! A single-token limiter: once the window has elapsed since the last
//! recorded sync, one push is allowed. The window only restarts when the
//! caller records the push with [`SyncThrottle::mark_synced`].

use crate::clock::Timestamp;
use std::time::Duration;

/// Default minimum interval between pushes.
pub const DEFAULT_SYNC_WINDOW_MS: u64 = 100;

/// Returns true iff strictly more than `window` has passed since `last_sync`.
pub fn should_sync(now: Timestamp, last_sync: Timestamp, window: Duration) -> bool {
    now.saturating_since(last_sync) > window
}

/// Sync gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncThrottle {
    window: Duration,
    /// `None` until the first push, which is always allowed.
    last_sync: Option<Timestamp>,
}

impl Default for SyncThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_SYNC_WINDOW_MS))
    }
}

impl SyncThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sync: None,
        }
    }

    pub fn should_sync(&self, now: Timestamp) -> bool {
        self.last_sync
            .is_none_or(|last| should_sync(now, last, self.window))
    }

    pub fn mark_synced(&mut self, now: Timestamp) {
        self.last_sync = Some(now);
    }

    pub fn last_sync(&self) -> Option<Timestamp> {
        self.last_sync
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
