//! Synchronization configuration
//!
//! Controls how much history is retained and how long a frame is.
//! Can be built in code or loaded from RON.

use crate::{Error, Result};
use duplex_core::{time, TICKS_PER_FRAME};
use serde::{Deserialize, Serialize};

/// Default retention window: five seconds of frames
pub const DEFAULT_RETENTION_FRAMES: usize = time::frames_in_seconds(5);

/// Configuration for the rollback engine
///
/// # Example
///
/// ```
/// use duplex_netcode::SyncConfig;
///
/// let config = SyncConfig::from_ron_str("(retention_frames: 600)").unwrap();
/// assert_eq!(config.retention_frames(), 600);
/// assert_eq!(config.ticks_per_frame(), duplex_core::TICKS_PER_FRAME);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of frames kept in history
    ///
    /// Bounds how late a remote input may arrive and still be folded in.
    /// Clamped to at least 1.
    retention_frames: usize,

    /// Machine ticks simulated per frame. Clamped to at least 1.
    ticks_per_frame: u32,
}

impl SyncConfig {
    /// Set the retention window (clamped to at least 1)
    pub fn with_retention_frames(mut self, frames: usize) -> Self {
        self.retention_frames = frames.max(1);
        self
    }

    /// Set the frame length in ticks (clamped to at least 1)
    pub fn with_ticks_per_frame(mut self, ticks: u32) -> Self {
        self.ticks_per_frame = ticks.max(1);
        self
    }

    pub fn retention_frames(&self) -> usize {
        self.retention_frames
    }

    pub fn ticks_per_frame(&self) -> u32 {
        self.ticks_per_frame
    }

    /// Parse a configuration from RON
    ///
    /// Missing fields take their default values; out-of-range values are clamped.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: SyncConfig = ron::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Serialize the configuration as pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn normalized(self) -> Self {
        Self {
            retention_frames: self.retention_frames.max(1),
            ticks_per_frame: self.ticks_per_frame.max(1),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retention_frames: DEFAULT_RETENTION_FRAMES,
            ticks_per_frame: TICKS_PER_FRAME,
        }
    }
}
