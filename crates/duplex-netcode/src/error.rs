//! Error types for duplex-netcode

use duplex_core::Frame;
use thiserror::Error;

/// Netcode error type
#[derive(Debug, Error)]
pub enum Error {
    /// No snapshot has been recorded yet
    #[error("History is empty")]
    EmptyHistory,

    /// The rebase base frame is no longer (or never was) in history
    ///
    /// Fatal: the retention window is too small for the observed peer
    /// latency. The session should be torn down or resynchronized.
    #[error("Cannot rebase to frame {frame}, oldest available is {oldest:?}")]
    MissingBaseFrame { frame: Frame, oldest: Option<Frame> },

    /// A rebase would step past the last representable frame
    #[error("Frame {frame} is the last representable frame")]
    FrameOverflow { frame: Frame },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Machine or link collaborator failed
    #[error("Core error: {0}")]
    Core(#[from] duplex_core::Error),
}

impl Error {
    /// Whether the session owning the engine must be torn down
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingBaseFrame { .. } | Error::Core(_))
    }
}

/// Result type for netcode operations
pub type Result<T> = std::result::Result<T, Error>;

// Compile-time check that Error is Send + Sync so it can cross from the
// receiver thread to the session owner.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
