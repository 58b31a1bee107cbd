//! Error types for duplex-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid cartridge: {0}")]
    InvalidCartridge(String),

    #[error("Failed to encode state: {0}")]
    Encode(String),

    #[error("Failed to decode state: {0}")]
    Decode(String),

    #[error("Machine error: {0}")]
    Machine(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
