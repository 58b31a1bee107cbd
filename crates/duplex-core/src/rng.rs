//! Deterministic scrambler
//!
//! Uses a simple xorshift64 algorithm for reproducibility across platforms.
//! Its state is part of the machine state, so a restored machine continues
//! the exact same sequence.

use serde::{Deserialize, Serialize};

/// A deterministic pseudo-random source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xorshift {
    state: u64,
}

impl Xorshift {
    /// Create a new generator with the given seed
    pub fn new(seed: u64) -> Self {
        // xorshift requires a non-zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Get the current state
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next raw u64 value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate the next byte (top bits, the best mixed)
    pub fn next_u8(&mut self) -> u8 {
        (self.next_u64() >> 56) as u8
    }
}

impl Default for Xorshift {
    fn default() -> Self {
        Self::new(12345)
    }
}
