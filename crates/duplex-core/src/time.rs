//! Frame and tick timing
//!
//! - `Tick` - one machine clock cycle
//! - `Frame` - one video frame, a fixed group of ticks

/// A machine clock cycle counter
pub type Tick = u64;

/// A frame number (simulation tick-group)
pub type Frame = u64;

/// Machine clock rate in ticks per second
pub const TICKS_PER_SECOND: u32 = 4_194_304;

/// Ticks in one video frame (154 lines of 456 dots)
pub const TICKS_PER_FRAME: u32 = 70_224;

/// Nominal frame rate used to size frame windows
pub const FRAMES_PER_SECOND: usize = 60;

/// Number of frames covering the given number of seconds
pub const fn frames_in_seconds(seconds: usize) -> usize {
    seconds * FRAMES_PER_SECOND
}
