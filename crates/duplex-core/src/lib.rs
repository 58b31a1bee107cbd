//! Duplex Core - Machine, link and input abstractions for linked emulation
//!
//! This crate provides the collaborator interfaces the rollback engine is
//! built on:
//! - Buttons, button events and per-frame `Input` sets
//! - The `Machine` and `LinkEndpoint` traits (construct, init, tick, save, restore)
//! - Opaque, immutable state captures (`Memento`)
//! - Event sinks for observing joypad presses
//! - Frame/tick timing constants
//!
//! ## Reference collaborators
//!
//! Real CPU/PPU emulation lives outside this workspace. `ReferenceMachine`
//! and `SerialEndpoint` are small deterministic implementations of the traits
//! used to exercise the rollback engine end to end:
//!
//! ```rust
//! use duplex_core::{
//!     linked_pair, null_events, run_lockstep, synthetic_rom, Cartridge, Machine,
//!     ReferenceMachine, TICKS_PER_FRAME,
//! };
//!
//! let cart = Cartridge::new(synthetic_rom("DEMO", 2)).unwrap();
//! let (mut primary, mut secondary) =
//!     linked_pair::<ReferenceMachine>(&cart, &cart, null_events(), null_events()).unwrap();
//!
//! run_lockstep(&mut primary, &mut secondary, TICKS_PER_FRAME);
//! let capture = primary.save().unwrap();
//! assert!(!capture.is_empty());
//! ```

mod button;
mod cartridge;
mod error;
mod joypad;
mod machine;
mod memento;
mod reference;
mod rng;
mod serial;
mod sink;
pub mod time;

pub use button::{Button, ButtonEvent, Input};
pub use cartridge::{Cartridge, HEADER_END};
pub use error::{Error, Result};
pub use joypad::{Joypad, P1_ADDRESS};
pub use machine::{linked_pair, run_lockstep, JoypadPressEvent, LinkEndpoint, Machine};
pub use memento::Memento;
pub use reference::{null_events, synthetic_rom, ReferenceMachine, SERIAL_PERIOD, WRAM_SIZE};
pub use rng::Xorshift;
pub use serial::{SerialEndpoint, LINE_DEAD};
pub use sink::{EventSink, NullSink, RecordingSink, SharedSink};
pub use time::{Frame, Tick, TICKS_PER_FRAME};
