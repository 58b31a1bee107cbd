//! Duplex Netcode - Rollback synchronization for two linked machines
//!
//! Both players' machines run on every peer. Local input is applied as it
//! happens; the peer's input arrives late over the network and is folded in
//! by rewinding to the frame it belongs to and re-simulating:
//!
//! - **History**: one snapshot of both machines and both link endpoints per frame
//! - **Patches**: remote inputs waiting for the next rebase
//! - **Rebase**: restore the oldest patched frame and replay to the newest
//! - **Session**: the live loop that records frames and re-seats machines
//!
//! # Architecture
//!
//! ```text
//!   local pad ──▶ LinkSession::advance_frame ──▶ StateSync::append_snapshot
//!                                                        │
//!   network  ──▶ LinkSession::receive_remote_input       ▼
//!                        │                      ┌──────────────────┐
//!                        └─── patch ──────────▶ │  RebaseEngine    │
//!                                               │  HistoryBuffer   │
//!                        ┌── restored pair ──── │  PatchQueue      │
//!                        ▼                      └──────────────────┘
//!                live machines
//! ```
//!
//! # Example
//!
//! ```rust
//! use duplex_core::{synthetic_rom, Button, Cartridge, Input, ReferenceMachine};
//! use duplex_netcode::{LinkSession, SyncConfig};
//!
//! let mine = Cartridge::new(synthetic_rom("RED", 3)).unwrap();
//! let theirs = Cartridge::new(synthetic_rom("BLUE", 3)).unwrap();
//! let config = SyncConfig::default().with_ticks_per_frame(1_024);
//! let mut session = LinkSession::<ReferenceMachine>::new(mine, theirs, config).unwrap();
//!
//! for _ in 0..4 {
//!     session.advance_frame(Input::empty()).unwrap();
//! }
//!
//! // The peer pressed A on frame 1; we only hear about it now
//! session.receive_remote_input(1, Input::press([Button::A])).unwrap();
//! assert_eq!(session.frame(), 4);
//! ```

mod config;
mod diagnostics;
mod error;
mod patch;
mod rebase;
mod session;
mod sync;

#[cfg(test)]
mod test_util;

pub use config::{SyncConfig, DEFAULT_RETENTION_FRAMES};
pub use diagnostics::{DiagnosticSink, MachineIndex, ReplayedPress};
pub use error::{Error, Result};
pub use patch::{Patch, PatchQueue};
pub use rebase::{RebaseEngine, RebaseOutcome};
pub use session::LinkSession;
pub use sync::StateSync;

// Re-export the history types the engine hands out
pub use duplex_rollback_buffer::{BufferStats, HistoryBuffer, Snapshot};
