//! Replay diagnostics
//!
//! While a rebase re-simulates, every button press the two machines register
//! can be forwarded to an optional observer. Nothing posted here feeds back
//! into the algorithm.

use duplex_core::{Button, JoypadPressEvent, SharedSink, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which of the two linked machines produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineIndex {
    /// The local player's machine
    Primary,
    /// The remote player's machine
    Secondary,
}

impl MachineIndex {
    /// Numeric index (0 for primary, 1 for secondary)
    pub fn index(self) -> usize {
        match self {
            MachineIndex::Primary => 0,
            MachineIndex::Secondary => 1,
        }
    }
}

impl fmt::Display for MachineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineIndex::Primary => write!(f, "primary"),
            MachineIndex::Secondary => write!(f, "secondary"),
        }
    }
}

/// A button press registered by a machine during replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayedPress {
    pub button: Button,
    /// Machine tick at which the press was registered
    pub tick: Tick,
    pub machine: MachineIndex,
}

/// Optional observer of replayed presses
pub type DiagnosticSink = SharedSink<ReplayedPress>;

/// Sink handed to a machine: tags its presses and forwards them
pub(crate) fn machine_sink(
    diagnostics: Option<&DiagnosticSink>,
    machine: MachineIndex,
) -> SharedSink<JoypadPressEvent> {
    let diagnostics = diagnostics.cloned();
    Arc::new(move |event: JoypadPressEvent| {
        if let Some(sink) = &diagnostics {
            sink.post(ReplayedPress {
                button: event.button,
                tick: event.tick,
                machine,
            });
        }
    })
}
