//! Peer-to-peer serial link endpoints
//!
//! Two endpoints created by [`SerialEndpoint::pair`] share a wire. A transfer
//! puts this side's byte on the wire and latches whatever the other side last
//! put there. An endpoint whose partner never sent anything reads 0xFF, the
//! "line dead" value of a disconnected cable.
//!
//! The byte an endpoint has on the wire is part of its own saved state, so
//! restoring both endpoints of a pair restores the wire as well.

use crate::machine::LinkEndpoint;
use crate::memento::Memento;
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Value read from a line nobody drives
pub const LINE_DEAD: u8 = 0xFF;

#[derive(Debug, Default)]
struct Wire {
    lines: [Option<u8>; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct EndpointState {
    /// SB: last byte shifted in
    shift_register: u8,
    /// Byte this side currently drives on the wire
    outgoing: Option<u8>,
    /// Completed transfers
    transfers: u64,
}

/// One end of a link cable
#[derive(Debug)]
pub struct SerialEndpoint {
    side: usize,
    wire: Arc<Mutex<Wire>>,
    state: EndpointState,
}

impl SerialEndpoint {
    /// An endpoint with nothing plugged into the other end
    pub fn unconnected() -> Self {
        Self {
            side: 0,
            wire: Arc::new(Mutex::new(Wire::default())),
            state: EndpointState::default(),
        }
    }

    /// Exchange one byte with the partner; returns the byte received
    pub fn transfer(&mut self, byte: u8) -> u8 {
        let incoming = {
            let mut wire = self.wire.lock();
            wire.lines[self.side] = Some(byte);
            wire.lines[1 - self.side].unwrap_or(LINE_DEAD)
        };
        self.state.shift_register = incoming;
        self.state.outgoing = Some(byte);
        self.state.transfers += 1;
        incoming
    }

    /// Last byte received
    pub fn shift_register(&self) -> u8 {
        self.state.shift_register
    }

    /// Number of completed transfers
    pub fn transfers(&self) -> u64 {
        self.state.transfers
    }
}

impl LinkEndpoint for SerialEndpoint {
    fn pair() -> (Self, Self) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let a = Self {
            side: 0,
            wire: Arc::clone(&wire),
            state: EndpointState::default(),
        };
        let b = Self {
            side: 1,
            wire,
            state: EndpointState::default(),
        };
        (a, b)
    }

    fn save(&self) -> Result<Memento<Self>> {
        Memento::encode(&self.state)
    }

    fn restore(&mut self, memento: &Memento<Self>) -> Result<()> {
        let state: EndpointState = memento.decode()?;
        self.wire.lock().lines[self.side] = state.outgoing;
        self.state = state;
        Ok(())
    }
}
