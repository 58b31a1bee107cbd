//! Emulated machine and link endpoint abstractions
//!
//! The rollback engine treats both as black boxes. It only needs to build a
//! fresh machine from a cartridge, wire it to a sink and an endpoint, step it
//! one tick at a time, feed it button events, and capture or restore its
//! complete state.
//!
//! Restoration is always construct-then-restore: a memento is applied to a
//! freshly initialized instance, never to one that has been running.

use crate::button::{Button, ButtonEvent, Input};
use crate::cartridge::Cartridge;
use crate::memento::Memento;
use crate::sink::SharedSink;
use crate::time::Tick;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Emitted by a machine whenever its joypad registers a button press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoypadPressEvent {
    pub button: Button,
    /// Machine tick at which the press was registered
    pub tick: Tick,
}

/// One end of a serial link cable
pub trait LinkEndpoint: Sized + Send {
    /// Create two endpoints connected to each other
    fn pair() -> (Self, Self);

    /// Capture this endpoint's state
    fn save(&self) -> Result<Memento<Self>>;

    /// Restore a previously captured state
    fn restore(&mut self, memento: &Memento<Self>) -> Result<()>;
}

/// An emulated handheld
pub trait Machine: Sized + Send {
    /// Link endpoint type this machine plugs into
    type Link: LinkEndpoint;

    /// Build a powered-on machine with the given cartridge inserted
    fn from_cartridge(cartridge: &Cartridge) -> Result<Self>;

    /// Attach the event sink and link endpoint
    fn init(&mut self, events: SharedSink<JoypadPressEvent>, link: Self::Link);

    /// Advance exactly one tick
    fn tick(&mut self);

    /// Deliver a button transition to the joypad
    fn button_event(&mut self, event: ButtonEvent);

    /// Deliver a whole frame's input: presses, then releases
    fn send_input(&mut self, input: &Input) {
        for event in input.events() {
            self.button_event(event);
        }
    }

    /// Run `ticks` ticks
    fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Capture the complete machine state
    fn save(&self) -> Result<Memento<Self>>;

    /// Restore a previously captured state
    fn restore(&mut self, memento: &Memento<Self>) -> Result<()>;

    /// Attached link endpoint, if `init` has been called
    fn link(&self) -> Option<&Self::Link>;

    /// Mutable access to the attached link endpoint
    fn link_mut(&mut self) -> Option<&mut Self::Link>;

    /// Capture the attached link endpoint's state
    fn save_link(&self) -> Result<Memento<Self::Link>> {
        self.link().ok_or_else(not_linked)?.save()
    }

    /// Restore the attached link endpoint's state
    fn restore_link(&mut self, memento: &Memento<Self::Link>) -> Result<()> {
        self.link_mut().ok_or_else(not_linked)?.restore(memento)
    }
}

fn not_linked() -> Error {
    Error::Machine("no link endpoint attached; call init first".to_string())
}

/// Build a pair of machines connected by a fresh link cable
///
/// `primary_events` and `secondary_events` receive each machine's joypad events.
pub fn linked_pair<M: Machine>(
    primary: &Cartridge,
    secondary: &Cartridge,
    primary_events: SharedSink<JoypadPressEvent>,
    secondary_events: SharedSink<JoypadPressEvent>,
) -> Result<(M, M)> {
    let (primary_link, secondary_link) = M::Link::pair();

    let mut primary_machine = M::from_cartridge(primary)?;
    let mut secondary_machine = M::from_cartridge(secondary)?;
    primary_machine.init(primary_events, primary_link);
    secondary_machine.init(secondary_events, secondary_link);

    Ok((primary_machine, secondary_machine))
}

/// Advance two linked machines in lock-step, primary first on every tick
pub fn run_lockstep<M: Machine>(primary: &mut M, secondary: &mut M, ticks: u32) {
    for _ in 0..ticks {
        primary.tick();
        secondary.tick();
    }
}
