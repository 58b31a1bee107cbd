//! Shared fixtures for the netcode tests

use crate::{RebaseEngine, SyncConfig};
use duplex_core::{
    linked_pair, null_events, run_lockstep, synthetic_rom, Cartridge, Frame, Input, Machine,
    ReferenceMachine,
};
use duplex_rollback_buffer::Snapshot;

/// Short frames keep replays fast while still crossing serial exchanges
pub(crate) const TEST_TICKS: u32 = 2_048;

pub(crate) fn cartridges() -> (Cartridge, Cartridge) {
    let primary = Cartridge::new(synthetic_rom("PLAYER ONE", 2)).unwrap();
    let secondary =
        Cartridge::with_battery(synthetic_rom("PLAYER TWO", 2), vec![0x5Au8; 64]).unwrap();
    (primary, secondary)
}

pub(crate) fn config(retention: usize) -> SyncConfig {
    SyncConfig::default()
        .with_retention_frames(retention)
        .with_ticks_per_frame(TEST_TICKS)
}

/// A linked pair driven frame by frame without any correction
pub(crate) struct LiveRig {
    pub primary: ReferenceMachine,
    pub secondary: ReferenceMachine,
}

impl LiveRig {
    pub fn new() -> Self {
        let (primary, secondary) = cartridges();
        let (primary, secondary) =
            linked_pair(&primary, &secondary, null_events(), null_events()).unwrap();
        Self { primary, secondary }
    }

    pub fn advance(&mut self, local_input: Input) {
        self.primary.send_input(&local_input);
        run_lockstep(&mut self.primary, &mut self.secondary, TEST_TICKS);
    }

    pub fn snapshot(&self, frame: Frame) -> Snapshot<ReferenceMachine> {
        Snapshot::capture(frame, Input::empty(), &self.primary, &self.secondary).unwrap()
    }

    pub fn record_and_advance(
        &mut self,
        engine: &mut RebaseEngine<ReferenceMachine>,
        frame: Frame,
        local_input: Input,
    ) {
        let snapshot =
            Snapshot::capture(frame, local_input.clone(), &self.primary, &self.secondary).unwrap();
        engine.append_snapshot(snapshot);
        self.advance(local_input);
    }
}
