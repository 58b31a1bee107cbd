//! Live link-play session
//!
//! Drives the two local machines frame by frame, records every frame into the
//! shared [`StateSync`], and re-seats the machines after remote input forces
//! a rebase.

use crate::{Result, StateSync, SyncConfig};
use duplex_core::{linked_pair, null_events, run_lockstep, Cartridge, Frame, Input, Machine};
use duplex_rollback_buffer::Snapshot;
use std::sync::Arc;

/// A running pair of linked machines plus their rollback state
pub struct LinkSession<M: Machine> {
    sync: Arc<StateSync<M>>,
    primary: M,
    secondary: M,
    frame: Frame,
    ticks_per_frame: u32,
}

impl<M: Machine> LinkSession<M> {
    /// Power on both machines at frame 0
    pub fn new(
        primary_cartridge: Cartridge,
        secondary_cartridge: Cartridge,
        config: SyncConfig,
    ) -> Result<Self> {
        let (primary, secondary) = linked_pair(
            &primary_cartridge,
            &secondary_cartridge,
            null_events(),
            null_events(),
        )?;

        log::info!(
            "Link session '{}' <-> '{}', {} frames of history",
            primary_cartridge.title(),
            secondary_cartridge.title(),
            config.retention_frames()
        );

        let ticks_per_frame = config.ticks_per_frame();
        Ok(Self {
            sync: Arc::new(StateSync::new(
                primary_cartridge,
                secondary_cartridge,
                config,
            )),
            primary,
            secondary,
            frame: 0,
            ticks_per_frame,
        })
    }

    /// Record the current frame, apply local input and run one frame
    ///
    /// Returns the new frame number.
    pub fn advance_frame(&mut self, local_input: Input) -> Result<Frame> {
        let snapshot = Snapshot::capture(
            self.frame,
            local_input.clone(),
            &self.primary,
            &self.secondary,
        )?;
        self.sync.append_snapshot(snapshot);

        self.primary.send_input(&local_input);
        run_lockstep(&mut self.primary, &mut self.secondary, self.ticks_per_frame);
        self.frame += 1;
        Ok(self.frame)
    }

    /// Queue the peer's input for `frame` and fold it in right away
    ///
    /// Returns whether the live machines were replaced.
    pub fn receive_remote_input(&mut self, frame: Frame, input: Input) -> Result<bool> {
        self.sync.append_remote_patch(frame, input);
        self.resync()
    }

    /// Rebase pending patches and continue from the rebased head
    ///
    /// Patches may also be queued through [`LinkSession::sync`] from another
    /// thread; this is where they reach the live machines.
    pub fn resync(&mut self) -> Result<bool> {
        let Some((frame, primary, secondary)) = self.sync.rebase_and_restore()? else {
            return Ok(false);
        };
        if frame != self.frame {
            log::debug!("Live frame moved from {} to {}", self.frame, frame);
        }
        self.primary = primary;
        self.secondary = secondary;
        self.frame = frame;
        Ok(true)
    }

    /// Frame about to be simulated
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Shared handle for patch producers on other threads
    pub fn sync(&self) -> Arc<StateSync<M>> {
        Arc::clone(&self.sync)
    }

    pub fn primary(&self) -> &M {
        &self.primary
    }

    pub fn secondary(&self) -> &M {
        &self.secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticSink, MachineIndex, ReplayedPress};
    use crate::test_util::{cartridges, config, TEST_TICKS};
    use duplex_core::{Button, RecordingSink, ReferenceMachine};
    use std::thread;

    type Session = LinkSession<ReferenceMachine>;

    fn session() -> Session {
        let (primary, secondary) = cartridges();
        LinkSession::new(primary, secondary, config(64)).unwrap()
    }

    fn local_input(frame: Frame) -> Input {
        match frame {
            2 => Input::press([Button::Start]),
            4 => Input::release([Button::Start]),
            _ => Input::empty(),
        }
    }

    fn run_until(session: &mut Session, frame: Frame) {
        while session.frame() < frame {
            let input = local_input(session.frame());
            session.advance_frame(input).unwrap();
        }
    }

    #[test]
    fn test_advance_records_history() {
        let mut session = session();
        assert_eq!(session.frame(), 0);
        run_until(&mut session, 6);

        let sync = session.sync();
        assert_eq!(sync.current_head().unwrap().frame(), 5);
        assert_eq!(sync.history_stats().count, 6);
        assert_eq!(session.primary().ticks(), 6 * u64::from(TEST_TICKS));
    }

    #[test]
    fn test_late_input_converges() {
        // Same remote press, delivered after two different delays
        let mut early = session();
        run_until(&mut early, 5);
        assert!(early.receive_remote_input(3, Input::press([Button::A])).unwrap());
        assert_eq!(early.frame(), 5);
        run_until(&mut early, 12);

        let mut late = session();
        run_until(&mut late, 8);
        assert!(late.receive_remote_input(3, Input::press([Button::A])).unwrap());
        assert_eq!(late.frame(), 8);
        run_until(&mut late, 12);

        let mut unpatched = session();
        run_until(&mut unpatched, 12);

        assert_eq!(early.primary().save().unwrap(), late.primary().save().unwrap());
        assert_eq!(early.secondary().save().unwrap(), late.secondary().save().unwrap());
        assert_ne!(early.secondary().save().unwrap(), unpatched.secondary().save().unwrap());
    }

    #[test]
    fn test_future_input_moves_live_frame() {
        let mut session = session();
        run_until(&mut session, 3);
        session.receive_remote_input(6, Input::press([Button::B])).unwrap();

        assert_eq!(session.frame(), 7);
        assert_eq!(session.sync().current_head().unwrap().frame(), 7);
        assert_eq!(session.advance_frame(Input::empty()).unwrap(), 8);
    }

    #[test]
    fn test_stale_input_is_fatal() {
        let (primary, secondary) = cartridges();
        let mut session: Session = LinkSession::new(primary, secondary, config(4)).unwrap();
        run_until(&mut session, 10);

        let err = session
            .receive_remote_input(1, Input::press([Button::A]))
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(session.frame(), 10);
    }

    #[test]
    fn test_patches_from_receiver_thread() {
        let mut session = session();
        let recorder = Arc::new(RecordingSink::<ReplayedPress>::new());
        let sink: DiagnosticSink = recorder.clone();
        session.sync().set_diagnostics(Some(sink));
        run_until(&mut session, 6);

        let sync = session.sync();
        thread::spawn(move || sync.append_remote_patch(4, Input::press([Button::Right])))
            .join()
            .unwrap();

        assert!(session.resync().unwrap());
        assert!(!session.resync().unwrap());
        assert!(recorder
            .events()
            .iter()
            .any(|e| e.button == Button::Right && e.machine == MachineIndex::Secondary));
    }
}
