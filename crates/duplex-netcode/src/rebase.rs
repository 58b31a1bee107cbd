//! Rebase engine
//!
//! Folds late remote input into the shared timeline of two linked machines.
//!
//! Remote input is never applied on arrival. Instead, a rebase rewinds both
//! machines to the oldest frame touched by a pending patch and re-simulates
//! forward, so the machines always see the same ordered per-frame inputs no
//! matter when those inputs physically arrived.
//!
//! ```text
//!   history:  [100] [101] [102] [103] [104] [105]          patch @102
//!                          │
//!                          ▼ restore fresh machines from 102
//!   replay:               [102]─▶[103]─▶[104]─▶[105]─▶[106]
//!                          ▲ secondary gets the patch here
//! ```

use crate::diagnostics::{machine_sink, DiagnosticSink, MachineIndex};
use crate::{Error, PatchQueue, Result, SyncConfig};
use duplex_core::{
    linked_pair, run_lockstep, Cartridge, Frame, Input, Machine, Memento,
};
use duplex_rollback_buffer::{BufferStats, HistoryBuffer, Snapshot};
use std::collections::HashMap;

/// Result of a rebase request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    /// History or pending queue was empty
    NothingToDo,
    /// The timeline was rebuilt from `base_frame`
    Rebased {
        base_frame: Frame,
        to_frame: Frame,
        /// Frames actually simulated (`to_frame - base_frame + 1`)
        replayed_frames: u64,
    },
}

impl RebaseOutcome {
    /// Whether a correction was performed
    pub fn is_rebased(&self) -> bool {
        matches!(self, RebaseOutcome::Rebased { .. })
    }
}

/// History, pending remote input and the rebase algorithm for one session
///
/// Not synchronized: see [`crate::StateSync`] for the thread-safe wrapper.
pub struct RebaseEngine<M: Machine> {
    primary_cartridge: Cartridge,
    secondary_cartridge: Cartridge,
    config: SyncConfig,
    history: HistoryBuffer<M>,
    patches: PatchQueue,
    diagnostics: Option<DiagnosticSink>,
}

impl<M: Machine> RebaseEngine<M> {
    /// Create an engine for the given pair of cartridges
    ///
    /// `primary_cartridge` is the local player's game, `secondary_cartridge`
    /// the peer's (ROM plus battery RAM as the peer sent it).
    pub fn new(
        primary_cartridge: Cartridge,
        secondary_cartridge: Cartridge,
        config: SyncConfig,
    ) -> Self {
        Self {
            history: HistoryBuffer::new(config.retention_frames()),
            patches: PatchQueue::new(),
            primary_cartridge,
            secondary_cartridge,
            config,
            diagnostics: None,
        }
    }

    /// Attach an observer for button presses replayed during rebases
    pub fn with_diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Replace or remove the replay observer
    pub fn set_diagnostics(&mut self, sink: Option<DiagnosticSink>) {
        self.diagnostics = sink;
    }

    /// Record a locally simulated frame
    ///
    /// States are those at the start of the frame, before `local_input` is
    /// applied. `frame` must be past the current head.
    pub fn append_frame(
        &mut self,
        frame: Frame,
        local_input: Input,
        primary_state: Memento<M>,
        secondary_state: Memento<M>,
        primary_link_state: Memento<M::Link>,
        secondary_link_state: Memento<M::Link>,
    ) {
        self.append_snapshot(Snapshot::new(
            frame,
            local_input,
            primary_state,
            secondary_state,
            primary_link_state,
            secondary_link_state,
        ));
    }

    /// Record an already assembled snapshot
    pub fn append_snapshot(&mut self, snapshot: Snapshot<M>) {
        self.history.push(snapshot);
    }

    /// Queue a remote input for the next rebase
    ///
    /// Any frame is accepted, including ones already in history.
    pub fn append_remote_patch(&mut self, frame: Frame, remote_input: Input) {
        self.patches.push(frame, remote_input);
    }

    /// Most recent snapshot
    pub fn head(&self) -> Result<&Snapshot<M>> {
        self.history.head().ok_or(Error::EmptyHistory)
    }

    pub fn history(&self) -> &HistoryBuffer<M> {
        &self.history
    }

    pub fn history_stats(&self) -> BufferStats {
        self.history.stats()
    }

    /// Number of remote inputs waiting for a rebase
    pub fn pending_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Rewind to the oldest patched frame and re-simulate to the newest
    ///
    /// At most `retention_frames` frames are simulated per call: patches
    /// further ahead of the base stay queued until history catches up.
    /// Returns [`RebaseOutcome::NothingToDo`] when history is empty or no
    /// queued patch is in reach. Fails with [`Error::MissingBaseFrame`] when
    /// the rewind target is no longer retained. On any error history and
    /// queue are left as they were.
    pub fn rebase(&mut self) -> Result<RebaseOutcome> {
        let (Some(head_frame), Some(oldest_patch)) = (
            self.history.head().map(Snapshot::frame),
            self.patches.oldest_frame(),
        ) else {
            log::trace!(
                "Nothing to rebase ({} frames, {} patches)",
                self.history.len(),
                self.patches.len()
            );
            return Ok(RebaseOutcome::NothingToDo);
        };

        let base_frame = oldest_patch.min(head_frame);
        let limit = self.replay_limit(base_frame, head_frame);
        let Some(newest_patch) = self.patches.newest_frame_until(limit) else {
            log::debug!(
                "{} patches are past frame {}; deferring",
                self.patches.len(),
                limit
            );
            return Ok(RebaseOutcome::NothingToDo);
        };
        let to_frame = head_frame.max(newest_patch);
        let end_frame = to_frame
            .checked_add(1)
            .ok_or(Error::FrameOverflow { frame: to_frame })?;
        log::debug!("Rebasing from {} to {}", base_frame, to_frame);

        let Some(base) = self.history.get(base_frame) else {
            let oldest = self.history.oldest().map(Snapshot::frame);
            log::error!(
                "No frame {} in history (oldest {:?}); a {}-frame window is too small for this peer",
                base_frame,
                oldest,
                self.history.capacity()
            );
            return Err(Error::MissingBaseFrame {
                frame: base_frame,
                oldest,
            });
        };

        let (mut primary, mut secondary) = self.fresh_pair(true)?;
        base.restore_into(&mut primary, &mut secondary)?;

        let local_inputs: HashMap<Frame, Input> = self
            .history
            .iter()
            .map(|s| (s.frame(), s.local_input().clone()))
            .collect();
        let remote_inputs = self.patches.inputs_by_frame();

        let ticks = self.config.ticks_per_frame();
        let mut timeline = Vec::with_capacity((end_frame - base_frame + 1) as usize);
        for frame in base_frame..=end_frame {
            let local_input = local_inputs.get(&frame).cloned().unwrap_or_default();
            timeline.push(Snapshot::capture(
                frame,
                local_input.clone(),
                &primary,
                &secondary,
            )?);

            if frame <= to_frame {
                primary.send_input(&local_input);
                if let Some(remote_input) = remote_inputs.get(&frame) {
                    log::debug!(
                        "Sending secondary input {:?} on frame {}",
                        remote_input,
                        frame
                    );
                    secondary.send_input(remote_input);
                }
                run_lockstep(&mut primary, &mut secondary, ticks);
            }
        }

        self.history.rebuild(timeline);
        self.patches.retain_after(to_frame);

        log::debug!("Rebase from {} to {} completed", base_frame, to_frame);
        Ok(RebaseOutcome::Rebased {
            base_frame,
            to_frame,
            replayed_frames: to_frame - base_frame + 1,
        })
    }

    /// Newest frame a rebase from `base_frame` may simulate
    fn replay_limit(&self, base_frame: Frame, head_frame: Frame) -> Frame {
        let window = self.history.capacity() as Frame;
        base_frame
            .saturating_add(window - 1)
            .min(Frame::MAX - 1)
            .max(head_frame)
    }

    /// Build live machines positioned at the head snapshot
    ///
    /// Returns the head frame with a freshly constructed, restored pair.
    /// Their joypad events are not forwarded to the replay observer.
    pub fn restore_head(&self) -> Result<(Frame, M, M)> {
        let head = self.head()?;
        let (mut primary, mut secondary) = self.fresh_pair(false)?;
        head.restore_into(&mut primary, &mut secondary)?;
        Ok((head.frame(), primary, secondary))
    }

    fn fresh_pair(&self, observe: bool) -> Result<(M, M)> {
        let diagnostics = if observe {
            self.diagnostics.as_ref()
        } else {
            None
        };
        let pair = linked_pair(
            &self.primary_cartridge,
            &self.secondary_cartridge,
            machine_sink(diagnostics, MachineIndex::Primary),
            machine_sink(diagnostics, MachineIndex::Secondary),
        )?;
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ReplayedPress;
    use crate::test_util::{cartridges, config, LiveRig, TEST_TICKS};
    use duplex_core::{synthetic_rom, Button, RecordingSink, ReferenceMachine};
    use std::sync::Arc;

    type Engine = RebaseEngine<ReferenceMachine>;

    fn engine(retention: usize) -> Engine {
        let (primary, secondary) = cartridges();
        RebaseEngine::new(primary, secondary, config(retention))
    }

    fn frames(engine: &Engine) -> Vec<Frame> {
        engine.history().iter().map(Snapshot::frame).collect()
    }

    /// Record frames 0..=105 with a six-frame window: history holds 100..=105
    fn engine_at_105() -> (Engine, LiveRig) {
        let mut engine = engine(6);
        let mut rig = LiveRig::new();
        for frame in 0..=105 {
            rig.record_and_advance(&mut engine, frame, Input::empty());
        }
        assert_eq!(frames(&engine), vec![100, 101, 102, 103, 104, 105]);
        (engine, rig)
    }

    #[test]
    fn test_empty_history_is_noop() {
        let mut engine = engine(10);
        assert!(matches!(engine.head(), Err(Error::EmptyHistory)));
        assert_eq!(engine.rebase().unwrap(), RebaseOutcome::NothingToDo);

        engine.append_remote_patch(3, Input::press([Button::A]));
        assert_eq!(engine.rebase().unwrap(), RebaseOutcome::NothingToDo);
        assert_eq!(engine.pending_patches(), 1);
    }

    #[test]
    fn test_empty_queue_is_noop() {
        let (mut engine, _rig) = engine_at_105();
        assert_eq!(engine.rebase().unwrap(), RebaseOutcome::NothingToDo);
        assert_eq!(frames(&engine), vec![100, 101, 102, 103, 104, 105]);
    }

    #[test]
    fn test_append_frame_from_mementos() {
        let mut engine = engine(10);
        let rig = LiveRig::new();
        engine.append_frame(
            7,
            Input::press([Button::Start]),
            rig.primary.save().unwrap(),
            rig.secondary.save().unwrap(),
            rig.primary.save_link().unwrap(),
            rig.secondary.save_link().unwrap(),
        );

        let head = engine.head().unwrap();
        assert_eq!(head.frame(), 7);
        assert_eq!(head.local_input(), &Input::press([Button::Start]));
        assert_eq!(head.primary_state(), &rig.primary.save().unwrap());
    }

    #[test]
    fn test_patched_frame_scenario() {
        let (mut engine, rig) = engine_at_105();
        let unpatched: Vec<_> = engine.history().iter().cloned().collect();
        let unpatched_106 = rig.snapshot(106);

        // What the machines would have done had the press arrived in time
        let mut truth = LiveRig::new();
        for frame in 0..=105 {
            if frame == 102 {
                truth.secondary.send_input(&Input::press([Button::A]));
            }
            truth.advance(Input::empty());
        }

        engine.append_remote_patch(102, Input::press([Button::A]));
        let outcome = engine.rebase().unwrap();

        assert_eq!(
            outcome,
            RebaseOutcome::Rebased {
                base_frame: 102,
                to_frame: 105,
                replayed_frames: 4,
            }
        );
        assert_eq!(frames(&engine), vec![102, 103, 104, 105, 106]);
        assert_eq!(engine.pending_patches(), 0);

        // Nothing diverges before the patched frame is simulated
        let rebased = engine.history();
        assert!(rebased.get(102).unwrap().same_state_as(&unpatched[2]));

        // Every later frame carries the press
        for (frame, before) in [(103, &unpatched[3]), (104, &unpatched[4]), (105, &unpatched[5])] {
            let after = rebased.get(frame).unwrap();
            assert_ne!(after.secondary_state(), before.secondary_state(), "frame {}", frame);
        }
        assert!(!engine.head().unwrap().same_state_as(&unpatched_106));
        assert!(engine.head().unwrap().same_state_as(&truth.snapshot(106)));
    }

    #[test]
    fn test_empty_patch_replays_identically() {
        let (mut engine, rig) = engine_at_105();
        let unpatched: Vec<_> = engine.history().iter().cloned().collect();

        engine.append_remote_patch(100, Input::empty());
        engine.rebase().unwrap();

        assert_eq!(frames(&engine), vec![100, 101, 102, 103, 104, 105, 106]);
        for (before, after) in unpatched.iter().zip(engine.history().iter()) {
            assert_eq!(before.frame(), after.frame());
            assert!(after.same_state_as(before), "frame {}", after.frame());
        }
        assert!(engine.head().unwrap().same_state_as(&rig.snapshot(106)));
    }

    #[test]
    fn test_local_inputs_survive_rebase() {
        let mut engine = engine(32);
        let mut rig = LiveRig::new();
        for frame in 0..10 {
            let input = if frame == 4 {
                Input::press([Button::B])
            } else if frame == 6 {
                Input::release([Button::B])
            } else {
                Input::empty()
            };
            rig.record_and_advance(&mut engine, frame, input);
        }

        engine.append_remote_patch(2, Input::empty());
        engine.rebase().unwrap();

        let history = engine.history();
        assert_eq!(history.get(4).unwrap().local_input(), &Input::press([Button::B]));
        assert_eq!(history.get(6).unwrap().local_input(), &Input::release([Button::B]));
        assert!(history.get(10).unwrap().local_input().is_empty());
        assert!(history.get(10).unwrap().same_state_as(&rig.snapshot(10)));
    }

    #[test]
    fn test_idempotent_rebase() {
        let (mut engine, _rig) = engine_at_105();
        engine.append_remote_patch(103, Input::press([Button::Up]));
        assert!(engine.rebase().unwrap().is_rebased());

        let after_first: Vec<_> = engine.history().iter().cloned().collect();
        assert_eq!(engine.rebase().unwrap(), RebaseOutcome::NothingToDo);

        let after_second: Vec<_> = engine.history().iter().cloned().collect();
        assert_eq!(after_first.len(), after_second.len());
        for (a, b) in after_first.iter().zip(after_second.iter()) {
            assert_eq!(a.frame(), b.frame());
            assert!(a.same_state_as(b));
        }
    }

    #[test]
    fn test_history_bound_and_contiguous() {
        let mut engine = engine(8);
        let mut rig = LiveRig::new();
        for frame in 0..50 {
            rig.record_and_advance(&mut engine, frame, Input::empty());
            assert!(engine.history().len() <= 8);
        }

        let recorded = frames(&engine);
        assert_eq!(recorded.len(), 8);
        assert!(recorded.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(engine.history_stats().newest_frame, 49);
    }

    #[test]
    fn test_missing_base_frame() {
        let (mut engine, _rig) = engine_at_105();
        engine.append_remote_patch(99, Input::press([Button::A]));

        let err = engine.rebase().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingBaseFrame {
                frame: 99,
                oldest: Some(100)
            }
        ));
        assert!(err.is_fatal());

        // Nothing was touched
        assert_eq!(frames(&engine), vec![100, 101, 102, 103, 104, 105]);
        assert_eq!(engine.pending_patches(), 1);
    }

    #[test]
    fn test_future_patch_extends_timeline() {
        let (mut engine, _rig) = engine_at_105();
        engine.append_remote_patch(108, Input::press([Button::Select]));

        let outcome = engine.rebase().unwrap();
        assert_eq!(
            outcome,
            RebaseOutcome::Rebased {
                base_frame: 105,
                to_frame: 108,
                replayed_frames: 4,
            }
        );
        assert_eq!(frames(&engine), vec![105, 106, 107, 108, 109]);
        assert_eq!(engine.pending_patches(), 0);
    }

    #[test]
    fn test_several_patches_one_pass() {
        let (mut engine, _rig) = engine_at_105();
        let mut truth = LiveRig::new();
        for frame in 0..=105 {
            match frame {
                101 => truth.secondary.send_input(&Input::press([Button::Left])),
                104 => truth.secondary.send_input(&Input::release([Button::Left])),
                _ => {}
            }
            truth.advance(Input::empty());
        }

        // Arrive out of order
        engine.append_remote_patch(104, Input::release([Button::Left]));
        engine.append_remote_patch(101, Input::press([Button::Left]));
        engine.rebase().unwrap();

        assert_eq!(frames(&engine).first(), Some(&101));
        assert!(engine.head().unwrap().same_state_as(&truth.snapshot(106)));
    }

    #[test]
    fn test_replayed_presses_reach_diagnostics() {
        let recorder = Arc::new(RecordingSink::<ReplayedPress>::new());
        let (primary, secondary) = cartridges();
        let mut engine: Engine =
            RebaseEngine::new(primary, secondary, config(16)).with_diagnostics(recorder.clone());

        let mut rig = LiveRig::new();
        for frame in 0..6 {
            let input = if frame == 3 {
                Input::press([Button::B])
            } else {
                Input::empty()
            };
            rig.record_and_advance(&mut engine, frame, input);
        }
        // Live recording is not observed
        assert!(recorder.is_empty());

        engine.append_remote_patch(2, Input::press([Button::A]));
        engine.rebase().unwrap();

        let ticks = u64::from(TEST_TICKS);
        assert_eq!(
            recorder.events(),
            vec![
                ReplayedPress {
                    button: Button::A,
                    tick: 2 * ticks,
                    machine: MachineIndex::Secondary,
                },
                ReplayedPress {
                    button: Button::B,
                    tick: 3 * ticks,
                    machine: MachineIndex::Primary,
                },
            ]
        );
    }

    #[test]
    fn test_restore_head() {
        let (mut engine, rig) = engine_at_105();
        engine.append_remote_patch(105, Input::empty());
        engine.rebase().unwrap();

        let (frame, primary, secondary) = engine.restore_head().unwrap();
        assert_eq!(frame, 106);
        assert_eq!(primary.save().unwrap(), rig.primary.save().unwrap());
        assert_eq!(secondary.save().unwrap(), rig.secondary.save().unwrap());
    }

    #[test]
    fn test_rebase_from_oldest_frame_keeps_base() {
        let (mut engine, _rig) = engine_at_105();
        engine.append_remote_patch(100, Input::press([Button::A]));
        engine.rebase().unwrap();

        // One over capacity until the next append
        assert_eq!(frames(&engine), vec![100, 101, 102, 103, 104, 105, 106]);

        // A second late patch for the same frame still finds its base
        engine.append_remote_patch(100, Input::press([Button::B]));
        let outcome = engine.rebase().unwrap();
        assert_eq!(
            outcome,
            RebaseOutcome::Rebased {
                base_frame: 100,
                to_frame: 106,
                replayed_frames: 7,
            }
        );
        assert_eq!(frames(&engine).first(), Some(&100));

        // The live loop taking over the head trims back to the window
        let head = engine.head().unwrap().clone();
        engine.append_snapshot(head);
        assert_eq!(engine.history().len(), 6);
    }

    #[test]
    fn test_determinism() {
        fn run() -> Engine {
            let mut engine = engine(32);
            let mut rig = LiveRig::new();
            for frame in 0..20 {
                let input = match frame {
                    3 => Input::press([Button::Start, Button::Up]),
                    9 => Input::release([Button::Up]),
                    _ => Input::empty(),
                };
                rig.record_and_advance(&mut engine, frame, input);
                if frame == 12 {
                    engine.append_remote_patch(8, Input::release([Button::B]));
                    engine.append_remote_patch(5, Input::press([Button::B]));
                    engine.rebase().unwrap();
                }
            }
            engine.append_remote_patch(17, Input::press([Button::Select]));
            engine.append_remote_patch(14, Input::press([Button::A]));
            engine.rebase().unwrap();
            engine
        }

        let first = run();
        let second = run();
        assert_eq!(frames(&first), frames(&second));
        for (a, b) in first.history().iter().zip(second.history().iter()) {
            assert!(a.same_state_as(b), "frame {}", a.frame());
            assert_eq!(a.local_input(), b.local_input());
        }
    }

    #[test]
    fn test_far_future_patch_is_deferred() {
        let mut engine = engine(6);
        let mut rig = LiveRig::new();
        for frame in 0..3 {
            rig.record_and_advance(&mut engine, frame, Input::empty());
        }

        engine.append_remote_patch(Frame::MAX, Input::press([Button::A]));
        assert_eq!(engine.rebase().unwrap(), RebaseOutcome::NothingToDo);
        assert_eq!(frames(&engine), vec![0, 1, 2]);
        assert_eq!(engine.pending_patches(), 1);
    }

    #[test]
    fn test_replay_bounded_by_window() {
        let (mut engine, _rig) = engine_at_105();
        engine.append_remote_patch(155, Input::press([Button::A]));
        engine.append_remote_patch(103, Input::press([Button::B]));

        let outcome = engine.rebase().unwrap();
        assert_eq!(
            outcome,
            RebaseOutcome::Rebased {
                base_frame: 103,
                to_frame: 105,
                replayed_frames: 3,
            }
        );
        assert_eq!(frames(&engine), vec![103, 104, 105, 106]);
        // Still waiting for history to get close enough
        assert_eq!(engine.pending_patches(), 1);
    }

    #[test]
    fn test_last_frame_overflow() {
        let mut engine = engine(6);
        let rig = LiveRig::new();
        engine.append_snapshot(rig.snapshot(Frame::MAX));
        engine.append_remote_patch(Frame::MAX, Input::press([Button::A]));

        let err = engine.rebase().unwrap_err();
        assert!(matches!(err, Error::FrameOverflow { frame: u64::MAX }));
        assert!(!err.is_fatal());
        assert_eq!(frames(&engine), vec![Frame::MAX]);
        assert_eq!(engine.pending_patches(), 1);
    }

    #[test]
    fn test_failed_restore_leaves_state() {
        let (primary, _) = cartridges();
        // No cartridge RAM: recorded secondary states do not fit
        let secondary = Cartridge::new(synthetic_rom("PLAYER TWO", 0)).unwrap();
        let mut engine: Engine = RebaseEngine::new(primary, secondary, config(8));

        let mut rig = LiveRig::new();
        for frame in 0..4 {
            rig.record_and_advance(&mut engine, frame, Input::empty());
        }
        engine.append_remote_patch(1, Input::press([Button::A]));

        let err = engine.rebase().unwrap_err();
        assert!(matches!(err, Error::Core(_)));
        assert_eq!(frames(&engine), vec![0, 1, 2, 3]);
        assert_eq!(engine.pending_patches(), 1);
    }
}
