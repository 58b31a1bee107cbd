//! Thread-safe access to a rebase engine
//!
//! The live emulation loop appends frames while a network receiver appends
//! patches. Every operation takes the one engine lock and runs to completion,
//! so a rebase never observes a half-appended frame.

use crate::{DiagnosticSink, RebaseEngine, Result, SyncConfig};
use duplex_core::{Cartridge, Frame, Input, Machine, Memento};
use duplex_rollback_buffer::{BufferStats, Snapshot};
use parking_lot::Mutex;

/// Mutex-guarded [`RebaseEngine`], shareable through an `Arc`
pub struct StateSync<M: Machine> {
    engine: Mutex<RebaseEngine<M>>,
}

impl<M: Machine> StateSync<M> {
    pub fn new(
        primary_cartridge: Cartridge,
        secondary_cartridge: Cartridge,
        config: SyncConfig,
    ) -> Self {
        Self::from_engine(RebaseEngine::new(
            primary_cartridge,
            secondary_cartridge,
            config,
        ))
    }

    pub fn from_engine(engine: RebaseEngine<M>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    /// Replace or remove the replay observer
    pub fn set_diagnostics(&self, sink: Option<DiagnosticSink>) {
        self.engine.lock().set_diagnostics(sink);
    }

    /// See [`RebaseEngine::append_frame`]
    pub fn append_frame(
        &self,
        frame: Frame,
        local_input: Input,
        primary_state: Memento<M>,
        secondary_state: Memento<M>,
        primary_link_state: Memento<M::Link>,
        secondary_link_state: Memento<M::Link>,
    ) {
        self.engine.lock().append_frame(
            frame,
            local_input,
            primary_state,
            secondary_state,
            primary_link_state,
            secondary_link_state,
        );
    }

    pub fn append_snapshot(&self, snapshot: Snapshot<M>) {
        self.engine.lock().append_snapshot(snapshot);
    }

    pub fn append_remote_patch(&self, frame: Frame, remote_input: Input) {
        self.engine.lock().append_remote_patch(frame, remote_input);
    }

    /// Fold pending patches into history
    ///
    /// `Ok(true)` if a rebase happened, `Ok(false)` if there was nothing to do.
    pub fn rebase(&self) -> Result<bool> {
        Ok(self.engine.lock().rebase()?.is_rebased())
    }

    /// Copy of the most recent snapshot
    pub fn current_head(&self) -> Result<Snapshot<M>> {
        self.engine.lock().head().cloned()
    }

    /// Rebase, then build live machines at the resulting head
    ///
    /// Both steps happen under one lock. `Ok(None)` when nothing was pending.
    pub fn rebase_and_restore(&self) -> Result<Option<(Frame, M, M)>> {
        let mut engine = self.engine.lock();
        if !engine.rebase()?.is_rebased() {
            return Ok(None);
        }
        engine.restore_head().map(Some)
    }

    pub fn history_stats(&self) -> BufferStats {
        self.engine.lock().history_stats()
    }

    pub fn pending_patches(&self) -> usize {
        self.engine.lock().pending_patches()
    }

    pub fn config(&self) -> SyncConfig {
        self.engine.lock().config().clone()
    }
}
