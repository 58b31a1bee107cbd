//! Pending remote input
//!
//! Remote-player input arrives out of band, possibly late and out of order.
//! It is not applied on arrival: each message becomes a [`Patch`] in the
//! [`PatchQueue`] until the next rebase folds it into the timeline.

use duplex_core::{Frame, Input};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A remote input waiting to be folded into the timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// The frame this input applies to
    pub frame: Frame,
    /// The remote player's button transitions on that frame
    pub remote_input: Input,
}

impl Patch {
    pub fn new(frame: Frame, remote_input: Input) -> Self {
        Self {
            frame,
            remote_input,
        }
    }
}

/// Append-only queue of patches, in arrival order
///
/// Frames may be older than, within, or newer than the current history.
/// There is no eviction: a rebase takes every patch it can reach and leaves
/// only those too far ahead of it.
#[derive(Debug, Default)]
pub struct PatchQueue {
    patches: Vec<Patch>,
}

impl PatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a remote input, unconditionally
    pub fn push(&mut self, frame: Frame, remote_input: Input) {
        self.patches.push(Patch::new(frame, remote_input));
    }

    /// Earliest frame any pending patch applies to
    pub fn oldest_frame(&self) -> Option<Frame> {
        self.patches.iter().map(|p| p.frame).min()
    }

    /// Latest patched frame not past `limit`
    pub fn newest_frame_until(&self, limit: Frame) -> Option<Frame> {
        self.patches
            .iter()
            .map(|p| p.frame)
            .filter(|frame| *frame <= limit)
            .max()
    }

    /// Remote input per frame; when a frame was patched twice the first arrival wins
    pub fn inputs_by_frame(&self) -> HashMap<Frame, Input> {
        let mut inputs = HashMap::with_capacity(self.patches.len());
        for patch in &self.patches {
            inputs
                .entry(patch.frame)
                .or_insert_with(|| patch.remote_input.clone());
        }
        inputs
    }

    /// Drop every patch up to and including `frame`
    pub fn retain_after(&mut self, frame: Frame) {
        self.patches.retain(|p| p.frame > frame);
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}
