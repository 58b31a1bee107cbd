//! Duplex Rollback Buffer - Bounded snapshot history for linked machines
//!
//! This crate provides the history half of the rollback engine: one immutable
//! [`Snapshot`] per simulated frame, kept in a bounded, time-ordered buffer.
//!
//! # Features
//!
//! - **Bounded memory**: Fixed retention window, oldest frames evicted first
//! - **O(1) append**: Constant time to record a new frame
//! - **Cheap snapshots**: Captures share their bytes, cloning is O(1)
//! - **Ordered**: Frames strictly increase, the last entry is the head
//!
//! # Example
//!
//! ```rust
//! use duplex_core::{
//!     linked_pair, null_events, synthetic_rom, Cartridge, Input, Machine, ReferenceMachine,
//! };
//! use duplex_rollback_buffer::{HistoryBuffer, Snapshot};
//!
//! let cart = Cartridge::new(synthetic_rom("DEMO", 0)).unwrap();
//! let (primary, secondary) =
//!     linked_pair::<ReferenceMachine>(&cart, &cart, null_events(), null_events()).unwrap();
//!
//! // Keep 300 frames (~5 seconds) of history
//! let mut history = HistoryBuffer::new(300);
//! history.push(Snapshot::capture(0, Input::empty(), &primary, &secondary).unwrap());
//!
//! assert_eq!(history.head().map(|s| s.frame()), Some(0));
//! ```

use duplex_core::{Frame, Input, Machine, Memento, Result};
use std::collections::VecDeque;
use std::fmt;

/// Captured state of both linked machines at the start of one frame
///
/// Immutable once constructed.
pub struct Snapshot<M: Machine> {
    frame: Frame,
    local_input: Input,
    primary_state: Memento<M>,
    secondary_state: Memento<M>,
    primary_link_state: Memento<M::Link>,
    secondary_link_state: Memento<M::Link>,
}

impl<M: Machine> Snapshot<M> {
    /// Create a snapshot from already captured states
    pub fn new(
        frame: Frame,
        local_input: Input,
        primary_state: Memento<M>,
        secondary_state: Memento<M>,
        primary_link_state: Memento<M::Link>,
        secondary_link_state: Memento<M::Link>,
    ) -> Self {
        Self {
            frame,
            local_input,
            primary_state,
            secondary_state,
            primary_link_state,
            secondary_link_state,
        }
    }

    /// Capture the current state of two linked machines
    pub fn capture(frame: Frame, local_input: Input, primary: &M, secondary: &M) -> Result<Self> {
        Ok(Self::new(
            frame,
            local_input,
            primary.save()?,
            secondary.save()?,
            primary.save_link()?,
            secondary.save_link()?,
        ))
    }

    /// Frame this snapshot was taken at
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Input the local player issued on this frame
    pub fn local_input(&self) -> &Input {
        &self.local_input
    }

    pub fn primary_state(&self) -> &Memento<M> {
        &self.primary_state
    }

    pub fn secondary_state(&self) -> &Memento<M> {
        &self.secondary_state
    }

    pub fn primary_link_state(&self) -> &Memento<M::Link> {
        &self.primary_link_state
    }

    pub fn secondary_link_state(&self) -> &Memento<M::Link> {
        &self.secondary_link_state
    }

    /// Restore both machines and both link endpoints from this snapshot
    ///
    /// The machines must be freshly constructed and initialized with a
    /// freshly paired set of endpoints.
    pub fn restore_into(&self, primary: &mut M, secondary: &mut M) -> Result<()> {
        primary.restore(&self.primary_state)?;
        secondary.restore(&self.secondary_state)?;
        primary.restore_link(&self.primary_link_state)?;
        secondary.restore_link(&self.secondary_link_state)?;
        Ok(())
    }

    /// Check that all four captures are byte-identical to another snapshot's
    pub fn same_state_as(&self, other: &Self) -> bool {
        self.primary_state == other.primary_state
            && self.secondary_state == other.secondary_state
            && self.primary_link_state == other.primary_link_state
            && self.secondary_link_state == other.secondary_link_state
    }
}

impl<M: Machine> Clone for Snapshot<M> {
    fn clone(&self) -> Self {
        Self {
            frame: self.frame,
            local_input: self.local_input.clone(),
            primary_state: self.primary_state.clone(),
            secondary_state: self.secondary_state.clone(),
            primary_link_state: self.primary_link_state.clone(),
            secondary_link_state: self.secondary_link_state.clone(),
        }
    }
}

impl<M: Machine> fmt::Debug for Snapshot<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("frame", &self.frame)
            .field("local_input", &self.local_input)
            .field("primary_state", &self.primary_state)
            .field("secondary_state", &self.secondary_state)
            .finish_non_exhaustive()
    }
}

/// A bounded history of snapshots, oldest first
///
/// Optimized for rollback where only the last few seconds matter.
/// Older snapshots are evicted once the buffer is full.
pub struct HistoryBuffer<M: Machine> {
    snapshots: VecDeque<Snapshot<M>>,
    capacity: usize,
}

impl<M: Machine> HistoryBuffer<M> {
    /// Create a new history with the given retention window
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of frames to retain (300 = 5 seconds at 60fps)
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest ones beyond capacity
    ///
    /// Frames must increase. A snapshot for the head's own frame replaces the
    /// head: this is how the live loop takes over the provisional head a
    /// rebase leaves behind. An older frame discards everything from that
    /// frame on before appending.
    pub fn push(&mut self, snapshot: Snapshot<M>) {
        if let Some(head) = self.snapshots.back() {
            if snapshot.frame < head.frame {
                log::warn!(
                    "Frame {} appended behind head {}; dropping the newer frames",
                    snapshot.frame,
                    head.frame
                );
            }
            if snapshot.frame <= head.frame {
                let keep = self
                    .snapshots
                    .iter()
                    .take_while(|s| s.frame < snapshot.frame)
                    .count();
                self.snapshots.truncate(keep);
            }
        }

        self.snapshots.push_back(snapshot);

        while self.snapshots.len() > self.capacity {
            if let Some(evicted) = self.snapshots.pop_front() {
                log::trace!("Evicted frame {} from history", evicted.frame);
            }
        }
    }

    /// Most recent snapshot
    pub fn head(&self) -> Option<&Snapshot<M>> {
        self.snapshots.back()
    }

    /// Oldest retained snapshot
    pub fn oldest(&self) -> Option<&Snapshot<M>> {
        self.snapshots.front()
    }

    /// Snapshot for exactly the given frame
    pub fn get(&self, frame: Frame) -> Option<&Snapshot<M>> {
        let oldest = self.snapshots.front()?.frame;
        // Frames are contiguous in normal operation; try the direct slot first
        if let Some(index) = frame.checked_sub(oldest) {
            if let Some(s) = self.snapshots.get(index as usize) {
                if s.frame == frame {
                    return Some(s);
                }
            }
        }
        self.snapshots.iter().find(|s| s.frame == frame)
    }

    /// All snapshots, oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<M>> {
        self.snapshots.iter()
    }

    /// Oldest and newest retained frames
    pub fn frame_range(&self) -> Option<(Frame, Frame)> {
        match (self.snapshots.front(), self.snapshots.back()) {
            (Some(oldest), Some(newest)) => Some((oldest.frame, newest.frame)),
            _ => None,
        }
    }

    /// Replace the whole history with a rebuilt timeline, oldest first
    ///
    /// No eviction happens here: a replay may leave one frame more than
    /// `capacity` (base through `to_frame + 1`). The excess goes on the next
    /// [`push`](Self::push).
    pub fn rebuild(&mut self, snapshots: impl IntoIterator<Item = Snapshot<M>>) {
        self.snapshots.clear();
        self.snapshots.extend(snapshots);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> BufferStats {
        let (oldest, newest) = self.frame_range().unwrap_or((0, 0));
        BufferStats {
            capacity: self.capacity,
            count: self.snapshots.len(),
            oldest_frame: oldest,
            newest_frame: newest,
        }
    }
}

impl<M: Machine> fmt::Debug for HistoryBuffer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("capacity", &self.capacity)
            .field("frames", &self.frame_range())
            .finish()
    }
}

/// Statistics about the history buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored snapshots
    pub count: usize,
    /// Oldest frame in the buffer
    pub oldest_frame: Frame,
    /// Newest frame in the buffer
    pub newest_frame: Frame,
}

impl BufferStats {
    /// Frames between oldest and newest
    pub fn frame_span(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.newest_frame - self.oldest_frame
        }
    }

    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}
