//! Event sinks
//!
//! Machines report observable events (button presses with their tick) to a
//! sink handed to them at initialization. Sinks are observers only: nothing
//! posted to a sink feeds back into emulation.

use parking_lot::Mutex;
use std::sync::Arc;

/// Receiver of events of type `E`
///
/// Any `Fn(E) + Send + Sync` closure is a sink.
pub trait EventSink<E>: Send + Sync {
    fn post(&self, event: E);
}

impl<E, F> EventSink<E> for F
where
    F: Fn(E) + Send + Sync,
{
    fn post(&self, event: E) {
        self(event)
    }
}

/// Shared, type-erased sink handle
pub type SharedSink<E> = Arc<dyn EventSink<E>>;

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<E> EventSink<E> for NullSink {
    fn post(&self, _event: E) {}
}

/// Sink that keeps every event in memory, in posting order
#[derive(Debug, Default)]
pub struct RecordingSink<E> {
    events: Mutex<Vec<E>>,
}

impl<E: Clone> RecordingSink<E> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<E: Send> EventSink<E> for RecordingSink<E> {
    fn post(&self, event: E) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sink: SharedSink<u32> = Arc::new(move |n: u32| {
            counter.fetch_add(n as usize, Ordering::SeqCst);
        });

        sink.post(2);
        sink.post(3);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.post("a");
        sink.post("b");
        assert_eq!(sink.events(), vec!["a", "b"]);
        assert_eq!(sink.len(), 2);
        assert!(!sink.is_empty());
    }
}
