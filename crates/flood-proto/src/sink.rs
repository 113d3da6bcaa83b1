//! Event sinks.
//!
//! The gossip node and the orchestrator emit events through an [`EventSink`]
//! rather than writing to stdout directly, so tests can capture the stream
//! in memory.

use std::io::Write;

use parking_lot::Mutex;

use crate::events::GossipEvent;

/// Destination for structured experiment events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn emit(&self, event: &GossipEvent);
}

/// Writes each event as one JSON line on stdout.
///
/// This is the production sink; downstream latency analysis consumes the
/// process's stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    /// Create a stdout sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for StdoutSink {
    fn emit(&self, event: &GossipEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            // A full pipe or closed stdout must not take the node down.
            let _ = writeln!(handle, "{json}");
            let _ = handle.flush();
        }
    }
}

/// Collects events in memory; test-only observability.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<GossipEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<GossipEvent> {
        self.events.lock().clone()
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &GossipEvent) {
        self.events.lock().push(event.clone());
    }
}
