//! Debounced edge counting for the rain gauge and anemometer switches.
//!
//! Hardware edge events arrive on an mpsc channel and are counted into an
//! atomic integer. The aggregator reads and clears the count with a single
//! atomic swap, so an edge that lands on a window boundary is counted in
//! exactly one window.

use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

const EVENT_QUEUE_DEPTH: usize = 64;

/// A single switch transition reported by an edge source
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvent {
    pub at: Instant,
}

impl EdgeEvent {
    pub fn now() -> Self {
        Self { at: Instant::now() }
    }
}

/// Pulse counter owned by one hardware channel
#[derive(Debug)]
pub struct EdgeCounter {
    name: &'static str,
    count: Arc<AtomicU64>,
    listener: Option<JoinHandle<()>>,
}

impl EdgeCounter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            count: Arc::new(AtomicU64::new(0)),
            listener: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current accumulated count, without clearing it
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Read and clear the count in one step
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Edge handler that increments this counter
    pub fn handler(&self, debounce: Duration) -> EdgeHandler {
        EdgeHandler {
            count: Arc::clone(&self.count),
            debounce,
            last_edge: None,
        }
    }

    /// Start counting events from a channel; returns the sender for the edge source
    ///
    /// Replaces any previous listener.
    pub fn listen(&mut self, debounce: Duration) -> mpsc::Sender<EdgeEvent> {
        let (tx, mut rx) = mpsc::channel::<EdgeEvent>(EVENT_QUEUE_DEPTH);
        let mut handler = self.handler(debounce);
        let name = self.name;

        if let Some(previous) = self.listener.take() {
            previous.abort();
        }

        self.listener = Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !handler.on_edge(event.at) {
                    trace!("{}: edge suppressed by debounce", name);
                }
            }
            debug!("{}: edge source closed", name);
        }));

        tx
    }

    /// True when a listener was started and has since exited
    pub fn listener_stopped(&self) -> bool {
        self.listener
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for EdgeCounter {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Increments a shared counter once per debounced edge
///
/// An edge is accepted when at least `debounce` has passed since the last
/// accepted edge.
#[derive(Debug)]
pub struct EdgeHandler {
    count: Arc<AtomicU64>,
    debounce: Duration,
    last_edge: Option<Instant>,
}

impl EdgeHandler {
    /// Returns whether the edge was counted
    pub fn on_edge(&mut self, at: Instant) -> bool {
        if let Some(last) = self.last_edge {
            if at.saturating_duration_since(last) < self.debounce {
                return false;
            }
        }
        self.last_edge = Some(at);
        self.count.fetch_add(1, Ordering::AcqRel);
        true
    }
}
