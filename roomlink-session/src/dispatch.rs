//! Frame Dispatch Pipeline
//!
//! Decouples any number of concurrent frame producers from a single
//! consumer. Producers call [`FrameDispatcher::enqueue`], which never
//! blocks and never fails: a full per-key queue evicts its oldest entry
//! (visual freshness outweighs completeness). One spawned consumer task
//! performs all deliveries, which is what keeps the render collaborator
//! free of overlapping concurrent updates.
//!
//! The consumer enforces three flow-control rules at every tick:
//!
//! 1. a global minimum interval between any two deliveries,
//! 2. a per-key minimum interval between deliveries for the same key,
//! 3. a staleness window; frames older than it are discarded, not rendered.
//!
//! Per key, delivered sequence numbers are non-decreasing. Frames may be
//! skipped, never reordered.

use crate::config::DispatchConfig;
use crate::frame::MediaFrame;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Consumer-side delivery seam
///
/// Implemented by the collaborator that owns presentation. `deliver` is
/// invoked from the single consumer task only, one call at a time.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Render `frame` for `key`. Must mutate the render target in place
    /// rather than recreating it.
    async fn deliver(&self, key: &str, frame: MediaFrame);
}

/// Events emitted by the dispatcher for observability collaborators
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A frame failed validation and was dropped
    FrameRejected {
        /// Key the frame arrived under
        key: String,
        /// Why the frame was rejected
        reason: String,
    },
}

/// Dispatch pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames accepted into a queue
    pub enqueued: u64,
    /// Frames handed to the sink
    pub delivered: u64,
    /// Frames evicted by the drop-oldest policy
    pub dropped_capacity: u64,
    /// Frames discarded for exceeding the staleness window or for
    /// regressing behind the last delivered sequence
    pub dropped_stale: u64,
    /// Frames superseded by a newer frame delivered in the same cycle
    pub dropped_superseded: u64,
    /// Frames rejected at validation
    pub rejected: u64,
}

/// Per-key queue state
#[derive(Debug, Default)]
struct KeyQueue {
    frames: VecDeque<MediaFrame>,
    last_dispatch: Option<Instant>,
    last_sequence: Option<u64>,
}

#[derive(Debug, Default)]
struct DispatcherState {
    queues: HashMap<String, KeyQueue>,
    /// Round-robin order over keys so one busy key cannot starve others
    rotation: VecDeque<String>,
    last_global_dispatch: Option<Instant>,
    stats: DispatchStats,
}

impl DispatcherState {
    fn enqueue(&mut self, frame: MediaFrame, capacity: usize) {
        let queue = match self.queues.get_mut(&frame.key) {
            Some(q) => q,
            None => {
                self.rotation.push_back(frame.key.clone());
                self.queues.entry(frame.key.clone()).or_default()
            }
        };

        // A frame at or behind the last delivered sequence can never be
        // rendered without reordering; drop it at the door.
        if let Some(last) = queue.last_sequence {
            if frame.sequence <= last {
                trace!(
                    "Dropping regressed frame {} for {} (last delivered {})",
                    frame.sequence,
                    frame.key,
                    last
                );
                self.stats.dropped_stale += 1;
                return;
            }
        }

        if queue.frames.len() >= capacity {
            queue.frames.pop_front();
            self.stats.dropped_capacity += 1;
        }
        queue.frames.push_back(frame);
        self.stats.enqueued += 1;
    }

    /// Select the next frame eligible for delivery, honoring the global
    /// interval, per-key intervals and the staleness window.
    fn next_ready(&mut self, now: Instant, config: &DispatchConfig) -> Option<MediaFrame> {
        if let Some(last) = self.last_global_dispatch {
            if now.duration_since(last) < config.global_min_interval() {
                return None;
            }
        }

        let max_age = config.max_frame_age();
        for _ in 0..self.rotation.len() {
            let key = match self.rotation.pop_front() {
                Some(k) => k,
                None => break,
            };
            self.rotation.push_back(key.clone());

            let queue = match self.queues.get_mut(&key) {
                Some(q) => q,
                None => continue,
            };

            if let Some(last) = queue.last_dispatch {
                if now.duration_since(last) < config.per_key_min_interval() {
                    continue;
                }
            }

            // Deliver the newest admissible frame. Frames outside the
            // staleness window are discarded wherever they sit (capture
            // timestamps need not track enqueue order); anything older
            // than the delivered frame is superseded, keeping sequence
            // order monotonic.
            while let Some(frame) = queue.frames.pop_back() {
                if frame.is_stale(now, max_age) {
                    self.stats.dropped_stale += 1;
                    continue;
                }
                self.stats.dropped_superseded += queue.frames.len() as u64;
                queue.frames.clear();
                queue.last_dispatch = Some(now);
                queue.last_sequence = Some(frame.sequence);
                self.last_global_dispatch = Some(now);
                self.stats.delivered += 1;
                return Some(frame);
            }
        }

        None
    }

    /// Forget all state for `key`: queued frames, the interval gate and
    /// the sequence guard. Returns the number of discarded frames.
    fn remove_key(&mut self, key: &str) -> usize {
        let discarded = self
            .queues
            .remove(key)
            .map_or(0, |queue| queue.frames.len());
        self.rotation.retain(|k| k != key);
        discarded
    }

    fn drain(&mut self) -> usize {
        let discarded: usize = self.queues.values().map(|q| q.frames.len()).sum();
        for queue in self.queues.values_mut() {
            queue.frames.clear();
        }
        discarded
    }
}

/// Rate-limited, bounded, drop-oldest frame delivery pipeline
pub struct FrameDispatcher {
    config: DispatchConfig,
    state: Arc<Mutex<DispatcherState>>,
    event_tx: mpsc::UnboundedSender<DispatchEvent>,
    shutdown_tx: watch::Sender<bool>,
    consumer: Option<JoinHandle<()>>,
}

impl FrameDispatcher {
    /// Create a dispatcher and the receiver for its observability events
    pub fn new(config: DispatchConfig) -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        (
            Self {
                config,
                state: Arc::new(Mutex::new(DispatcherState::default())),
                event_tx,
                shutdown_tx,
                consumer: None,
            },
            event_rx,
        )
    }

    /// Enqueue a frame for delivery. Non-blocking; completes in bounded
    /// time regardless of consumer progress.
    ///
    /// An empty payload is rejected with a [`DispatchEvent::FrameRejected`]
    /// signal. A full per-key queue silently evicts its oldest entry.
    pub fn enqueue(&self, frame: MediaFrame) {
        if frame.payload.is_empty() {
            debug!("Rejecting empty frame for {}", frame.key);
            {
                let mut state = self.state.lock().expect("dispatcher lock poisoned");
                state.stats.rejected += 1;
            }
            let _ = self.event_tx.send(DispatchEvent::FrameRejected {
                key: frame.key,
                reason: "empty payload".to_string(),
            });
            return;
        }

        let mut state = self.state.lock().expect("dispatcher lock poisoned");
        state.enqueue(frame, self.config.queue_capacity_per_key);
    }

    /// Drop all per-key state for `key`.
    ///
    /// Called when the participant behind the key leaves, so a rejoining
    /// producer that restarts its sequence numbering is not tripped up by
    /// the previous incarnation's sequence guard.
    pub fn remove_key(&self, key: &str) {
        let mut state = self.state.lock().expect("dispatcher lock poisoned");
        let discarded = state.remove_key(key);
        if discarded > 0 {
            debug!("Removed key {}, {} queued frames discarded", key, discarded);
        }
    }

    /// Spawn the consumer loop delivering into `sink`
    pub fn start(&mut self, sink: Arc<dyn FrameSink>) {
        if self.consumer.is_some() {
            warn!("Dispatcher consumer already running");
            return;
        }

        let state = self.state.clone();
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(config.global_min_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let frame = {
                    let mut state = state.lock().expect("dispatcher lock poisoned");
                    state.next_ready(Instant::now(), &config)
                };

                if let Some(frame) = frame {
                    let key = frame.key.clone();
                    trace!("Delivering frame {} for {}", frame.sequence, key);
                    sink.deliver(&key, frame).await;
                }
            }

            let discarded = {
                let mut state = state.lock().expect("dispatcher lock poisoned");
                state.drain()
            };
            info!("Dispatcher consumer stopped, {} queued frames discarded", discarded);
        });

        self.consumer = Some(handle);
        debug!(
            "Dispatcher consumer started (global {:?}, per-key {:?})",
            self.config.global_min_interval(),
            self.config.per_key_min_interval()
        );
    }

    /// Stop the consumer loop; queued frames are discarded undelivered
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.consumer.take() {
            let _ = handle.await;
        } else {
            // Never started; drain directly
            let mut state = self.state.lock().expect("dispatcher lock poisoned");
            state.drain();
        }
    }

    /// Snapshot of pipeline counters
    pub fn stats(&self) -> DispatchStats {
        let state = self.state.lock().expect("dispatcher lock poisoned");
        state.stats
    }

    /// Number of frames currently queued for `key` (test and diagnostics aid)
    pub fn queued_len(&self, key: &str) -> usize {
        let state = self.state.lock().expect("dispatcher lock poisoned");
        state.queues.get(key).map_or(0, |q| q.frames.len())
    }

    /// Whether the consumer loop is running
    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }
}
