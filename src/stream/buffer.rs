//! The bounded block buffer between the ingest task and the consumer.
//!
//! A single-producer / single-consumer rendezvous: the producer appends
//! decoded blocks, the consumer takes the entire buffer contents in one
//! handoff. A handoff happens when any of these fires:
//!
//! 1. buffered bytes reach `min_bytes`;
//! 2. `max_idle_time` passes without a new chunk while the buffer holds
//!    data;
//! 3. `max_wait_time` passes since the consumer's pull while the buffer
//!    holds data;
//! 4. the producer marks the buffer ready because its HTTP response ended.
//!
//! The producer is suspended whenever buffered bytes reach `max_bytes` and
//! resumes once the consumer has taken the buffer.

use std::sync::{Arc, Mutex};

use tokio::{
    sync::Notify,
    time::{Duration, Instant, sleep_until},
};

use crate::{PortalError, block::Block};

pub(crate) struct BlockBuffer;

impl BlockBuffer {
    /// Creates the producer/consumer handle pair of a new, empty buffer.
    pub fn new(
        min_bytes: usize,
        max_bytes: usize,
        max_idle_time: Duration,
        max_wait_time: Duration,
    ) -> (BufferWriter, BufferReader) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                blocks: Vec::new(),
                bytes: 0,
                ready: false,
                last_chunk_at: None,
                phase: Phase::Filling,
            }),
            produced: Notify::new(),
            consumed: Notify::new(),
        });
        (
            BufferWriter { shared: Arc::clone(&shared), min_bytes, max_bytes },
            BufferReader { shared, max_idle_time, max_wait_time },
        )
    }
}

struct Shared {
    state: Mutex<State>,
    /// Signalled by the producer whenever the state changed.
    produced: Notify,
    /// Signalled by the consumer after each handoff.
    consumed: Notify,
}

struct State {
    blocks: Vec<Block>,
    bytes: usize,
    ready: bool,
    last_chunk_at: Option<Instant>,
    phase: Phase,
}

enum Phase {
    Filling,
    Closed,
    /// Holds the error until the consumer's next pull collects it.
    Failed(Option<PortalError>),
}

pub(crate) struct BufferWriter {
    shared: Arc<Shared>,
    min_bytes: usize,
    max_bytes: usize,
}

impl BufferWriter {
    /// Appends a decoded block, accounting `line_bytes` of wire length.
    ///
    /// Returns only once the buffer is below the backpressure threshold
    /// again; cancel by dropping the future.
    pub async fn push(&self, block: Block, line_bytes: usize) {
        {
            let mut state = self.shared.state.lock().expect("buffer lock poisoned");
            state.blocks.push(block);
            state.bytes += line_bytes;
            state.last_chunk_at = Some(Instant::now());
            if state.bytes >= self.min_bytes {
                state.ready = true;
            }
        }
        self.shared.produced.notify_one();

        loop {
            let notified = self.shared.consumed.notified();
            {
                let state = self.shared.state.lock().expect("buffer lock poisoned");
                if state.bytes < self.max_bytes || !matches!(state.phase, Phase::Filling) {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Forces a handoff of whatever the buffer holds; used when an HTTP
    /// response ends between requests.
    pub fn mark_ready(&self) {
        {
            let mut state = self.shared.state.lock().expect("buffer lock poisoned");
            if state.blocks.is_empty() {
                return;
            }
            state.ready = true;
        }
        self.shared.produced.notify_one();
    }

    /// Ends the stream. Buffered blocks are still delivered; afterwards the
    /// consumer observes end-of-stream.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock().expect("buffer lock poisoned");
            if matches!(state.phase, Phase::Filling) {
                state.phase = Phase::Closed;
            }
        }
        self.shared.produced.notify_one();
    }

    /// Fails the stream. The error is delivered on the consumer's next
    /// pull, after which the stream is closed.
    pub fn fail(&self, error: PortalError) {
        {
            let mut state = self.shared.state.lock().expect("buffer lock poisoned");
            if matches!(state.phase, Phase::Filling) {
                state.phase = Phase::Failed(Some(error));
            }
        }
        self.shared.produced.notify_one();
    }
}

pub(crate) struct BufferReader {
    shared: Arc<Shared>,
    max_idle_time: Duration,
    max_wait_time: Duration,
}

impl BufferReader {
    /// Waits for the next handoff.
    ///
    /// Returns `None` at end of stream, `Some(Err(_))` exactly once when
    /// the producer failed.
    pub async fn take(&self) -> Option<Result<Vec<Block>, PortalError>> {
        let pulled_at = Instant::now();
        let wait_deadline = pulled_at + self.max_wait_time;

        loop {
            let notified = self.shared.produced.notified();
            let deadline = {
                let mut state = self.shared.state.lock().expect("buffer lock poisoned");
                match &mut state.phase {
                    Phase::Failed(error) => {
                        let error = error.take();
                        state.phase = Phase::Closed;
                        // an already-collected failure reads as end of stream
                        return error.map(Err);
                    }
                    Phase::Closed => {
                        if state.blocks.is_empty() {
                            return None;
                        }
                        return Some(Ok(Self::drain(&mut state, &self.shared.consumed)));
                    }
                    Phase::Filling => {
                        if state.ready {
                            return Some(Ok(Self::drain(&mut state, &self.shared.consumed)));
                        }
                        if state.blocks.is_empty() {
                            None
                        } else {
                            let idle_deadline =
                                state.last_chunk_at.map(|at| at + self.max_idle_time);
                            Some(idle_deadline.map_or(wait_deadline, |d| d.min(wait_deadline)))
                        }
                    }
                }
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = notified => {}
                        () = sleep_until(deadline) => {
                            let mut state =
                                self.shared.state.lock().expect("buffer lock poisoned");
                            if !state.blocks.is_empty() {
                                return Some(Ok(Self::drain(&mut state, &self.shared.consumed)));
                            }
                        }
                    }
                }
                None => notified.await,
            }
        }
    }

    fn drain(state: &mut State, consumed: &Notify) -> Vec<Block> {
        let blocks = std::mem::take(&mut state.blocks);
        state.bytes = 0;
        state.ready = false;
        state.last_chunk_at = None;
        consumed.notify_one();
        blocks
    }
}
