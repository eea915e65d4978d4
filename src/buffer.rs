use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// How often a blocked reader wakes up to look at the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Ring buffer for audio sample streaming. When full, the oldest samples are
/// overwritten so readers always see the most recent audio.
pub struct RingBuffer {
    data: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            write_pos: 0,
            read_pos: 0,
            len: 0,
        }
    }

    /// Returns how many old samples were dropped to make room.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let capacity = self.data.len();
        if capacity == 0 {
            return samples.len();
        }

        let mut dropped = 0;
        for &sample in samples {
            self.data[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % capacity;
            if self.len == capacity {
                self.read_pos = (self.read_pos + 1) % capacity;
                dropped += 1;
            } else {
                self.len += 1;
            }
        }
        dropped
    }

    pub fn pop(&mut self, out: &mut [f32]) -> usize {
        let to_read = out.len().min(self.len);
        let capacity = self.data.len();

        for sample in out.iter_mut().take(to_read) {
            *sample = self.data[self.read_pos];
            self.read_pos = (self.read_pos + 1) % capacity;
        }
        self.len -= to_read;
        to_read
    }

    pub fn available(&self) -> usize {
        self.len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRead {
    Ready,
    Cancelled,
}

struct QueueState {
    ring: RingBuffer,
    failure: Option<String>,
}

/// Hands fixed-size sample blocks from the capture callback to the render loop.
pub struct SampleQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ring: RingBuffer::new(capacity),
                failure: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Producer side; never blocks for long so it is safe in an audio callback.
    pub fn push(&self, samples: &[f32]) -> usize {
        let dropped = match self.state.lock() {
            Ok(mut state) => state.ring.push(samples),
            Err(_) => return 0,
        };
        self.ready.notify_one();
        dropped
    }

    /// Records a stream failure; the next read reports it.
    pub fn fail(&self, message: String) {
        if let Ok(mut state) = self.state.lock() {
            state.failure.get_or_insert(message);
        }
        self.ready.notify_one();
    }

    /// Blocks until `out` can be filled completely, a failure is recorded, or
    /// `shutdown` is set. There is no deadline on the wait itself.
    pub fn read_block(&self, out: &mut [f32], shutdown: &AtomicBool) -> Result<BlockRead> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Capture("sample queue lock poisoned".to_string()))?;
        loop {
            if shutdown.load(Ordering::SeqCst) {
                return Ok(BlockRead::Cancelled);
            }
            if let Some(message) = &state.failure {
                return Err(Error::Capture(message.clone()));
            }
            if state.ring.available() >= out.len() {
                state.ring.pop(out);
                return Ok(BlockRead::Ready);
            }
            state = self
                .ready
                .wait_timeout(state, SHUTDOWN_POLL)
                .map_err(|_| Error::Capture("sample queue lock poisoned".to_string()))?
                .0;
        }
    }
}
