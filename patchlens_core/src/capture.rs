//! Bounded live capture of execution frames for the attached method.
//!
//! Only one method is attached at a time. Every access to the buffer goes
//! through a single lock, held only for the copy or insert.

use std::collections::VecDeque;

use parking_lot::Mutex;
use patchlens_api::ExecutionFrame;
use tracing::{debug, info};

/// Result of offering a frame to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame stored (possibly evicting the oldest one).
    Accepted,
    /// Nothing is attached; the frame was dropped.
    NotAttached,
    /// A different method is attached; the frame was dropped.
    WrongTarget,
}

#[derive(Debug)]
struct CaptureState {
    attached: Option<String>,
    frames: VecDeque<ExecutionFrame>,
    evicted: u64,
}

/// Fixed-capacity ring buffer of frames for one attached method.
#[derive(Debug)]
pub struct CaptureStore {
    capacity: usize,
    state: Mutex<CaptureState>,
}

impl CaptureStore {
    /// Store holding at most `capacity` frames (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(CaptureState {
                attached: None,
                frames: VecDeque::with_capacity(capacity),
                evicted: 0,
            }),
        }
    }

    /// Maximum number of buffered frames.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bind the store to `method`.
    ///
    /// Attaching to a different method detaches the previous one and clears
    /// the buffer; re-attaching the same method keeps it. Returns the method
    /// that was replaced, if any.
    pub fn attach(&self, method: &str) -> Option<String> {
        let mut state = self.state.lock();
        if state.attached.as_deref() == Some(method) {
            return None;
        }
        let previous = state.attached.replace(method.to_owned());
        state.frames.clear();
        state.evicted = 0;
        drop(state);
        info!(method, previous = ?previous, "attached live capture");
        previous
    }

    /// Unbind and discard all buffered frames. Returns `false` when nothing was attached.
    pub fn detach(&self) -> bool {
        let mut state = self.state.lock();
        let previous = state.attached.take();
        state.frames.clear();
        state.evicted = 0;
        drop(state);
        match previous {
            Some(method) => {
                info!(method, "detached live capture");
                true
            }
            None => false,
        }
    }

    /// Currently attached method.
    #[must_use]
    pub fn attached(&self) -> Option<String> {
        self.state.lock().attached.clone()
    }

    /// Offer a frame observed for `method`.
    pub fn push(&self, method: &str, frame: ExecutionFrame) -> PushOutcome {
        let mut state = self.state.lock();
        match state.attached.as_deref() {
            None => return PushOutcome::NotAttached,
            Some(attached) if attached != method => return PushOutcome::WrongTarget,
            Some(_) => {}
        }
        if state.frames.len() == self.capacity {
            state.frames.pop_front();
            state.evicted += 1;
        }
        state.frames.push_back(frame);
        PushOutcome::Accepted
    }

    /// Copy of the buffer, oldest to newest.
    #[must_use]
    pub fn recent_frames(&self) -> Vec<ExecutionFrame> {
        self.state.lock().frames.iter().cloned().collect()
    }

    /// Most recent frame, if any.
    #[must_use]
    pub fn latest_frame(&self) -> Option<ExecutionFrame> {
        self.state.lock().frames.back().cloned()
    }

    /// Frames whose timestamp lies in `from_ms..=to_ms`, oldest first.
    #[must_use]
    pub fn frames_between(&self, from_ms: i64, to_ms: i64) -> Vec<ExecutionFrame> {
        self.state
            .lock()
            .frames
            .iter()
            .filter(|frame| (from_ms..=to_ms).contains(&frame.timestamp_ms))
            .cloned()
            .collect()
    }

    /// Latest frame captured at or before `timestamp_ms`.
    #[must_use]
    pub fn frame_at(&self, timestamp_ms: i64) -> Option<ExecutionFrame> {
        let state = self.state.lock();
        let found = state
            .frames
            .iter()
            .rev()
            .find(|frame| frame.timestamp_ms <= timestamp_ms)
            .cloned();
        drop(state);
        if found.is_none() {
            debug!(timestamp_ms, "no frame at or before timestamp");
        }
        found
    }

    /// Number of frames evicted since the current attachment started.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }
}
