//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Bounded FIFO of recent telemetry frames."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::collections::VecDeque;

use crate::frames::TelemetryFrame;

/// Most recent frames, oldest first, as consumed by chart clients.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    frames: VecDeque<TelemetryFrame>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame and return the evicted oldest one, if any.
    pub fn push(&mut self, frame: TelemetryFrame) -> Option<TelemetryFrame> {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front()
        } else {
            None
        }
    }

    /// Replace the contents with `frames`, keeping the newest `capacity` of them.
    pub fn reseed(&mut self, frames: impl IntoIterator<Item = TelemetryFrame>) {
        self.frames.clear();
        for frame in frames {
            self.push(frame);
        }
    }

    pub fn latest(&self) -> Option<&TelemetryFrame> {
        self.frames.back()
    }

    pub fn frames(&self) -> Vec<TelemetryFrame> {
        self.frames.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
