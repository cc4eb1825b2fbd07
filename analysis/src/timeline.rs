use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One engagement sample: `[timestampSeconds, engagementLevel]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint(pub f64, pub i8);

impl TimelinePoint {
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    pub fn level(&self) -> i8 {
        self.1
    }
}

/// Capacity-bounded, time-ascending history of engagement samples. Appending
/// to a full timeline evicts the oldest sample first.
#[derive(Debug, Clone)]
pub struct Timeline {
    points: VecDeque<TimelinePoint>,
    capacity: usize,
}

impl Timeline {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, timestamp: f64, level: i8) {
        // Timestamps never go backwards; a clock hiccup clamps to the
        // previous sample instead of breaking the ordering invariant.
        let timestamp = match self.points.back() {
            Some(last) if timestamp < last.timestamp() => last.timestamp(),
            _ => timestamp,
        };
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TimelinePoint(timestamp, level));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<TimelinePoint> {
        self.points.back().copied()
    }

    pub fn to_vec(&self) -> Vec<TimelinePoint> {
        self.points.iter().copied().collect()
    }
}
