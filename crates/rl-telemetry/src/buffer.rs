//! Fixed-capacity, most-recent-first record history.

use rl_types::{RecordId, TelemetryRecord};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of records the console keeps on screen.
pub const TELEMETRY_CAPACITY: usize = 8;

/// Newest-first history of stream records.
///
/// `len() <= capacity()` holds after every operation; pushing at capacity
/// evicts the oldest record. Single writer: the stream consumer owns it and
/// readers work from [`TelemetryBuffer::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryBuffer {
    capacity: usize,
    records: VecDeque<TelemetryRecord>,
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::with_capacity(TELEMETRY_CAPACITY)
    }

    /// Buffer holding at most `capacity` records, clamped to
    /// `1..=TELEMETRY_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, TELEMETRY_CAPACITY);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Insert at the head. Returns the evicted tail record, if any.
    pub fn push(&mut self, record: TelemetryRecord) -> Option<TelemetryRecord> {
        self.records.push_front(record);
        if self.records.len() > self.capacity {
            self.records.pop_back()
        } else {
            None
        }
    }

    /// Ordered copy of the current contents, newest first.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetryRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains_id(&self, id: &RecordId) -> bool {
        self.records.iter().any(|r| &r.id == id)
    }

    /// Random record id not held by any buffered record.
    pub fn fresh_id(&self) -> RecordId {
        loop {
            let id = RecordId::random();
            if !self.contains_id(&id) {
                return id;
            }
        }
    }
}
