use serde::{Deserialize, Serialize};

pub const DEFAULT_SEQUENCE_WIDTH: usize = 3;

/// Run-wide sequence counter. The planner owns one and threads it through the
/// traversal; it only moves forward when a file is accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceCounter {
    next: u64,
    width: usize,
}

impl SequenceCounter {
    pub fn new(start: u64, width: usize) -> Self {
        Self { next: start, width }
    }

    pub fn current(&self) -> u64 {
        self.next
    }

    /// Zero-padded form of the current value. Values wider than `width` are kept whole.
    pub fn formatted(&self) -> String {
        format!("{:0width$}", self.next, width = self.width)
    }

    pub fn advance(&mut self) {
        self.next = self.next.saturating_add(1);
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new(1, DEFAULT_SEQUENCE_WIDTH)
    }
}
