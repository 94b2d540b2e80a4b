//! Batch-size cycle shared by both endpoints.
//!
//! Batches grow by one unit after every acknowledged batch and wrap back to
//! a single unit after `max`: with the reference `max = 3` the sizes run
//! `1, 2, 3, 1, 2, 3, …`.  Sender and receiver each own a [`BatchCycle`]
//! built from the same `max` (announced in the hello), so the sequence is
//! reproduced on both sides without any per-batch negotiation.

/// Reference cycle length.
pub const DEFAULT_MAX_BATCH: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCycle {
    current: u8,
    max: u8,
}

impl BatchCycle {
    /// A fresh cycle starting at a batch of one unit.
    ///
    /// A `max` of zero is treated as one (every batch is a single unit).
    pub fn new(max: u8) -> Self {
        Self {
            current: 1,
            max: max.max(1),
        }
    }

    /// Units required in the current batch.
    pub fn current(&self) -> usize {
        usize::from(self.current)
    }

    /// Largest batch of the cycle, as announced in the hello.
    pub fn max_batch(&self) -> u8 {
        self.max
    }

    /// Move to the next batch size, wrapping from `max` back to 1.
    pub fn advance(&mut self) {
        self.current = if self.current >= self.max {
            1
        } else {
            self.current + 1
        };
    }
}

impl Default for BatchCycle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH)
    }
}

impl Iterator for BatchCycle {
    type Item = usize;

    /// Yields the current size, then advances.  Never ends.
    fn next(&mut self) -> Option<usize> {
        let size = self.current();
        self.advance();
        Some(size)
    }
}
