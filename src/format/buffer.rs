//! Bounded lookahead buffer
//!
//! Raw lines arrive asynchronously from the stream pump, but classification
//! is synchronous and pull-based: a classifier sometimes cannot finalize the
//! current line without seeing the next few. This buffer decouples the two
//! sides while presenting the classifier with the illusion of synchronous
//! lookahead over not-yet-consumed output.

use std::collections::VecDeque;

/// Default number of lines buffered ahead of classification
///
/// Tunable via the CLI; any classifier requiring deeper lookahead than
/// `capacity - 1` must be paired with a larger buffer.
pub const DEFAULT_LOOKAHEAD_CAPACITY: usize = 10;

/// Pull-based access to lines after the one currently being classified
///
/// Implemented by [`LookaheadBuffer`] for production use. The buffer-backed
/// implementation treats running past the buffered lines as a sizing defect
/// and panics; scripted test doubles may instead return `None` when their
/// sequence is exhausted.
pub trait LookaheadSource {
    /// Return the next lookahead line and advance the cursor
    fn next_line(&mut self) -> Option<String>;
}

/// Fixed-capacity FIFO of raw lines with a lookahead cursor
///
/// Single-producer, single-consumer: the stream pump pushes, the
/// classification driver pops. The producer must keep occupancy at or below
/// `capacity` by draining before pushing once the buffer is full; `push` at
/// capacity is a contract violation, never a silent drop.
#[derive(Debug)]
pub struct LookaheadBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    cursor: usize,
}

impl LookaheadBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "lookahead buffer needs room for at least one line of lookahead");
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Append a line at the tail
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already at capacity. The producer throttles
    /// pushes by draining one line first whenever occupancy reaches
    /// capacity, so hitting this indicates a broken driver, not load.
    pub fn push(&mut self, line: String) {
        assert!(
            self.lines.len() < self.capacity,
            "lookahead buffer overflow: push at capacity {} (producer must drain first)",
            self.capacity
        );
        self.lines.push_back(line);
    }

    /// Remove and return the oldest line for classification
    ///
    /// Resets the lookahead cursor; returns `None` once the buffer is
    /// drained.
    pub fn pop_for_classification(&mut self) -> Option<String> {
        self.cursor = 0;
        self.lines.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lines.len() == self.capacity
    }
}

impl Default for LookaheadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_CAPACITY)
    }
}

impl LookaheadSource for LookaheadBuffer {
    /// Return the line `cursor` positions past the buffer head
    ///
    /// # Panics
    ///
    /// Panics when the cursor would pass the buffered line count: the
    /// buffer was sized too small for the classifier's maximum lookahead.
    /// This is a configuration defect, not a runtime condition, so it is
    /// not surfaced as a recoverable error.
    fn next_line(&mut self) -> Option<String> {
        assert!(
            self.cursor < self.lines.len(),
            "lookahead request past buffered lines (cursor {}, buffered {}): \
             buffer capacity {} is too small for this classifier",
            self.cursor,
            self.lines.len(),
            self.capacity
        );
        let line = self.lines[self.cursor].clone();
        self.cursor += 1;
        Some(line)
    }
}
