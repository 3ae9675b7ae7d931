//! Test doubles shared across modules
//!
//! Scripted and recording implementations of the pipeline's collaborator
//! traits, so buffer, classifier and pipeline tests stay independent of
//! the production implementations.

use crate::format::buffer::LookaheadSource;
use crate::format::classify::{Category, Classified, LineClassifier};
use crate::format::issues::IssueIndex;
use crate::format::sink::OutputSink;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Lookahead source returning a scripted sequence
///
/// Unlike the buffer-backed source, exhaustion yields `None` instead of
/// panicking, so classifier tests can model end-of-stream directly.
pub struct ScriptedLookahead {
    lines: VecDeque<String>,
}

impl ScriptedLookahead {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
        }
    }
}

impl LookaheadSource for ScriptedLookahead {
    fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

/// One observed sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Emit(Category, String),
    Raw(String),
    Persist(usize),
}

/// Sink recording every call into a shared event list
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn new(events: Arc<Mutex<Vec<SinkEvent>>>) -> Self {
        Self { events }
    }

    fn record(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl OutputSink for RecordingSink {
    fn emit(&mut self, category: Category, line: &str) {
        self.record(SinkEvent::Emit(category, line.to_string()));
    }

    fn raw_line(&mut self, line: &str) {
        self.record(SinkEvent::Raw(line.to_string()));
    }

    fn persist_issues(&mut self, issues: &IssueIndex) {
        self.record(SinkEvent::Persist(issues.issue_count()));
    }
}

/// Pass-through classifier counting its invocations
#[derive(Clone, Default)]
pub struct CountingClassifier {
    classified: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl CountingClassifier {
    pub fn shared() -> Self {
        Self::default()
    }

    pub fn classified(&self) -> usize {
        self.classified.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl LineClassifier for CountingClassifier {
    fn classify(&mut self, line: &str, _lookahead: &mut dyn LookaheadSource) -> Classified {
        self.classified.fetch_add(1, Ordering::SeqCst);
        Classified::new(line, Category::Info)
    }

    fn finish(&mut self) -> Option<Classified> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        None
    }
}
