//! Log processing pipeline
//!
//! Owns the lookahead buffer, the classifier, the warning extractor and the
//! output sink for one build run. The stdout pump is the sole producer and
//! this pipeline the sole consumer: occupancy stays at or below the buffer
//! capacity because a full buffer drains exactly one line before each push.

use crate::format::buffer::LookaheadBuffer;
use crate::format::classify::{Category, LineClassifier};
use crate::format::issues::{IssueExtractor, IssueIndex};
use crate::format::sink::OutputSink;
use tracing::debug;

pub struct LogPipeline {
    buffer: LookaheadBuffer,
    classifier: Box<dyn LineClassifier>,
    extractor: IssueExtractor,
    sink: Box<dyn OutputSink>,
}

impl LogPipeline {
    pub fn new(
        buffer: LookaheadBuffer,
        classifier: Box<dyn LineClassifier>,
        extractor: IssueExtractor,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            buffer,
            classifier,
            extractor,
            sink,
        }
    }

    /// Accept one raw stdout line as it arrives
    ///
    /// The raw copy goes to the sink immediately; classification of a line
    /// is deferred until the buffer holds enough lookahead behind it.
    pub fn feed(&mut self, line: &str) {
        self.sink.raw_line(line);

        if self.buffer.is_full() {
            self.classify_next();
        }
        self.buffer.push(line.to_string());
    }

    /// Drain the buffer at stream end and flush the run artifacts
    ///
    /// Classifies every remaining line, emits the classifier's final
    /// summary (exactly once, even for an empty run) and persists the
    /// issue index.
    pub fn finish(mut self) -> IssueIndex {
        while self.classify_next() {}

        if let Some(summary) = self.classifier.finish() {
            self.sink.emit(summary.category, &summary.text);
        }

        let index = self.extractor.into_index();
        self.sink.persist_issues(&index);
        debug!(
            "LogPipeline: finished with {} issue(s) across {} file(s)",
            index.issue_count(),
            index.file_count()
        );
        index
    }

    /// Classify and emit the oldest buffered line
    fn classify_next(&mut self) -> bool {
        let Some(line) = self.buffer.pop_for_classification() else {
            return false;
        };

        let classified = self.classifier.classify(&line, &mut self.buffer);
        if classified.text.is_empty() {
            // Absorbed into an earlier formatted block
            return true;
        }

        if classified.category == Category::Warning {
            self.extractor.scan(&classified.text);
        }
        self.sink.emit(classified.category, &classified.text);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::classify::DiagnosticClassifier;
    use crate::test_utils::{CountingClassifier, RecordingSink, SinkEvent};
    use std::sync::{Arc, Mutex};

    fn pipeline_with(
        capacity: usize,
        classifier: Box<dyn LineClassifier>,
    ) -> (LogPipeline, Arc<Mutex<Vec<SinkEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let pipeline = LogPipeline::new(
            LookaheadBuffer::new(capacity),
            classifier,
            IssueExtractor::new("/root/project", None),
            Box::new(RecordingSink::new(Arc::clone(&events))),
        );
        (pipeline, events)
    }

    fn emitted(events: &Arc<Mutex<Vec<SinkEvent>>>) -> Vec<(Category, String)> {
        events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Emit(category, text) => Some((*category, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_raw_lines_written_in_arrival_order() {
        let (mut pipeline, events) = pipeline_with(4, Box::new(DiagnosticClassifier::default()));

        for line in ["one", "two", "three"] {
            pipeline.feed(line);
        }
        pipeline.finish();

        let raw: Vec<String> = events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Raw(line) => Some(line.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(raw, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_lines_classified_in_order_across_buffer_refills() {
        let (mut pipeline, events) = pipeline_with(3, Box::new(DiagnosticClassifier::default()));

        let lines: Vec<String> = (0..10).map(|i| format!("step {i}")).collect();
        for line in &lines {
            pipeline.feed(line);
        }
        pipeline.finish();

        let emitted = emitted(&events);
        // Last emitted line is the classifier summary
        assert_eq!(emitted.len(), 11);
        for (i, (category, text)) in emitted.iter().take(10).enumerate() {
            assert_eq!(*category, Category::Info);
            assert_eq!(text, &format!("step {i}"));
        }
        assert_eq!(emitted[10].0, Category::Summary);
    }

    #[test]
    fn test_warning_lines_feed_the_issue_index() {
        let (mut pipeline, _) = pipeline_with(4, Box::new(DiagnosticClassifier::default()));

        pipeline.feed("Compiling A.swift");
        pipeline.feed("/root/project/A.swift:4:9: warning: unused variable 'x'");
        pipeline.feed("    let x = 5");
        pipeline.feed("        ^");
        pipeline.feed("Linking app");
        let index = pipeline.finish();

        assert_eq!(index.issue_count(), 1);
        assert_eq!(
            index.messages("/A.swift"),
            Some(&[" warning: unused variable 'x'".to_string()][..])
        );
    }

    #[test]
    fn test_absorbed_snippet_lines_are_not_emitted() {
        let (mut pipeline, events) = pipeline_with(4, Box::new(DiagnosticClassifier::default()));

        pipeline.feed("/root/project/A.swift:4:9: warning: unused variable 'x'");
        pipeline.feed("    let x = 5");
        pipeline.feed("        ^");
        pipeline.finish();

        let emitted = emitted(&events);
        assert_eq!(emitted.len(), 2); // merged block + summary
        assert_eq!(
            emitted[0].1,
            "/root/project/A.swift:4:9: warning: unused variable 'x'\n    let x = 5\n        ^"
        );
        assert_eq!(emitted[1].0, Category::Summary);
    }

    #[test]
    fn test_issues_persisted_exactly_once() {
        let (mut pipeline, events) = pipeline_with(4, Box::new(DiagnosticClassifier::default()));
        pipeline.feed("/root/project/A.swift:1:1: warning: w");
        pipeline.feed("x");
        pipeline.feed("nothing");
        pipeline.finish();

        let persists = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Persist(_)))
            .count();
        assert_eq!(persists, 1);
    }

    #[test]
    fn test_empty_run_summarizes_exactly_once() {
        let counter = CountingClassifier::shared();
        let (pipeline, events) = pipeline_with(4, Box::new(counter.clone()));
        pipeline.finish();

        assert_eq!(emitted(&events).len(), 0);
        assert_eq!(counter.classified(), 0);
        assert_eq!(counter.finished(), 1);

        let persists = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Persist(_)))
            .count();
        assert_eq!(persists, 1);
    }

    #[test]
    fn test_classifier_called_once_per_line() {
        let counter = CountingClassifier::shared();
        let (mut pipeline, _) = pipeline_with(3, Box::new(counter.clone()));

        for i in 0..25 {
            pipeline.feed(&format!("line {i}"));
        }
        pipeline.finish();

        assert_eq!(counter.classified(), 25);
        assert_eq!(counter.finished(), 1);
    }
}
