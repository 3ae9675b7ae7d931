//! Warning extraction and aggregation
//!
//! Scans formatted warning lines for `<file>:<line>:<col>:` source markers
//! and accumulates the messages per source file. The resulting index is
//! serialized once, when the run ends.

use serde::Serialize;
use std::collections::BTreeMap;
use regex::Regex;

/// Accumulated warnings keyed by workspace-relative source path
///
/// Append-only; message order within a file follows classification order.
#[derive(Debug, Default, Serialize)]
pub struct IssueIndex(BTreeMap<String, Vec<String>>);

impl IssueIndex {
    pub fn record(&mut self, path: String, message: String) {
        self.0.entry(path).or_default().push(message);
    }

    pub fn messages(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    /// Number of files with at least one issue
    pub fn file_count(&self) -> usize {
        self.0.len()
    }

    pub fn issue_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extracts per-file issues from formatted warning lines
pub struct IssueExtractor {
    /// `File.swift:10:5:` marker: filename, line, column
    marker_regex: Regex,

    /// Working-directory prefix stripped from paths and messages
    working_dir: String,

    /// Build-system-internal path; lines referencing it carry no source
    /// warning and are skipped entirely
    derived_data: Option<String>,

    index: IssueIndex,
}

impl IssueExtractor {
    pub fn new(working_dir: impl Into<String>, derived_data: Option<String>) -> Self {
        Self {
            // Filename must be a single path component; extension is
            // alphanumeric so pure-numeric tokens like timestamps never match
            marker_regex: Regex::new(r"([^/\\\s:]+\.[A-Za-z][A-Za-z0-9]*):(\d+):(\d+):")
                .expect("failed to compile source marker pattern"),
            working_dir: working_dir.into(),
            derived_data,
            index: IssueIndex::default(),
        }
    }

    /// Scan one formatted warning line and record its issue, if any
    ///
    /// Lines referencing the derived-data directory, and lines without a
    /// source marker, contribute nothing. The marker's path prefix and the
    /// trailing message both have the working-directory prefix stripped.
    pub fn scan(&mut self, line: &str) {
        if let Some(derived) = &self.derived_data {
            if line.contains(derived.as_str()) {
                return;
            }
        }

        let Some(captures) = self.marker_regex.captures(line) else {
            return;
        };
        let marker = captures.get(0).expect("whole match");
        let filename = captures.get(1).expect("filename group");

        let path = &line[..filename.end()];
        let message = &line[marker.end()..];

        // Keep only the marker's own line of a multi-line formatted block
        let message = message.split('\n').next().unwrap_or(message);

        let relative = path
            .strip_prefix(self.working_dir.as_str())
            .unwrap_or(path)
            .to_string();
        let message = message.replace(self.working_dir.as_str(), "");

        self.index.record(relative, message);
    }

    /// Consume the extractor, yielding the accumulated index
    pub fn into_index(self) -> IssueIndex {
        self.index
    }

    pub fn index(&self) -> &IssueIndex {
        &self.index
    }
}
