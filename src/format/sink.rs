//! Output sink
//!
//! Consumes the pipeline's classified lines and run artifacts: formatted
//! lines are emitted as structured log events, every raw stdout line is
//! appended incrementally to a raw-log file, and the issue index is written
//! once at the end of the run. All file I/O here is best-effort: a log
//! artifact that cannot be written must never abort the build run itself.

use crate::format::classify::Category;
use crate::format::issues::IssueIndex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Destination for classified lines and run artifacts
///
/// Called from the single classification consumer, so emission order always
/// matches classification order.
pub trait OutputSink: Send {
    /// Emit one formatted, classified line
    fn emit(&mut self, category: Category, line: &str);

    /// Append one raw, unformatted stdout line as it arrives
    fn raw_line(&mut self, line: &str);

    /// Persist the accumulated issue index; called once per run
    fn persist_issues(&mut self, issues: &IssueIndex);
}

/// File-backed sink emitting formatted lines through `tracing`
pub struct ArtifactSink {
    /// Raw-log writer; dropped after the first write failure
    raw_writer: Option<BufWriter<File>>,
    issues_path: PathBuf,
}

impl ArtifactSink {
    /// Open the raw-log file and remember where to put the issue index
    ///
    /// A raw log that cannot be created is reported and skipped; the sink
    /// stays usable for emission and issue persistence.
    pub fn new(raw_log_path: PathBuf, issues_path: PathBuf) -> Self {
        let raw_writer = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&raw_log_path)
        {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                warn!(
                    "Failed to create raw log {}: {} (raw log disabled)",
                    raw_log_path.display(),
                    e
                );
                None
            }
        };

        Self {
            raw_writer,
            issues_path,
        }
    }
}

impl OutputSink for ArtifactSink {
    fn emit(&mut self, category: Category, line: &str) {
        match category {
            Category::Info => info!(target: "buildlog::output", "{line}"),
            Category::Warning => warn!(target: "buildlog::output", "{line}"),
            Category::Error => error!(target: "buildlog::output", "{line}"),
            Category::Summary => info!(target: "buildlog::output", summary = true, "{line}"),
        }
    }

    fn raw_line(&mut self, line: &str) {
        if let Some(writer) = self.raw_writer.as_mut() {
            let result = writeln!(writer, "{line}").and_then(|_| writer.flush());
            if let Err(e) = result {
                warn!("Failed to append to raw log: {} (raw log disabled)", e);
                self.raw_writer = None;
            }
        }
    }

    fn persist_issues(&mut self, issues: &IssueIndex) {
        let json = match serde_json::to_string_pretty(issues) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize issue index: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.issues_path, json) {
            warn!(
                "Failed to write issue index {}: {}",
                self.issues_path.display(),
                e
            );
        }
    }
}
