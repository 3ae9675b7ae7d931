//! Log formatting layer
//!
//! Everything between a raw subprocess line and the emitted build log:
//!
//! - **Buffer**: bounded lookahead FIFO decoupling the async producer from
//!   the synchronous, pull-based classifier
//! - **Classify**: the pluggable line classifier and its built-in
//!   compiler-diagnostic implementation
//! - **Issues**: per-file warning extraction and aggregation
//! - **Pipeline**: the single-consumer driver tying the above to a sink
//! - **Sink**: structured-log emission plus raw-log and issue artifacts

pub mod buffer;
pub mod classify;
pub mod issues;
pub mod pipeline;
pub mod sink;

pub use buffer::{DEFAULT_LOOKAHEAD_CAPACITY, LookaheadBuffer, LookaheadSource};
pub use classify::{Category, Classified, DiagnosticClassifier, LineClassifier};
pub use issues::{IssueExtractor, IssueIndex};
pub use pipeline::LogPipeline;
pub use sink::{ArtifactSink, OutputSink};
