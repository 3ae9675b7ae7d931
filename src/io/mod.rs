//! I/O layer - subprocess execution and stream plumbing
//!
//! This module provides the process-facing half of the crate, independent
//! of any log grammar:
//!
//! - **Decoder**: incremental byte-to-line decoding across chunk boundaries
//! - **Pump**: per-stream reader driving one OS pipe to EOF
//! - **Process**: build tool lifecycle, dual-stream coordination and
//!   result assembly

pub mod decoder;
pub mod process;
pub mod pump;

// Re-export main types for convenience
pub use decoder::LineDecoder;
pub use process::{BuildCommand, BuildOutput, BuildRunner, ProcessState, RunnerError};
pub use pump::{StreamPump, StreamSource};
