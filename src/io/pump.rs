//! Per-stream pump
//!
//! Drives one subprocess pipe (stdout or stderr) to EOF, feeding raw bytes
//! through the [`LineDecoder`] and forwarding every completed line to a
//! handler as it arrives. Each pump runs as its own task so neither stream
//! can stall the other while the OS pipe fills.

use crate::io::decoder::LineDecoder;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{error, trace};

/// Size of the read buffer for pipe draining operations
const READ_BUFFER_SIZE: usize = 4096;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Reader that drains one OS pipe to completion
pub struct StreamPump<R> {
    reader: R,
    source: StreamSource,
    decoder: LineDecoder,
}

impl<R: AsyncRead + Unpin> StreamPump<R> {
    pub fn new(reader: R, source: StreamSource) -> Self {
        Self {
            reader,
            source,
            decoder: LineDecoder::new(),
        }
    }

    /// Drain the stream to EOF, forwarding each completed line to `on_line`
    ///
    /// Returns every line in arrival order. An empty read signals EOF: the
    /// decoder is flushed and a non-empty trailing partial line is emitted
    /// like any other. Read errors end the stream the same way, after the
    /// flush, so no decoded output is ever lost.
    pub async fn run<F>(mut self, mut on_line: F) -> Vec<String>
    where
        F: FnMut(&str),
    {
        let mut lines = Vec::new();
        let mut read_buffer = [0u8; READ_BUFFER_SIZE];

        trace!("StreamPump: draining {:?}", self.source);

        loop {
            match self.reader.read(&mut read_buffer).await {
                Ok(0) => {
                    trace!("StreamPump: {:?} EOF reached", self.source);
                    break;
                }
                Ok(n) => {
                    for line in self.decoder.decode(&read_buffer[..n]) {
                        on_line(&line);
                        lines.push(line);
                    }
                }
                Err(e) => {
                    error!("Failed to read from {:?}: {}", self.source, e);
                    break;
                }
            }
        }

        if let Some(trailing) = self.decoder.finish() {
            on_line(&trailing);
            lines.push(trailing);
        }

        trace!(
            "StreamPump: {:?} finished with {} lines",
            self.source,
            lines.len()
        );
        lines
    }
}
