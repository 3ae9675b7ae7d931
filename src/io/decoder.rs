//! Incremental line decoder
//!
//! Turns arbitrarily chunked subprocess bytes into complete UTF-8 text
//! lines. The decoder is stateful across chunk boundaries: a multi-byte
//! codepoint split between two reads is reassembled, and a partial line is
//! held back until its newline (or EOF) arrives.

use tracing::debug;

/// Stateful byte-to-line decoder for one subprocess stream
///
/// Invalid UTF-8 never crashes the decoder: the longest valid prefix of the
/// buffered bytes is decoded and a definite malformed remainder is dropped,
/// preserving every previously decoded line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Raw bytes not yet decodable as complete UTF-8 scalars
    bytes: Vec<u8>,

    /// Decoded text not yet terminated by a newline
    pending: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of raw bytes, returning every line it completes
    ///
    /// Lines are returned newline-stripped (a trailing `\r` is stripped as
    /// well), in arrival order. Bytes forming an incomplete trailing UTF-8
    /// sequence are carried over to the next call.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        self.bytes.extend_from_slice(chunk);

        if let Some(valid) = self.take_valid_utf8() {
            self.pending.push_str(&valid);
        }

        self.split_complete_lines()
    }

    /// Signal EOF and flush the trailing unterminated line, if any
    ///
    /// Bytes still undecodable at EOF can never complete and are dropped.
    pub fn finish(&mut self) -> Option<String> {
        if !self.bytes.is_empty() {
            debug!(
                "LineDecoder: dropping {} undecodable trailing bytes at EOF",
                self.bytes.len()
            );
            self.bytes.clear();
        }

        if self.pending.is_empty() {
            None
        } else {
            let mut line = std::mem::take(&mut self.pending);
            if line.ends_with('\r') {
                line.pop();
            }
            Some(line)
        }
    }

    /// Extract the longest valid UTF-8 prefix of the buffered bytes
    ///
    /// An incomplete trailing sequence stays buffered for the next chunk; a
    /// definite invalid sequence terminates decoding of the buffered
    /// remainder (the malformed tail is dropped).
    fn take_valid_utf8(&mut self) -> Option<String> {
        if self.bytes.is_empty() {
            return None;
        }

        match std::str::from_utf8(&self.bytes) {
            Ok(_) => {
                let valid = std::mem::take(&mut self.bytes);
                // Validated just above
                Some(String::from_utf8(valid).expect("validated UTF-8"))
            }
            Err(e) => {
                let valid_end = e.valid_up_to();
                let valid = self.bytes[..valid_end].to_vec();

                if e.error_len().is_some() {
                    // Definite malformed sequence: decoding of this tail stops
                    debug!(
                        "LineDecoder: dropping {} bytes after invalid UTF-8 sequence",
                        self.bytes.len() - valid_end
                    );
                    self.bytes.clear();
                } else {
                    // Incomplete sequence: keep the tail for the next chunk
                    self.bytes.drain(..valid_end);
                }

                if valid.is_empty() {
                    None
                } else {
                    Some(String::from_utf8(valid).expect("validated UTF-8"))
                }
            }
        }
    }

    /// Split every newline-terminated line out of the pending text
    fn split_complete_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();

        while let Some(pos) = self.pending.find('\n') {
            let rest = self.pending.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop(); // the '\n'
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut LineDecoder, chunks: &[&[u8]]) -> Vec<String> {
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(decoder.decode(chunk));
        }
        lines.extend(decoder.finish());
        lines
    }

    #[test]
    fn test_single_chunk_with_trailing_fragment() {
        let mut decoder = LineDecoder::new();
        let lines = decode_all(&mut decoder, &[b"first\nsecond\ntail"]);
        assert_eq!(lines, vec!["first", "second", "tail"]);
    }

    #[test]
    fn test_every_chunking_yields_identical_lines() {
        // Framing must be independent of how the OS splits the byte stream
        let text = b"alpha\nbeta\ngamma\nfragment";
        let expected = ["alpha", "beta", "gamma", "fragment"];

        for split in 0..=text.len() {
            let mut decoder = LineDecoder::new();
            let lines = decode_all(&mut decoder, &[&text[..split], &text[split..]]);
            assert_eq!(lines, expected, "split at byte {split}");
        }
    }

    #[test]
    fn test_multibyte_codepoint_split_at_every_boundary() {
        // 4-byte scalar split across two chunks must decode identically
        let text = "a🦀b\n".as_bytes();

        for split in 0..=text.len() {
            let mut decoder = LineDecoder::new();
            let lines = decode_all(&mut decoder, &[&text[..split], &text[split..]]);
            assert_eq!(lines, vec!["a🦀b"], "split at byte {split}");
        }
    }

    #[test]
    fn test_two_byte_codepoint_split() {
        let mut decoder = LineDecoder::new();
        let bytes = "caf\u{e9}\n".as_bytes();
        let mut lines = decoder.decode(&bytes[..4]); // ends mid-é
        assert!(lines.is_empty());
        lines.extend(decoder.decode(&bytes[4..]));
        assert_eq!(lines, vec!["café"]);
    }

    #[test]
    fn test_invalid_sequence_drops_malformed_tail_only() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"good line\nabc\xff\xfeignored");
        assert_eq!(lines, vec!["good line"]);
        // "abc" decoded before the invalid byte, emitted at EOF
        assert_eq!(decoder.finish(), Some("abc".to_string()));
    }

    #[test]
    fn test_decoding_resumes_after_malformed_chunk() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(b"\xff\xff").is_empty());
        let lines = decoder.decode(b"recovered\n");
        assert_eq!(lines, vec!["recovered"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"windows\r\nunix\n");
        assert_eq!(lines, vec!["windows", "unix"]);
    }

    #[test]
    fn test_finish_without_trailing_newline_is_none() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"complete\n");
        assert_eq!(lines, vec!["complete"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_incomplete_utf8_at_eof_is_dropped() {
        let mut decoder = LineDecoder::new();
        let bytes = "tail🦀".as_bytes();
        // Cut inside the 4-byte scalar, then EOF
        assert!(decoder.decode(&bytes[..6]).is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
    }

    #[test]
    fn test_empty_chunk_is_noop() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.decode(b"").is_empty());
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.decode(b"a\n\nb\n");
        assert_eq!(lines, vec!["a", "", "b"]);
    }
}
