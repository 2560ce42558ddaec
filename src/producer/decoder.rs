//! Producer byte stream to message decoding
//!
//! Two framing modes are offered:
//!
//! - [`FramingMode::Chunk`]: every read is one message. A message split
//!   across two reads is relayed as two messages, and several lines
//!   arriving in one read are relayed as a single message.
//! - [`FramingMode::Lines`]: bytes are buffered and split on `\n`, so each
//!   relayed message is exactly one line regardless of how the reads fell.
//!
//! In both modes the text is trimmed and empty results are discarded. When
//! a line fails UTF-8 validation, the lines before it in the same read are
//! still handed back inside the [`DecodeError`].

use std::str::Utf8Error;

use bytes::BytesMut;
use thiserror::Error;

use crate::registry::Payload;

/// Default upper bound on a buffered line in [`FramingMode::Lines`]
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// How producer bytes are cut into messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// One message per read
    #[default]
    Chunk,
    /// One message per `\n`-terminated line
    Lines,
}

impl std::fmt::Display for FramingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramingMode::Chunk => write!(f, "chunk"),
            FramingMode::Lines => write!(f, "lines"),
        }
    }
}

impl std::str::FromStr for FramingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chunk" => Ok(FramingMode::Chunk),
            "lines" | "line" => Ok(FramingMode::Lines),
            other => Err(format!("unknown framing mode: {}", other)),
        }
    }
}

/// A read that contained invalid UTF-8
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid UTF-8 in producer data: {source}")]
pub struct DecodeError {
    /// Messages completed before the invalid bytes, in order
    pub decoded: Vec<Payload>,
    #[source]
    pub source: Utf8Error,
}

/// Stateful decoder for one producer connection
#[derive(Debug)]
pub struct MessageDecoder {
    mode: FramingMode,
    max_line_length: usize,
    pending: BytesMut,
}

impl MessageDecoder {
    pub fn new(mode: FramingMode, max_line_length: usize) -> Self {
        Self {
            mode,
            max_line_length: max_line_length.max(1),
            pending: BytesMut::new(),
        }
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode the bytes of one read into zero or more messages
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Payload>, DecodeError> {
        let mut messages = Vec::new();

        match self.mode {
            FramingMode::Chunk => match to_message(chunk) {
                Ok(msg) => messages.extend(msg),
                Err(source) => {
                    return Err(DecodeError {
                        decoded: messages,
                        source,
                    });
                }
            },
            FramingMode::Lines => {
                self.pending.extend_from_slice(chunk);

                loop {
                    let line = if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                        let mut line = self.pending.split_to(pos + 1);
                        line.truncate(pos);
                        line
                    } else if self.pending.len() >= self.max_line_length {
                        // Overlong line without a terminator, relay what we have
                        self.pending.split()
                    } else {
                        break;
                    };

                    match to_message(&line) {
                        Ok(msg) => messages.extend(msg),
                        Err(source) => {
                            return Err(DecodeError {
                                decoded: messages,
                                source,
                            });
                        }
                    }
                }
            }
        }

        Ok(messages)
    }

    /// Flush a trailing unterminated line at end of stream
    pub fn finish(&mut self) -> Result<Option<Payload>, Utf8Error> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let rest = self.pending.split();
        to_message(&rest)
    }
}

fn to_message(bytes: &[u8]) -> Result<Option<Payload>, Utf8Error> {
    let text = std::str::from_utf8(bytes)?.trim();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Payload::from(text.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(messages: &[Payload]) -> Vec<&str> {
        messages.iter().map(|m| m.as_str()).collect()
    }

    #[test]
    fn test_chunk_trims_whitespace() {
        let mut decoder = MessageDecoder::new(FramingMode::Chunk, DEFAULT_MAX_LINE_LENGTH);

        let msgs = decoder.decode(b"  temp=21.5\r\n").unwrap();
        assert_eq!(texts(&msgs), vec!["temp=21.5"]);
    }

    #[test]
    fn test_chunk_skips_blank_reads() {
        let mut decoder = MessageDecoder::new(FramingMode::Chunk, DEFAULT_MAX_LINE_LENGTH);

        assert!(decoder.decode(b"\n\r\n  ").unwrap().is_empty());
    }

    #[test]
    fn test_chunk_keeps_multiple_lines_together() {
        let mut decoder = MessageDecoder::new(FramingMode::Chunk, DEFAULT_MAX_LINE_LENGTH);

        let msgs = decoder.decode(b"a=1\nb=2\n").unwrap();
        assert_eq!(texts(&msgs), vec!["a=1\nb=2"]);
    }

    #[test]
    fn test_chunk_does_not_reassemble() {
        let mut decoder = MessageDecoder::new(FramingMode::Chunk, DEFAULT_MAX_LINE_LENGTH);

        let first = decoder.decode(b"temp=").unwrap();
        let second = decoder.decode(b"21.5\n").unwrap();
        assert_eq!(texts(&first), vec!["temp="]);
        assert_eq!(texts(&second), vec!["21.5"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_chunk_invalid_utf8() {
        let mut decoder = MessageDecoder::new(FramingMode::Chunk, DEFAULT_MAX_LINE_LENGTH);

        let err = decoder.decode(&[0x66, 0xFF, 0x0A]).unwrap_err();
        assert!(err.decoded.is_empty());
        assert_eq!(err.source.valid_up_to(), 1);
    }

    #[test]
    fn test_lines_reassembles_across_reads() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, DEFAULT_MAX_LINE_LENGTH);

        assert!(decoder.decode(b"temp=").unwrap().is_empty());
        assert_eq!(decoder.pending_len(), 5);

        let msgs = decoder.decode(b"21.5\nhum=").unwrap();
        assert_eq!(texts(&msgs), vec!["temp=21.5"]);
        assert_eq!(decoder.pending_len(), 4);

        let msgs = decoder.decode(b"40\r\n").unwrap();
        assert_eq!(texts(&msgs), vec!["hum=40"]);
    }

    #[test]
    fn test_lines_splits_one_read() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, DEFAULT_MAX_LINE_LENGTH);

        let msgs = decoder.decode(b"a=1\n\nb=2\n").unwrap();
        assert_eq!(texts(&msgs), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_lines_invalid_line_keeps_earlier_lines() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, DEFAULT_MAX_LINE_LENGTH);

        let err = decoder.decode(b"a=1\n\xFF\nb=2\n").unwrap_err();
        assert_eq!(texts(&err.decoded), vec!["a=1"]);
        assert_eq!(err.source.valid_up_to(), 0);
        assert!(err.to_string().starts_with("invalid UTF-8"));
    }

    #[test]
    fn test_lines_flushes_overlong_line() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, 8);

        let msgs = decoder.decode(b"0123456789").unwrap();
        assert_eq!(texts(&msgs), vec!["0123456789"]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_lines_finish_flushes_tail() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, DEFAULT_MAX_LINE_LENGTH);

        decoder.decode(b"last=1").unwrap();
        assert_eq!(decoder.finish().unwrap().unwrap().as_str(), "last=1");
        assert!(decoder.finish().unwrap().is_none());
    }

    #[test]
    fn test_lines_multibyte_across_reads() {
        let mut decoder = MessageDecoder::new(FramingMode::Lines, DEFAULT_MAX_LINE_LENGTH);
        let bytes = "t=21.5°C\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte degree sign

        assert!(decoder.decode(&bytes[..split]).unwrap().is_empty());
        let msgs = decoder.decode(&bytes[split..]).unwrap();
        assert_eq!(texts(&msgs), vec!["t=21.5°C"]);
    }

    #[test]
    fn test_framing_mode_parse() {
        assert_eq!("chunk".parse::<FramingMode>().unwrap(), FramingMode::Chunk);
        assert_eq!("LINES".parse::<FramingMode>().unwrap(), FramingMode::Lines);
        assert!("frames".parse::<FramingMode>().is_err());
        assert_eq!(FramingMode::default(), FramingMode::Chunk);
    }
}
