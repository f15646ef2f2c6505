//! Decoder for the header block at the start of a CGI program's output.
//!
//! The decoder consumes one line at a time from the buffer, strips the line
//! terminator (`\n`, optionally preceded by `\r`) and hands the line to
//! [`CgiHeaders::take_line`]. An empty line completes the block: the parsed
//! headers are yielded once and every byte after the empty line is left in the
//! buffer untouched, since it belongs to the response body.
//!
//! # State Machine
//!
//! - `Reading`: accumulating header lines
//! - `Done`: the empty line has been seen, nothing more is decoded
//!
//! Reaching the end of the stream while still `Reading` is a
//! [`ProtocolError::TruncatedHeaders`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{CgiHeaders, ProtocolError};
use crate::utils::ensure;

/// Default limit for the whole header block.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug)]
enum DecodeState {
    Reading(CgiHeaders),
    Done,
}

/// Decoder yielding the [`CgiHeaders`] of a CGI response exactly once.
#[derive(Debug)]
pub struct CgiHeaderDecoder {
    state: DecodeState,
    consumed: usize,
    max_header_bytes: usize,
}

impl CgiHeaderDecoder {
    pub fn new() -> Self {
        Self::with_max_header_bytes(DEFAULT_MAX_HEADER_BYTES)
    }

    pub fn with_max_header_bytes(max_header_bytes: usize) -> Self {
        Self { state: DecodeState::Reading(CgiHeaders::new()), consumed: 0, max_header_bytes }
    }

    /// Returns true once the terminating empty line has been decoded.
    pub fn is_done(&self) -> bool {
        matches!(self.state, DecodeState::Done)
    }
}

impl Default for CgiHeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CgiHeaderDecoder {
    type Item = CgiHeaders;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let DecodeState::Reading(headers) = &mut self.state else {
            return Ok(None);
        };

        while let Some(newline) = src.iter().position(|b| *b == b'\n') {
            let line_size = newline + 1;
            let current_size = self.consumed + line_size;
            ensure!(current_size <= self.max_header_bytes, ProtocolError::too_large_header(current_size, self.max_header_bytes));

            let mut line = &src[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            if line.is_empty() {
                src.advance(line_size);
                self.consumed = current_size;
                trace!(header_size = self.consumed, "cgi header block complete");
                let DecodeState::Reading(headers) = std::mem::replace(&mut self.state, DecodeState::Done) else {
                    unreachable!("state checked at the start of decode");
                };
                return Ok(Some(headers));
            }

            let line = std::str::from_utf8(line).map_err(|e| ProtocolError::invalid_header(format!("line is not utf-8: {e}")))?;
            headers.take_line(line)?;

            src.advance(line_size);
            self.consumed = current_size;
        }

        // the partial line still counts against the limit
        let current_size = self.consumed + src.len();
        ensure!(current_size <= self.max_header_bytes, ProtocolError::too_large_header(current_size, self.max_header_bytes));
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(headers) => Ok(Some(headers)),
            None if self.is_done() => Ok(None),
            None => Err(ProtocolError::TruncatedHeaders),
        }
    }
}
