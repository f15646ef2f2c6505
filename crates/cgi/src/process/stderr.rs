//! Draining of a CGI program's standard error.
//!
//! Stderr is diagnostic only and never reaches the response. It is read until
//! the program closes it so the program can never block on a full pipe. Lines
//! are optionally logged, and the first `limit` bytes are kept for failure
//! reports.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error};

/// Longest line logged as is; longer output is logged in pieces of this size.
const MAX_LOG_LINE: usize = 8 * 1024;

#[derive(Debug)]
pub(crate) struct StderrDrain {
    command: String,
    log_lines: bool,
    limit: usize,
}

impl StderrDrain {
    pub(crate) fn new(command: String, log_lines: bool, limit: usize) -> Self {
        Self { command, log_lines, limit }
    }

    /// Reads `reader` to its end and returns the retained prefix.
    pub(crate) async fn drain<R: AsyncRead + Unpin>(self, mut reader: R) -> Bytes {
        let mut captured = BytesMut::new();
        let mut pending = BytesMut::with_capacity(1024);

        loop {
            match reader.read_buf(&mut pending).await {
                Ok(0) => break,
                Ok(n) => {
                    let start = pending.len() - n;
                    let keep = self.limit.saturating_sub(captured.len()).min(n);
                    captured.extend_from_slice(&pending[start..start + keep]);
                    self.log_complete_lines(&mut pending);
                }
                Err(e) => {
                    debug!(command = %self.command, cause = %e, "failed to read cgi stderr");
                    break;
                }
            }
        }

        if !pending.is_empty() {
            self.log_line(&pending);
        }

        captured.freeze()
    }

    fn log_complete_lines(&self, pending: &mut BytesMut) {
        while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
            let line = pending.split_to(newline + 1);
            self.log_line(&line[..newline]);
        }

        while pending.len() >= MAX_LOG_LINE {
            let piece = pending.split_to(MAX_LOG_LINE);
            self.log_line(&piece);
        }
    }

    fn log_line(&self, line: &[u8]) {
        if self.log_lines {
            let line = String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line));
            error!(command = %self.command, "cgi error output: {}", line);
        }
    }
}
