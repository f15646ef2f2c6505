use std::error::Error as StdError;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Top level error of a single CGI request.
#[derive(Debug, Error)]
pub enum CgiError {
    #[error("{source}")]
    Resolve {
        #[from]
        source: ResolveError,
    },

    #[error("failed to spawn cgi program '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("invalid cgi output: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("cgi directive {directive} is not supported")]
    UnsupportedDirective { directive: &'static str },

    #[error("failed to feed request body to cgi program: {source}")]
    Stdin { source: io::Error },

    #[error("failed to read cgi program output: {source}")]
    Stdout { source: io::Error },

    #[error("failed to wait for cgi program: {source}")]
    Wait { source: io::Error },

    #[error("cgi program exited with non-zero status ({status})")]
    ExitStatus { status: ExitStatus },

    #[error("cgi request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("cgi request aborted by the caller")]
    Aborted,

    #[error("response error: {source}")]
    Sink {
        #[from]
        source: SinkError,
    },
}

impl CgiError {
    pub fn spawn<S: ToString>(command: S, source: io::Error) -> Self {
        Self::Spawn { command: command.to_string(), source }
    }

    pub fn unsupported_directive(directive: &'static str) -> Self {
        Self::UnsupportedDirective { directive }
    }

    pub fn stdin<E: Into<io::Error>>(e: E) -> Self {
        Self::Stdin { source: e.into() }
    }

    pub fn stdout<E: Into<io::Error>>(e: E) -> Self {
        Self::Stdout { source: e.into() }
    }

    /// Returns true when the request ran out of its processing budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true when the caller went away before the request finished.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Violations of the CGI response header grammar.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("header section not terminated by an empty line")]
    TruncatedHeaders,

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("duplicate {directive} directive")]
    DuplicateDirective { directive: &'static str },

    #[error("cannot find ':' in header line '{line}'")]
    MissingColon { line: String },

    #[error("invalid status line '{line}'")]
    InvalidStatus { line: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ProtocolError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn duplicate_directive(directive: &'static str) -> Self {
        Self::DuplicateDirective { directive }
    }

    pub fn missing_colon<S: ToString>(line: S) -> Self {
        Self::MissingColon { line: line.to_string() }
    }

    pub fn invalid_status<S: ToString>(line: S) -> Self {
        Self::InvalidStatus { line: line.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }
}

/// Errors raised by a [`ResponseSink`](crate::sink::ResponseSink).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("response already started, status and headers are immutable")]
    AlreadyStarted,

    #[error("response body written before the response was started")]
    NotStarted,

    #[error("response receiver closed")]
    Closed,
}

/// Failure reported by the application's script resolution.
#[derive(Error, Debug)]
#[error("script resolution failed: {source}")]
pub struct ResolveError {
    source: Box<dyn StdError + Send + Sync>,
}

impl ResolveError {
    pub fn new<E: Into<Box<dyn StdError + Send + Sync>>>(e: E) -> Self {
        Self { source: e.into() }
    }
}
