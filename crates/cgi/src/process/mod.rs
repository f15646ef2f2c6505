//! Subprocess side of a CGI request.
//!
//! [`CgiProcess`] spawns the program with all three standard streams piped
//! and keeps them moving independently so neither side can stall the other
//! on a full pipe buffer:
//!
//! - a spawned task copies the request body into stdin, then closes it
//! - a spawned task drains stderr (see `stderr`)
//! - the owner reads stdout: first the header block through
//!   [`CgiHeaderDecoder`], then the body chunk by chunk
//!
//! The child is killed when the handle is dropped before it exited, and the
//! helper tasks are aborted, so a cancelled request releases everything it
//! held.

mod stderr;

use std::error::Error;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace, warn};

use crate::codec::CgiHeaderDecoder;
use crate::config::GatewayConfig;
use crate::env::CgiEnvironment;
use crate::protocol::{CgiError, CgiHeaders, ExecutionDescriptor, ProtocolError};

use stderr::StderrDrain;

const READ_CAPACITY: usize = 8 * 1024;

/// How long to wait for a killed child to be reaped, or for stderr to close.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

enum Stdout {
    Headers(FramedRead<ChildStdout, CgiHeaderDecoder>),
    Body { pending: Option<Bytes>, reader: ReaderStream<ChildStdout> },
    Closed,
}

/// A running CGI program.
pub struct CgiProcess {
    command: String,
    child: Child,
    stdout: Stdout,
    stdin_task: Option<JoinHandle<io::Result<u64>>>,
    stderr_task: Option<JoinHandle<Bytes>>,
}

impl std::fmt::Debug for CgiProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CgiProcess").field("command", &self.command).field("pid", &self.child.id()).finish_non_exhaustive()
    }
}

impl CgiProcess {
    /// Spawns the program described by `descriptor` and starts feeding `body`
    /// to its stdin.
    ///
    /// Arguments are passed literally, no shell is involved. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`CgiError::Spawn`] if the program cannot be started.
    pub fn spawn<B>(descriptor: &ExecutionDescriptor, env: &CgiEnvironment, body: B, config: &GatewayConfig) -> Result<Self, CgiError>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let command_path = descriptor.command_path();
        trace!(command = command_path, args = ?descriptor.command_args(), "execute cgi program");

        let mut command = Command::new(command_path);
        command
            .args(descriptor.command_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if !config.inherit_env {
            command.env_clear();
            for name in &config.env_passthrough {
                if let Some(value) = std::env::var_os(name) {
                    command.env(name, value);
                }
            }
        }
        command.envs(env);

        let mut child = command.spawn().map_err(|e| CgiError::spawn(command_path, e))?;

        let (Some(stdin), Some(stdout), Some(stderr)) = (child.stdin.take(), child.stdout.take(), child.stderr.take()) else {
            return Err(CgiError::spawn(command_path, io::Error::other("child stdio unavailable")));
        };

        let stdin_task = tokio::spawn(feed_stdin(body, stdin));
        let stderr_task =
            tokio::spawn(StderrDrain::new(command_path.to_owned(), config.log_stderr, config.max_stderr_bytes).drain(stderr));

        let decoder = CgiHeaderDecoder::with_max_header_bytes(config.max_header_bytes);

        Ok(Self {
            command: command_path.to_owned(),
            child,
            stdout: Stdout::Headers(FramedRead::with_capacity(stdout, decoder, READ_CAPACITY)),
            stdin_task: Some(stdin_task),
            stderr_task: Some(stderr_task),
        })
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Reads stdout up to and including the empty line ending the header block.
    ///
    /// # Errors
    ///
    /// Returns [`CgiError::Protocol`] if the header block is malformed or the
    /// output ends before it is complete.
    pub async fn read_headers(&mut self) -> Result<CgiHeaders, CgiError> {
        let mut framed = match std::mem::replace(&mut self.stdout, Stdout::Closed) {
            Stdout::Headers(framed) => framed,
            other => {
                self.stdout = other;
                return Err(CgiError::stdout(io::Error::other("cgi headers already read")));
            }
        };

        let headers = match framed.next().await {
            Some(Ok(headers)) => headers,
            Some(Err(ProtocolError::Io { source })) => return Err(CgiError::stdout(source)),
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ProtocolError::TruncatedHeaders.into()),
        };

        let pending = framed.read_buffer_mut().split().freeze();
        let reader = ReaderStream::with_capacity(framed.into_inner(), READ_CAPACITY);
        self.stdout = Stdout::Body { pending: (!pending.is_empty()).then_some(pending), reader };

        Ok(headers)
    }

    /// Next chunk of the response body, `None` once stdout is closed.
    ///
    /// # Errors
    ///
    /// Returns [`CgiError::Stdout`] on read failure or when called before
    /// [`read_headers`](Self::read_headers).
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, CgiError> {
        match &mut self.stdout {
            Stdout::Body { pending, reader } => {
                if let Some(bytes) = pending.take() {
                    return Ok(Some(bytes));
                }
                match reader.next().await {
                    Some(Ok(bytes)) => Ok(Some(bytes)),
                    Some(Err(e)) => Err(CgiError::stdout(e)),
                    None => {
                        self.stdout = Stdout::Closed;
                        Ok(None)
                    }
                }
            }
            Stdout::Closed => Ok(None),
            Stdout::Headers(_) => Err(CgiError::stdout(io::Error::other("cgi headers not read yet"))),
        }
    }

    /// Waits for the program to exit.
    ///
    /// A program that exits without consuming the whole request body is not
    /// an error; a failure to read the request body is.
    ///
    /// # Errors
    ///
    /// Returns [`CgiError::Wait`] if the exit status cannot be observed and
    /// [`CgiError::Stdin`] if feeding the request body failed.
    pub async fn wait(&mut self) -> Result<ExitStatus, CgiError> {
        let status = self.child.wait().await.map_err(|source| CgiError::Wait { source })?;
        trace!(command = %self.command, %status, "cgi program exited");

        if let Some(task) = self.stdin_task.take() {
            if !task.is_finished() {
                debug!(command = %self.command, "cgi program exited before consuming the request body");
                task.abort();
                return Ok(status);
            }

            match task.await {
                Ok(Ok(written)) => trace!(written, "request body fed to cgi program"),
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(command = %self.command, "cgi program closed stdin early");
                }
                Ok(Err(e)) => return Err(CgiError::stdin(e)),
                Err(e) => return Err(CgiError::stdin(io::Error::other(e))),
            }
        }

        Ok(status)
    }

    /// Kills the program if it is still running and reaps it.
    pub async fn terminate(&mut self) {
        if let Some(task) = self.stdin_task.take() {
            task.abort();
        }
        self.stdout = Stdout::Closed;

        if let Err(e) = self.child.start_kill() {
            // already exited and reaped
            trace!(command = %self.command, cause = %e, "kill cgi program");
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!(command = %self.command, %status, "cgi program terminated"),
            Ok(Err(e)) => warn!(command = %self.command, cause = %e, "failed to reap cgi program"),
            Err(_) => warn!(command = %self.command, "cgi program not reaped within {:?}", REAP_TIMEOUT),
        }
    }

    /// Waits for stderr to close and returns what was retained of it.
    pub async fn collect_stderr(&mut self) -> Bytes {
        let Some(mut task) = self.stderr_task.take() else {
            return Bytes::new();
        };

        match tokio::time::timeout(REAP_TIMEOUT, &mut task).await {
            Ok(Ok(captured)) => captured,
            Ok(Err(e)) => {
                debug!(command = %self.command, cause = %e, "stderr drain failed");
                Bytes::new()
            }
            Err(_) => {
                // a grandchild may still hold the pipe open
                task.abort();
                Bytes::new()
            }
        }
    }
}

impl Drop for CgiProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stdin_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

async fn feed_stdin<B>(mut body: B, mut stdin: ChildStdin) -> io::Result<u64>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let mut written = 0u64;
    loop {
        let Some(frame) = body.frame().await else { break };
        let frame = frame.map_err(io::Error::other)?;
        if let Ok(data) = frame.into_data() {
            stdin.write_all(&data).await?;
            written += data.len() as u64;
        }
    }

    stdin.shutdown().await?;
    Ok(written)
}
