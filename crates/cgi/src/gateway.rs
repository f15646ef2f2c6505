//! Per-request control flow of the gateway.
//!
//! A request moves through `resolving`, `executing`, `streaming` and
//! `completed`, or ends in `failed` from any of them:
//!
//! 1. **resolving**: the [`ScriptResolver`] picks a program; none means 404
//! 2. **executing**: the environment is built, the program spawned and its
//!    header block parsed
//! 3. **streaming**: status and headers are committed, then stdout is copied
//!    to the response body
//! 4. **completed**: the program's exit is awaited and the body finished
//!
//! Failures before the response started become a 500 with the error in the
//! body. Afterwards the status line is gone and failures are only logged.
//! Everything from spawn to exit runs under one [`RequestScope`], so the
//! processing timeout and the caller's cancellation cover the whole program
//! lifetime.

use std::error::Error;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, StatusCode};
use http_body::Body;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

use crate::config::GatewayConfig;
use crate::env::CgiEnvironment;
use crate::process::CgiProcess;
use crate::protocol::{CgiError, ProtocolError, RequestHead};
use crate::resolver::ScriptResolver;
use crate::scope::RequestScope;
use crate::sink::ResponseSink;

const LOCATION_DIRECTIVE: &str = "Location";
const NOT_FOUND_BODY: &str = "<body><h1>Status: 404</h1><h2>Not Found</h2></body>";

/// Serves HTTP requests by running CGI programs.
#[derive(Debug)]
pub struct CgiGateway<R> {
    resolver: R,
    config: GatewayConfig,
}

impl<R: ScriptResolver> CgiGateway<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_config(resolver, GatewayConfig::default())
    }

    pub fn with_config(resolver: R, config: GatewayConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handles one request, writing the response to `sink`.
    ///
    /// `abort` is the caller's cancellation signal; once cancelled the
    /// program is killed and no error response is attempted.
    ///
    /// Returns the status that was committed. Every error is also returned,
    /// after it was turned into a 500 response or logged.
    ///
    /// # Errors
    ///
    /// Returns the [`CgiError`] that failed the request.
    pub async fn handle<B, S>(&self, request: Request<B>, sink: &mut S, abort: CancellationToken) -> Result<StatusCode, CgiError>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
        S: ResponseSink + ?Sized,
    {
        let (parts, body) = request.into_parts();
        let head = RequestHead::from(parts).with_content_length_hint(body.size_hint().exact());
        let scope = RequestScope::new(self.config.processing_timeout(), abort);

        trace!(method = %head.method(), path = head.path(), "start processing cgi request");

        match self.process(&head, body, sink, &scope).await {
            Ok(status) => {
                trace!(state = "completed", %status, path = head.path(), "finish processing cgi request");
                Ok(status)
            }
            Err(e) => {
                trace!(state = "failed", path = head.path(), cause = %e, "finish processing cgi request");
                self.fail(sink, &scope, &e).await;
                Err(e)
            }
        }
    }

    async fn process<B, S>(&self, head: &RequestHead, body: B, sink: &mut S, scope: &RequestScope) -> Result<StatusCode, CgiError>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
        S: ResponseSink + ?Sized,
    {
        trace!(state = "resolving", path = head.path());
        let Some(descriptor) = self.resolver.resolve(head)? else {
            trace!(path = head.path(), "no cgi program for request");
            respond_html(sink, StatusCode::NOT_FOUND, Bytes::from_static(NOT_FOUND_BODY.as_bytes())).await?;
            return Ok(StatusCode::NOT_FOUND);
        };

        trace!(state = "executing", script_name = descriptor.script_name(), command = descriptor.command_path());
        let env = CgiEnvironment::build(head, &descriptor, &self.config.server_software);
        let mut process = CgiProcess::spawn(&descriptor, &env, body, &self.config)?;

        match scope.run(drive(&mut process, sink)).await {
            Ok(status) => Ok(status),
            Err(e) => {
                process.terminate().await;
                let stderr = process.collect_stderr().await;
                report_stderr(process.command(), &stderr);
                Err(e)
            }
        }
    }

    async fn fail<S: ResponseSink + ?Sized>(&self, sink: &mut S, scope: &RequestScope, e: &CgiError) {
        if scope.is_aborted() {
            warn!(cause = %e, "cgi request aborted by the caller, no error response sent");
            return;
        }

        if sink.is_started() {
            error!(cause = %e, "cgi request failed after the response started");
            return;
        }

        error!(cause = %e, "cgi request failed");
        if let Err(sink_error) = respond_html(sink, StatusCode::INTERNAL_SERVER_ERROR, error_body(e)).await {
            warn!(cause = %sink_error, "failed to send error response");
        }
    }
}

/// Parses the program's headers, commits them and streams the body.
async fn drive<S: ResponseSink + ?Sized>(process: &mut CgiProcess, sink: &mut S) -> Result<StatusCode, CgiError> {
    let headers = process.read_headers().await?;

    if headers.location().is_some() {
        return Err(CgiError::unsupported_directive(LOCATION_DIRECTIVE));
    }

    let status = headers.status().unwrap_or(StatusCode::OK);
    sink.set_status(status)?;
    for (name, value) in headers.headers() {
        sink.append_header(name.clone(), value.clone())?;
    }
    if let Some(content_type) = headers.content_type() {
        let value = HeaderValue::from_str(content_type).map_err(ProtocolError::invalid_header)?;
        sink.insert_header(CONTENT_TYPE, value)?;
    }

    sink.start().await?;
    trace!(state = "streaming", %status);

    let mut written = 0usize;
    while let Some(chunk) = process.next_chunk().await? {
        written += chunk.len();
        sink.write(chunk).await?;
    }

    let exit = process.wait().await?;
    let stderr = process.collect_stderr().await;
    if !exit.success() {
        report_stderr(process.command(), &stderr);
    }
    sink.finish().await?;
    trace!(written, %exit, "cgi response body complete");

    if !exit.success() {
        return Err(CgiError::ExitStatus { status: exit });
    }

    Ok(status)
}

/// Logs what the program wrote to stderr before it failed.
fn report_stderr(command: &str, stderr: &[u8]) {
    if !stderr.is_empty() {
        warn!(command, "cgi error output: {}", String::from_utf8_lossy(stderr));
    }
}

async fn respond_html<S: ResponseSink + ?Sized>(sink: &mut S, status: StatusCode, body: Bytes) -> Result<(), CgiError> {
    sink.set_status(status)?;
    sink.insert_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))?;
    sink.start().await?;
    sink.write(body).await?;
    sink.finish().await?;
    Ok(())
}

fn error_body(e: &CgiError) -> Bytes {
    let mut body = String::from("<body><h1>Status: 500</h1><h2>Error</h2><pre>");
    escape_html(&mut body, &e.to_string());
    body.push_str("</pre></body>");
    Bytes::from(body)
}

fn escape_html(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
