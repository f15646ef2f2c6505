//! Accumulator for the header block of a CGI response.
//!
//! A CGI program answers with header lines, an empty line and the body. Three
//! lines are directives to the gateway rather than HTTP headers:
//!
//! - `Content-Type:` the media type of the body
//! - `Status:` the HTTP status code, optionally followed by a reason phrase
//! - `Location:` a redirect target
//!
//! Each directive may appear at most once. Directive keywords are matched
//! case-sensitively as written above; every other line is a pass-through
//! header copied onto the HTTP response as is, duplicates included.

use http::{HeaderName, HeaderValue, StatusCode};
use tracing::trace;

use crate::protocol::ProtocolError;
use crate::utils::ensure;

const CONTENT_TYPE_DIRECTIVE: &str = "Content-Type:";
const STATUS_DIRECTIVE: &str = "Status:";
const LOCATION_DIRECTIVE: &str = "Location:";

/// Parsed header block of a CGI response.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CgiHeaders {
    content_type: Option<String>,
    status: Option<StatusCode>,
    location: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl CgiHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `Content-Type` directive, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The status code from the `Status` directive, if present.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The `Location` directive, if present.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Pass-through headers in the order the program emitted them.
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Takes a single non-empty header line, without its line terminator.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if:
    /// - a directive already seen appears again
    /// - the `Status` value does not start with a valid status code
    /// - a pass-through line has no `:` or is not a valid HTTP header
    pub fn take_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        if self.take_directive(line)? {
            return Ok(());
        }

        let (name, value) = line.split_once(':').ok_or_else(|| ProtocolError::missing_colon(line))?;
        let value = value.trim();

        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProtocolError::invalid_header(format!("name '{name}': {e}")))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| ProtocolError::invalid_header(format!("value of '{name}': {e}")))?;

        trace!(name, value, "http header from cgi response");
        self.headers.push((header_name, header_value));
        Ok(())
    }

    fn take_directive(&mut self, line: &str) -> Result<bool, ProtocolError> {
        if let Some(value) = line.strip_prefix(CONTENT_TYPE_DIRECTIVE) {
            ensure!(self.content_type.is_none(), ProtocolError::duplicate_directive("Content-Type"));
            let value = value.trim_start();
            trace!(content_type = value, "cgi directive");
            self.content_type = Some(value.to_owned());
            return Ok(true);
        }

        if let Some(value) = line.strip_prefix(LOCATION_DIRECTIVE) {
            ensure!(self.location.is_none(), ProtocolError::duplicate_directive("Location"));
            let value = value.trim_start();
            trace!(location = value, "cgi directive");
            self.location = Some(value.to_owned());
            return Ok(true);
        }

        if let Some(value) = line.strip_prefix(STATUS_DIRECTIVE) {
            ensure!(self.status.is_none(), ProtocolError::duplicate_directive("Status"));
            let status = value
                .split_whitespace()
                .next()
                .and_then(|code| code.parse::<u16>().ok())
                .and_then(|code| StatusCode::from_u16(code).ok())
                .ok_or_else(|| ProtocolError::invalid_status(line))?;
            trace!(status = status.as_u16(), "cgi directive");
            self.status = Some(status);
            return Ok(true);
        }

        Ok(false)
    }
}
