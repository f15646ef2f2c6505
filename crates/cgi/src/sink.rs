//! Response half of the host-server interface.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};

use crate::protocol::SinkError;

/// Where the gateway writes a response.
///
/// Status and headers are mutable until [`start`](ResponseSink::start)
/// succeeds; afterwards every mutation fails with
/// [`SinkError::AlreadyStarted`]. Body bytes may only be written after
/// `start`.
#[async_trait]
pub trait ResponseSink: Send {
    fn set_status(&mut self, status: StatusCode) -> Result<(), SinkError>;

    /// Adds a header, keeping any earlier values with the same name.
    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError>;

    /// Sets a header, replacing any earlier values with the same name.
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError>;

    /// Commits status and headers.
    async fn start(&mut self) -> Result<(), SinkError>;

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Completes the body.
    async fn finish(&mut self) -> Result<(), SinkError>;

    fn is_started(&self) -> bool;
}
