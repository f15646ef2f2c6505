//! Body-less view of an inbound HTTP request.
//!
//! `http::Request` has no place for connection metadata, so embedding servers
//! attach it as request extensions: [`ConnectionInfo`] for the socket
//! addresses and [`Identity`] for an authenticated user. [`RequestHead`]
//! gathers the method, URI, version, headers and those extensions into the
//! single value consumed by script resolution and the environment builder.

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};

/// Socket addresses of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
}

impl ConnectionInfo {
    pub fn new(remote_addr: SocketAddr, local_addr: SocketAddr) -> Self {
        Self { remote_addr: Some(remote_addr), local_addr: Some(local_addr) }
    }
}

/// An authenticated identity established by the host server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub auth_type: String,
}

impl Identity {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, auth_type: A) -> Self {
        Self { name: name.into(), auth_type: auth_type.into() }
    }
}

/// Request metadata without the body.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    connection: Option<ConnectionInfo>,
    identity: Option<Identity>,
    content_length_hint: Option<u64>,
}

impl RequestHead {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path, without the query.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// The raw query string without the leading `?`, empty when absent.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or_default()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Headers in arrival order, repeated names preserved.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.connection.and_then(|c| c.remote_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.connection.and_then(|c| c.local_addr)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Body length from the `Content-Length` header, else the exact size
    /// reported by the body itself.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(self.content_length_hint)
    }

    pub(crate) fn with_content_length_hint(mut self, hint: Option<u64>) -> Self {
        self.content_length_hint = hint;
        self
    }
}

/// Builds a head from request parts, picking connection metadata out of the
/// extensions.
impl From<&Parts> for RequestHead {
    fn from(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            connection: parts.extensions.get::<ConnectionInfo>().copied(),
            identity: parts.extensions.get::<Identity>().cloned(),
            content_length_hint: None,
        }
    }
}

impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self::from(&parts)
    }
}
