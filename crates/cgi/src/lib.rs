//! An asynchronous CGI/1.1 gateway for HTTP servers.
//!
//! The gateway maps an HTTP request to an external program, runs it with the
//! CGI environment, pipes the request body to its stdin and turns its stdout
//! into the HTTP response.
//!
//! # Features
//!
//! - CGI/1.1 meta-variables plus one `HTTP_*` variable per request header
//! - Request body, response body and stderr pumped concurrently, so a program
//!   can never deadlock on a full pipe
//! - Streaming responses with backpressure
//! - A processing timeout combined with caller cancellation; the program is
//!   killed and reaped when either fires
//! - Pluggable script resolution, with a prefix routing table built in
//!
//! # Example
//!
//! ```no_run
//! use http::Request;
//! use http_body_util::Full;
//! use bytes::Bytes;
//! use micro_cgi::gateway::CgiGateway;
//! use micro_cgi::resolver::{CgiRoute, PrefixResolver};
//! use micro_cgi::service::CgiService;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = PrefixResolver::new([CgiRoute::new("/env.bat", "./script/env.bat").env("FOO", "BAR")])?;
//! let service = CgiService::new(CgiGateway::new(resolver));
//!
//! let request = Request::get("/env.bat/extra?x=1").body(Full::new(Bytes::new()))?;
//! let response = service.call(request).await;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: requests, descriptors, parsed CGI headers and errors
//! - [`codec`]: decoder for the CGI response header block
//! - [`env`]: the CGI environment of a request
//! - [`process`]: the running program and its pipes
//! - [`gateway`]: per-request control flow and error mapping
//! - [`service`]: adapter for `http`/`http-body` based servers

pub mod codec;
pub mod config;
pub mod env;
pub mod gateway;
pub mod process;
pub mod protocol;
pub mod resolver;
pub mod scope;
pub mod service;
pub mod sink;

mod utils;

pub use config::GatewayConfig;
pub use gateway::CgiGateway;
pub use protocol::CgiError;
pub use resolver::ScriptResolver;
pub use sink::ResponseSink;
