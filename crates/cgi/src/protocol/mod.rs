//! Core data model of the gateway.
//!
//! - **Requests** ([`request`]): [`RequestHead`] plus the [`ConnectionInfo`] and
//!   [`Identity`] extensions an embedding server attaches to `http::Request`
//! - **Resolution** ([`descriptor`]): [`ExecutionDescriptor`], the program chosen
//!   for a request
//! - **Responses** ([`headers`]): [`CgiHeaders`], the parsed header block of a
//!   CGI program's output
//! - **Errors** ([`error`]): [`CgiError`] and the errors it wraps

mod descriptor;
pub use descriptor::ExecutionDescriptor;

mod request;
pub use request::ConnectionInfo;
pub use request::Identity;
pub use request::RequestHead;

mod headers;
pub use headers::CgiHeaders;

mod error;
pub use error::CgiError;
pub use error::ProtocolError;
pub use error::ResolveError;
pub use error::SinkError;
