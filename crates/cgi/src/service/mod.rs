//! Adapter for servers built on the `http` and `http-body` crates.
//!
//! [`CgiService`] turns an `http::Request<B>` into an
//! `http::Response<CgiBody>`. The gateway runs on its own task; the response
//! is returned as soon as the CGI program's headers are committed and the
//! body streams while the program keeps running.
//!
//! Connection metadata is read from the request extensions, see
//! [`ConnectionInfo`](crate::protocol::ConnectionInfo) and
//! [`Identity`](crate::protocol::Identity).

mod body;
mod sink;

pub use body::BodyError;
pub use body::CgiBody;
pub use sink::HttpResponseSink;

use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body::Body;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::gateway::CgiGateway;
use crate::resolver::ScriptResolver;

const BODY_CHANNEL_CAPACITY: usize = 16;

const UNAVAILABLE_BODY: &str = "<body><h1>Status: 500</h1><h2>Error</h2><pre>cgi request ended without a response</pre></body>";

/// Serves `http::Request`s through a shared [`CgiGateway`].
#[derive(Debug)]
pub struct CgiService<R> {
    gateway: Arc<CgiGateway<R>>,
}

impl<R> Clone for CgiService<R> {
    fn clone(&self) -> Self {
        Self { gateway: Arc::clone(&self.gateway) }
    }
}

impl<R> CgiService<R>
where
    R: ScriptResolver + 'static,
{
    pub fn new(gateway: CgiGateway<R>) -> Self {
        Self { gateway: Arc::new(gateway) }
    }

    pub fn gateway(&self) -> &CgiGateway<R> {
        &self.gateway
    }

    /// Runs `request` and resolves once the response head is known.
    ///
    /// Dropping the returned future or the response body before the body is
    /// complete cancels the request.
    pub async fn call<B>(&self, request: Request<B>) -> Response<CgiBody>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let abort = CancellationToken::new();
        let guard = abort.clone().drop_guard();

        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            let mut sink = HttpResponseSink::new(head_tx, body_tx);
            // failures are logged by the gateway
            if let Err(e) = gateway.handle(request, &mut sink, abort).await {
                trace!(cause = %e, "cgi task finished with error");
            }
        });

        match head_rx.await {
            Ok((status, headers)) => {
                let mut response = Response::new(CgiBody::stream(body_rx, guard));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(_) => {
                warn!("cgi request ended without committing a response");
                let mut response = Response::new(CgiBody::full(Bytes::from_static(UNAVAILABLE_BODY.as_bytes())));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
                response
            }
        }
    }
}
