use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;
use http_body::{Body, Frame, SizeHint};
use thiserror::Error;
use tokio_util::sync::DropGuard;

/// Item passed from [`HttpResponseSink`](super::HttpResponseSink) to [`CgiBody`].
#[derive(Debug)]
pub(crate) enum BodyItem {
    Chunk(Bytes),
    Eof,
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("cgi response body ended before it was complete")]
    Incomplete,
}

/// Response body produced by [`CgiService`](super::CgiService).
///
/// Dropping a streaming body before it reached its end cancels the request,
/// which kills the CGI program.
#[derive(Debug)]
pub struct CgiBody {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Full(Option<Bytes>),
    Stream { receiver: mpsc::Receiver<BodyItem>, eof: bool, _abort: DropGuard },
}

impl CgiBody {
    pub(crate) fn full(bytes: Bytes) -> Self {
        Self { kind: Kind::Full(Some(bytes)) }
    }

    pub(crate) fn stream(receiver: mpsc::Receiver<BodyItem>, abort: DropGuard) -> Self {
        Self { kind: Kind::Stream { receiver, eof: false, _abort: abort } }
    }
}

impl Body for CgiBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Full(bytes) => Poll::Ready(bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream { eof: true, .. } => Poll::Ready(None),
            Kind::Stream { receiver, eof, .. } => match ready!(receiver.poll_next_unpin(cx)) {
                Some(BodyItem::Chunk(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                Some(BodyItem::Eof) => {
                    *eof = true;
                    Poll::Ready(None)
                }
                None => {
                    *eof = true;
                    Poll::Ready(Some(Err(BodyError::Incomplete)))
                }
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Full(bytes) => bytes.is_none(),
            Kind::Stream { eof, .. } => *eof,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Full(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Full(None) => SizeHint::with_exact(0),
            Kind::Stream { .. } => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn full_body() {
        let body = CgiBody::full(Bytes::from_static(b"hello"));
        assert_eq!(body.size_hint().exact(), Some(5));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn stream_until_eof() {
        let (mut tx, rx) = mpsc::channel(4);
        let token = CancellationToken::new();
        let body = CgiBody::stream(rx, token.clone().drop_guard());

        tx.send(BodyItem::Chunk(Bytes::from_static(b"a"))).await.unwrap();
        tx.send(BodyItem::Chunk(Bytes::from_static(b"b"))).await.unwrap();
        tx.send(BodyItem::Eof).await.unwrap();

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"ab"));
    }

    #[tokio::test]
    async fn closed_without_eof_is_an_error() {
        let (mut tx, rx) = mpsc::channel(4);
        let body = CgiBody::stream(rx, CancellationToken::new().drop_guard());

        tx.send(BodyItem::Chunk(Bytes::from_static(b"a"))).await.unwrap();
        drop(tx);

        assert!(matches!(body.collect().await, Err(BodyError::Incomplete)));
    }

    #[test]
    fn dropping_the_body_cancels() {
        let (_tx, rx) = mpsc::channel::<BodyItem>(4);
        let token = CancellationToken::new();
        let body = CgiBody::stream(rx, token.clone().drop_guard());

        assert!(!token.is_cancelled());
        drop(body);
        assert!(token.is_cancelled());
    }
}
