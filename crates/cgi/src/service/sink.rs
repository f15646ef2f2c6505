use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use futures::channel::{mpsc, oneshot};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use super::body::BodyItem;
use crate::protocol::SinkError;
use crate::sink::ResponseSink;

pub(crate) type ResponseHead = (StatusCode, HeaderMap);

/// [`ResponseSink`] feeding an `http::Response` assembled elsewhere.
///
/// `start` hands status and headers over a oneshot channel; body chunks
/// follow over a bounded channel, so a slow client applies backpressure to
/// the CGI program.
#[derive(Debug)]
pub struct HttpResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    head: Option<oneshot::Sender<ResponseHead>>,
    body: Option<mpsc::Sender<BodyItem>>,
}

impl HttpResponseSink {
    pub(crate) fn new(head: oneshot::Sender<ResponseHead>, body: mpsc::Sender<BodyItem>) -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), head: Some(head), body: Some(body) }
    }

    fn ensure_not_started(&self) -> Result<(), SinkError> {
        if self.head.is_none() {
            return Err(SinkError::AlreadyStarted);
        }
        Ok(())
    }

    async fn send(&mut self, item: BodyItem) -> Result<(), SinkError> {
        if self.head.is_some() {
            return Err(SinkError::NotStarted);
        }
        let body = self.body.as_mut().ok_or(SinkError::Closed)?;
        body.send(item).await.map_err(|_receiver_gone| SinkError::Closed)
    }
}

#[async_trait]
impl ResponseSink for HttpResponseSink {
    fn set_status(&mut self, status: StatusCode) -> Result<(), SinkError> {
        self.ensure_not_started()?;
        self.status = status;
        Ok(())
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError> {
        self.ensure_not_started()?;
        self.headers.append(name, value);
        Ok(())
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError> {
        self.ensure_not_started()?;
        self.headers.insert(name, value);
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SinkError> {
        let head = self.head.take().ok_or(SinkError::AlreadyStarted)?;
        head.send((self.status, std::mem::take(&mut self.headers))).map_err(|_receiver_gone| SinkError::Closed)
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.send(BodyItem::Chunk(chunk)).await
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.send(BodyItem::Eof).await?;
        self.body = None;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.head.is_none()
    }
}
