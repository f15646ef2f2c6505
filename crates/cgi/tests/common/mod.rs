use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use http_body_util::Full;
use micro_cgi::protocol::{CgiError, ExecutionDescriptor, RequestHead, ResolveError, SinkError};
use micro_cgi::{CgiGateway, GatewayConfig, ResponseSink, ScriptResolver};
use tokio_util::sync::CancellationToken;

/// Sink keeping everything in memory and enforcing the start rules.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub started: bool,
    pub finished: bool,
}

impl RecordingSink {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: StatusCode) -> Result<(), SinkError> {
        if self.started {
            return Err(SinkError::AlreadyStarted);
        }
        self.status = Some(status);
        Ok(())
    }

    fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError> {
        if self.started {
            return Err(SinkError::AlreadyStarted);
        }
        self.headers.append(name, value);
        Ok(())
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SinkError> {
        if self.started {
            return Err(SinkError::AlreadyStarted);
        }
        self.headers.insert(name, value);
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SinkError> {
        if self.started {
            return Err(SinkError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if !self.started {
            return Err(SinkError::NotStarted);
        }
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        if !self.started {
            return Err(SinkError::NotStarted);
        }
        self.finished = true;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

/// Resolves every request to the same program.
#[derive(Debug, Clone)]
pub struct Fixed(pub ExecutionDescriptor);

impl ScriptResolver for Fixed {
    fn resolve(&self, _head: &RequestHead) -> Result<Option<ExecutionDescriptor>, ResolveError> {
        Ok(Some(self.0.clone()))
    }
}

/// Runs `script` with `/bin/sh -c`.
pub fn sh(script: &str) -> ExecutionDescriptor {
    ExecutionDescriptor::new("env.bat", "", "/bin/sh").args(["-c", script])
}

pub fn get(uri: &str) -> Request<Full<Bytes>> {
    Request::get(uri).body(Full::new(Bytes::new())).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::TRACE).with_test_writer().try_init();
}

/// Log writer collecting formatted events in memory.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Installs a WARN level subscriber writing into this capture on the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub async fn run(
    descriptor: ExecutionDescriptor,
    config: GatewayConfig,
    request: Request<Full<Bytes>>,
) -> (Result<StatusCode, CgiError>, RecordingSink) {
    init_tracing();
    let gateway = CgiGateway::with_config(Fixed(descriptor), config);
    let mut sink = RecordingSink::default();
    let result = gateway.handle(request, &mut sink, CancellationToken::new()).await;
    (result, sink)
}
