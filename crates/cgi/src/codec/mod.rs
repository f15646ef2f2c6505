//! Codec for the CGI response stream.
//!
//! The output of a CGI program is a header block followed by the raw body.
//! [`CgiHeaderDecoder`] plugs into `tokio_util::codec::FramedRead` to decode
//! the header block; whatever remains in the read buffer afterwards, followed
//! by the rest of the stream, is the body and is never inspected.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_cgi::codec::CgiHeaderDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut buffer = BytesMut::from("Content-Type: text/plain\n\nHELLO");
//! let headers = CgiHeaderDecoder::new().decode(&mut buffer).unwrap().unwrap();
//!
//! assert_eq!(headers.content_type(), Some("text/plain"));
//! assert_eq!(&buffer[..], b"HELLO");
//! ```

mod header_decoder;

pub use header_decoder::CgiHeaderDecoder;
pub use header_decoder::DEFAULT_MAX_HEADER_BYTES;
