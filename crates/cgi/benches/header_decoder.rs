use std::hint::black_box;

use bytes::BytesMut;
use criterion::{Criterion, criterion_group, criterion_main};
use micro_cgi::codec::CgiHeaderDecoder;
use tokio_util::codec::Decoder;

const SIMPLE: &[u8] = b"Content-Type: text/plain\n\nHELLO";

const TYPICAL: &[u8] = b"Status: 200 OK\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Cache-Control: no-cache, no-store, must-revalidate\r\n\
Set-Cookie: session=38afes7a8; HttpOnly; Path=/\r\n\
Set-Cookie: theme=dark; Path=/\r\n\
X-Request-Id: 9f1c2b0e-5d8a-4c7e-a2f3-0b6e4d1c9a77\r\n\
X-Powered-By: cgi\r\n\
\r\n\
<html><body>hello</body></html>";

fn decode_once(input: &[u8]) {
    let mut decoder = CgiHeaderDecoder::new();
    let mut bytes = BytesMut::from(input);
    black_box(decoder.decode(&mut bytes).unwrap());
}

fn decode_split(input: &[u8], chunk: usize) {
    let mut decoder = CgiHeaderDecoder::new();
    let mut bytes = BytesMut::new();
    for piece in input.chunks(chunk) {
        bytes.extend_from_slice(piece);
        if let Some(headers) = decoder.decode(&mut bytes).unwrap() {
            black_box(headers);
            return;
        }
    }
}

fn bench_header_decoder(c: &mut Criterion) {
    c.bench_function("decode_simple_headers", |b| b.iter(|| decode_once(black_box(SIMPLE))));
    c.bench_function("decode_typical_headers", |b| b.iter(|| decode_once(black_box(TYPICAL))));
    c.bench_function("decode_typical_headers_split_16", |b| b.iter(|| decode_split(black_box(TYPICAL), 16)));
}

criterion_group!(benches, bench_header_decoder);
criterion_main!(benches);
