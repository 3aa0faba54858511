use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use http::{Response, StatusCode};
use micro_httpd::buffer::Buffer;
use micro_httpd::codec::{default_error_pages, HeaderEncoder, RequestParser, ResponseBuilder};
use micro_httpd::static_files::StaticRoot;
use micro_httpd::timer::HeapTimer;

fn bench_request_parser(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n";

    c.bench_function("parse_simple_request", |b| {
        let mut parser = RequestParser::new();
        b.iter_batched_ref(
            || {
                let mut buffer = Buffer::with_capacity(request.len());
                buffer.append(request);
                buffer
            },
            |buffer| {
                parser.reset();
                black_box(parser.parse(buffer).unwrap());
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_header_encoder(c: &mut Criterion) {
    let head = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONNECTION, "keep-alive")
        .header(http::header::CONTENT_TYPE, "text/html")
        .header(http::header::CONTENT_LENGTH, 3012)
        .body(())
        .unwrap();

    c.bench_function("encode_response_head", |b| {
        let mut buffer = Buffer::with_capacity(256);
        b.iter(|| {
            buffer.retrieve_all();
            HeaderEncoder.encode(&head, &mut buffer);
            black_box(buffer.readable_bytes());
        });
    });
}

fn bench_response_builder(c: &mut Criterion) {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "<html>index</html>".repeat(64)).unwrap();
    let builder = ResponseBuilder::new(StaticRoot::new(root.path()), default_error_pages());

    c.bench_function("build_static_response", |b| {
        let mut buffer = Buffer::with_capacity(256);
        b.iter(|| {
            buffer.retrieve_all();
            black_box(builder.build("/index.html", true, None, &mut buffer));
        });
    });
}

fn bench_heap_timer(c: &mut Criterion) {
    c.bench_function("timer_add_adjust_1k", |b| {
        b.iter(|| {
            let mut timer = HeapTimer::new();
            for id in 0..1024u64 {
                timer.add(id, Duration::from_secs(60 + id % 7), || {});
            }
            for id in (0..1024u64).step_by(3) {
                timer.adjust(id, Duration::from_secs(30));
            }
            black_box(timer.next_tick());
        });
    });
}

criterion_group!(benches, bench_request_parser, bench_header_encoder, bench_response_builder, bench_heap_timer);
criterion_main!(benches);
