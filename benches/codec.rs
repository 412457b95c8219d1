//! Benchmarks for PDU framing and message mapping.
//!
//! Run with: cargo bench --bench codec

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use smpp_session::message::{text, DataCoding, ShortMessage};
use smpp_session::pdu::{Pdu, PduCodec};
use tokio_util::codec::{Decoder, Encoder};

fn submit_pdu(len: usize) -> Pdu {
    ShortMessage::new("467019191695", "467373737373", "x".repeat(len)).to_submit_pdu(1)
}

fn encode(pdu: Pdu) -> BytesMut {
    let mut buf = BytesMut::new();
    PduCodec::new().encode(pdu, &mut buf).unwrap();
    buf
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/encode");

    for len in [11, 160, 1024] {
        let pdu = submit_pdu(len);
        group.throughput(Throughput::Bytes(encode(pdu.clone()).len() as u64));
        group.bench_with_input(BenchmarkId::new("submit_sm", len), &pdu, |b, pdu| {
            let mut codec = PduCodec::new();
            let mut buf = BytesMut::with_capacity(2048);
            b.iter(|| {
                buf.clear();
                codec.encode(black_box(pdu.clone()), &mut buf).unwrap();
            })
        });
    }

    group.bench_function("enquire_link", |b| {
        let mut codec = PduCodec::new();
        let mut buf = BytesMut::with_capacity(16);
        b.iter(|| {
            buf.clear();
            codec.encode(black_box(Pdu::enquire_link(1)), &mut buf).unwrap();
        })
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");

    for len in [11, 160, 1024] {
        let wire = encode(submit_pdu(len));
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::new("submit_sm", len), &wire, |b, wire| {
            let mut codec = PduCodec::new();
            b.iter(|| {
                let mut src = wire.clone();
                black_box(codec.decode(&mut src).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("message");

    let pdu = submit_pdu(160);
    group.bench_function("from_submit_pdu", |b| {
        b.iter(|| black_box(ShortMessage::from_submit_pdu(black_box(&pdu))))
    });

    let sample = "Hello world, this is a test message with {brackets} and €";
    group.bench_function("gsm7_encode", |b| {
        b.iter(|| black_box(text::encode(DataCoding::Default, black_box(sample))))
    });
    group.bench_function("ucs2_encode", |b| {
        b.iter(|| black_box(text::encode(DataCoding::Ucs2, black_box(sample))))
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_message);
criterion_main!(benches);
