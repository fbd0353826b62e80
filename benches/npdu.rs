use bacnet_router_core::{Address, Npdu, NpduControl};
use bacnet_router_core::network::npdu::{decode, encode};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn local_npdu() -> Npdu {
    Npdu::local()
}

fn routed_npdu() -> Npdu {
    Npdu {
        control: NpduControl {
            destination_present: true,
            source_present: true,
            ..NpduControl::default()
        },
        destination: Some(Address::new(100, vec![192, 168, 1, 1])),
        source: Some(Address::new(7, vec![0xaa, 0xbb])),
        hop_count: Some(255),
        ..Npdu::local()
    }
}

fn encode_benchmark(c: &mut Criterion) {
    let local = local_npdu();
    let routed = routed_npdu();
    c.bench_function("encode_local_npdu", |b| {
        b.iter(|| black_box(encode(black_box(&local))))
    });
    c.bench_function("encode_routed_npdu", |b| {
        b.iter(|| black_box(encode(black_box(&routed))))
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let local_bytes = encode(&local_npdu());
    let routed_bytes = encode(&routed_npdu());
    c.bench_function("decode_local_npdu", |b| {
        b.iter(|| black_box(decode(black_box(&local_bytes)).unwrap()))
    });
    c.bench_function("decode_routed_npdu", |b| {
        b.iter(|| black_box(decode(black_box(&routed_bytes)).unwrap()))
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark);
criterion_main!(benches);
