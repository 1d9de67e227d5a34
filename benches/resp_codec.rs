use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use naiad_redis::resp::{RespDecoder, RespEncoder, RespValue};

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("resp_encode");

    for arg_count in [1, 8, 64].iter() {
        group.bench_with_input(BenchmarkId::new("command", arg_count), arg_count, |b, &arg_count| {
            let args: Vec<String> = (0..arg_count).map(|i| format!("arg{i}")).collect();
            b.iter(|| {
                let cmd = RespEncoder::command("MSET", &args);
                black_box(RespEncoder::encode(&cmd));
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("resp_decode");

    group.bench_function("simple_string", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&b"+OK\r\n"[..]);
            black_box(RespDecoder::decode(&mut buf).unwrap());
        });
    });

    group.bench_function("bulk_string", |b| {
        let payload = "x".repeat(4096);
        let framed = format!("${}\r\n{payload}\r\n", payload.len());
        b.iter(|| {
            let mut buf = BytesMut::from(framed.as_bytes());
            black_box(RespDecoder::decode(&mut buf).unwrap());
        });
    });

    group.bench_function("nested_array", |b| {
        let mut framed = String::from("*100\r\n");
        for i in 0..100 {
            let item = format!("item{i}");
            framed.push_str(&format!("${}\r\n{item}\r\n", item.len()));
        }
        b.iter(|| {
            let mut buf = BytesMut::from(framed.as_bytes());
            black_box(RespDecoder::decode(&mut buf).unwrap());
        });
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    c.bench_function("resp_round_trip_array", |b| {
        let value = RespValue::Array(Some(
            (0..32).map(|i| RespValue::bulk(format!("field{i}"))).collect(),
        ));
        b.iter(|| {
            let mut buf = BytesMut::from(&RespEncoder::encode(&value)[..]);
            black_box(RespDecoder::decode(&mut buf).unwrap());
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_round_trip);
criterion_main!(benches);
