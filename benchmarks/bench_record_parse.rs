use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use memload::record::parse_record;
use memload::router::shard_index;

fn bench_parse_valid_line(c: &mut Criterion) {
    let line = "gaid\t7rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23\n";
    c.bench_function("parse_valid_line", |b| {
        b.iter(|| {
            black_box(parse_record(black_box(line)).ok());
        });
    });
}

fn bench_parse_invalid_line(c: &mut Criterion) {
    let line = "gaid\t7rfw452y52g2gq4g\tnorth\t42.42\t1423\n";
    c.bench_function("parse_invalid_line", |b| {
        b.iter(|| {
            black_box(parse_record(black_box(line)).is_err());
        });
    });
}

fn bench_parse_many_apps(c: &mut Criterion) {
    let apps: Vec<String> = (0..500).map(|i| (i * 37).to_string()).collect();
    let line = format!("idfa\te7e1a50c0ec2747ca56cd9e1558c0d7c\t67.7835424444\t-22.8044005471\t{}\n", apps.join(","));
    let mut group = c.benchmark_group("parse_many_apps");
    group.throughput(Throughput::Bytes(line.len() as u64));
    group.bench_function("500_apps", |b| {
        b.iter(|| {
            black_box(parse_record(black_box(&line)).ok());
        });
    });
    group.finish();
}

fn bench_encode_and_route(c: &mut Criterion) {
    let record = match parse_record("dvid\tb6b2c7e1\t1.5\t2.5\t1,2\n") {
        Ok(record) => record,
        Err(e) => panic!("benchmark input must parse: {}", e),
    };
    c.bench_function("encode_and_route", |b| {
        b.iter(|| {
            let id = record.normalized_id();
            let value = record.encode_value();
            black_box((shard_index(&id, 4), value));
        });
    });
}

criterion_group!(
    benches,
    bench_parse_valid_line,
    bench_parse_invalid_line,
    bench_parse_many_apps,
    bench_encode_and_route
);
criterion_main!(benches);
