use {
    capnwire::{from_bytes, from_packed_bytes, pack, to_bytes, to_packed_bytes, unpack, Message},
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    std::hint::black_box,
};

/// A message shaped like typical RPC payloads: a composite list of structs
/// with a scalar section and a text field each.
fn build_message(entries: u32) -> Message {
    let mut msg = Message::new();
    let root = msg.new_root(8, 1).unwrap();
    msg.write64(root, 0, entries as u64).unwrap();
    let list = msg.new_list(entries, 16, 1).unwrap();
    msg.setp(root, 0, list).unwrap();
    for i in 0..entries {
        let m = msg.getp(list, i);
        msg.write64(m, 0, i as u64).unwrap();
        msg.write32(m, 8, i.wrapping_mul(2654435761)).unwrap();
        msg.set_text(m, 0, "entry name").unwrap();
    }
    msg
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for entries in [16u32, 256, 4096] {
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, &n| {
            b.iter(|| build_message(black_box(n)))
        });
    }
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    for entries in [16u32, 256, 4096] {
        let msg = build_message(entries);
        let size = to_bytes(&msg).len() as u64;
        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::new("unpacked", entries), &msg, |b, m| {
            b.iter(|| to_bytes(black_box(m)))
        });
        group.bench_with_input(BenchmarkId::new("packed", entries), &msg, |b, m| {
            b.iter(|| to_packed_bytes(black_box(m)))
        });
    }
    group.finish();
}

fn bench_deserialize_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize_walk");
    for entries in [16u32, 256, 4096] {
        let msg = build_message(entries);
        let unpacked = to_bytes(&msg);
        let packed = to_packed_bytes(&msg);
        group.throughput(Throughput::Bytes(unpacked.len() as u64));

        group.bench_with_input(BenchmarkId::new("unpacked", entries), &unpacked, |b, bytes| {
            b.iter(|| {
                let msg = from_bytes(black_box(bytes)).unwrap();
                let root = msg.get_root();
                let list = msg.getp(root, 0);
                let mut sum = 0u64;
                for i in 0..list.size() {
                    let m = msg.getp(list, i);
                    sum = sum.wrapping_add(msg.read64(m, 0));
                    sum = sum.wrapping_add(msg.get_text(m, 0).map_or(0, |t| t.len() as u64));
                }
                sum
            })
        });
        group.bench_with_input(BenchmarkId::new("packed", entries), &packed, |b, bytes| {
            b.iter(|| {
                let msg = from_packed_bytes(black_box(bytes)).unwrap();
                msg.read64(msg.get_root(), 0)
            })
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("packed_codec");
    let zero_heavy: Vec<u8> = (0..64 * 1024u32)
        .map(|i| if i % 16 < 3 { (i % 251) as u8 + 1 } else { 0 })
        .collect();
    let dense: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 253) as u8 + 1).collect();

    for (name, data) in [("zero_heavy", &zero_heavy), ("dense", &dense)] {
        let packed = pack(data).unwrap();
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("deflate", name), data, |b, d| {
            b.iter(|| pack(black_box(d)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("inflate", name), &packed, |b, p| {
            b.iter(|| unpack(black_box(p)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_serialize,
    bench_deserialize_walk,
    bench_codec
);
criterion_main!(benches);
