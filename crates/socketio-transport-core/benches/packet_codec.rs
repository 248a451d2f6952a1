use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use socketio_transport_core::Packet;

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_codec");

    group.bench_function("encode event on /", |b| {
        b.iter_batched(
            || Packet::event("/", r#"["message",{"foo":"bar","arr":[1,2,3]}]"#),
            |packet| black_box(packet.encode()),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("encode event on /custom_nsp", |b| {
        b.iter_batched(
            || Packet::event("/custom_nsp", r#"["message",{"foo":"bar","arr":[1,2,3]}]"#),
            |packet| black_box(packet.encode()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("decode event on /", |b| {
        b.iter_batched(
            || r#"42["message",{"foo":"bar","arr":[1,2,3]}]"#.to_string(),
            |frame| black_box(Packet::parse(&frame).ok()),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("decode binary event on /custom_nsp", |b| {
        b.iter_batched(
            || r#"452-/custom_nsp,["file",{"_placeholder":true,"num":0}]"#.to_string(),
            |frame| black_box(Packet::parse(&frame).ok()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
