//! Benchmarks for Plexus channel operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use plexus_core::{identify, Fingerprint};
use plexus_runtime::RuntimeConfig;
use plexus_test::Cluster;

fn bench_identify(c: &mut Criterion) {
    let fingerprint = Fingerprint::new("src/game/inventory.rs", 128, 17);

    c.bench_function("identify", |b| {
        b.iter(|| black_box(identify(black_box(&fingerprint))))
    });
}

fn bench_event_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_fan_out");

    for contexts in [1usize, 4, 16] {
        let cluster = Cluster::with_contexts(contexts);
        let channels: Vec<_> = cluster
            .contexts()
            .iter()
            .map(|ctx| {
                ctx.declare_event::<(u32, String)>(Fingerprint::key("hit"))
                    .unwrap()
            })
            .collect();
        for channel in &channels {
            channel.connect(|args| {
                black_box(args);
            });
        }

        let payload = (7u32, "sword".to_string());
        group.bench_with_input(BenchmarkId::from_parameter(contexts), &payload, |b, p| {
            b.iter(|| channels[0].fire(black_box(p)).unwrap())
        });
    }

    group.finish();
}

fn bench_state_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_set");

    for contexts in [1usize, 4, 16] {
        let mut cluster = Cluster::new(RuntimeConfig::default());
        for i in 0..contexts {
            cluster.spawn(format!("bench-{i}"));
        }
        let states = cluster
            .declare_state::<u64>(&Fingerprint::key("counter"))
            .unwrap();

        let mut next = 0u64;
        group.bench_function(BenchmarkId::from_parameter(contexts), |b| {
            b.iter(|| {
                next += 1;
                states[next as usize % contexts].set(black_box(next)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_late_join(c: &mut Criterion) {
    let mut cluster = Cluster::new(RuntimeConfig::default());
    let writer = cluster.spawn("writer");
    let key = Fingerprint::key("lobby");
    let state = writer.declare_state::<Vec<u32>>(key.clone()).unwrap();
    state.set((0..64).collect()).unwrap();

    c.bench_function("late_join_catch_up", |b| {
        b.iter(|| {
            let joiner = cluster.spawn("joiner");
            let joined = joiner.declare_state::<Vec<u32>>(key.clone()).unwrap();
            black_box(joined.get());
            joiner.shutdown();
        })
    });
}

criterion_group!(
    benches,
    bench_identify,
    bench_event_fan_out,
    bench_state_set,
    bench_late_join,
);
criterion_main!(benches);
