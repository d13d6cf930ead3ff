use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use cadence_experiment::BalancedSequence;

/// Builds and drains balanced cue sequences of increasing length.
pub fn bench_balanced(c: &mut Criterion) {
    let mut group = c.benchmark_group("balanced_sequence");
    group
        .sample_size(50)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));

    for trials in [10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("build", trials), &trials, |b, &trials| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| BalancedSequence::new(2, black_box(trials), &mut rng));
        });

        group.bench_with_input(BenchmarkId::new("drain", trials), &trials, |b, &trials| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter_batched(
                || BalancedSequence::new(4, trials, &mut rng),
                |sequence| {
                    let Ok(mut sequence) = sequence else { return };
                    while let Ok(value) = sequence.next() {
                        black_box(value);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .confidence_level(0.95)
        .noise_threshold(0.02);
    targets = bench_balanced
}

criterion_main!(benches);
