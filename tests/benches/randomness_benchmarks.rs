//! # Randomness Benchmarks
//!
//! | Routine | Target |
//! |---------|--------|
//! | Failsafe draw | < 10µs (no network I/O) |
//! | Seed expansion | linear in rounds |
//! | Single-round verification | independent of total rounds |

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use raffle_randomness::algorithms::seed_from_random_value;
use raffle_randomness::{expand_seed, verify_expansion, FailsafeRandomnessProvider};

fn bench_failsafe_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("failsafe-draw");
    let provider = FailsafeRandomnessProvider::new();
    let now = Utc::now();

    for range in [10u64, 10_000, u64::MAX / 2] {
        group.bench_with_input(BenchmarkId::new("draw_uniform", range), &range, |b, &range| {
            b.iter(|| black_box(provider.draw_uniform(range, now)))
        });
    }

    group.finish();
}

fn bench_seed_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("seed-expansion");
    let seed = seed_from_random_value(0xdead_beef);

    for rounds in [10u32, 100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(rounds as u64));
        group.bench_with_input(BenchmarkId::new("expand_seed", rounds), &rounds, |b, &rounds| {
            b.iter(|| black_box(expand_seed(&seed, rounds)))
        });
    }

    let claimed = expand_seed(&seed, 10_000).map(|v| v[9_999]).unwrap_or_default();
    group.bench_function("verify_last_of_10000", |b| {
        b.iter(|| black_box(verify_expansion(&seed, 10_000, 9_999, claimed)))
    });

    group.finish();
}

criterion_group!(benches, bench_failsafe_draw, bench_seed_expansion);
criterion_main!(benches);
