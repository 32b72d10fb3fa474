//! Benchmarks for scheduler operations

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use junction_core::{LaneId, Timestamp};
use junction_sched::{check_invariants, compute_green, SignalScheduler};
use junction_test::{scenarios, IntersectionSimulator};

fn four_lanes() -> SignalScheduler {
    SignalScheduler::with_default_config((1..=4).map(LaneId::new), Timestamp::ZERO)
        .expect("four lanes")
}

fn bench_tick(c: &mut Criterion) {
    let mut scheduler = four_lanes();
    let mut now = Timestamp::ZERO;

    c.bench_function("scheduler_tick", |b| {
        b.iter(|| {
            now = now + Duration::from_secs(1);
            black_box(scheduler.tick(black_box(now)))
        })
    });
}

fn bench_observe_and_tick(c: &mut Criterion) {
    let mut scheduler = four_lanes();
    let mut now = Timestamp::ZERO;

    c.bench_function("scheduler_observe_tick", |b| {
        let mut i = 0u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            let lane = LaneId::new(i % 4 + 1);
            let _ = scheduler.observe(lane, i % 21, i % 97 == 0);
            now = now + Duration::from_millis(250);
            black_box(scheduler.tick(now))
        })
    });
}

fn bench_compute_green(c: &mut Criterion) {
    let base = Duration::from_secs(10);
    let per_vehicle = Duration::from_secs(2);
    let min = Duration::from_secs(10);
    let max = Duration::from_secs(60);

    c.bench_function("compute_green", |b| {
        let mut count = 0u32;
        b.iter(|| {
            count = (count + 1) % 64;
            compute_green(black_box(count), base, per_vehicle, min, max)
        })
    });
}

fn bench_states(c: &mut Criterion) {
    let scheduler = four_lanes();

    c.bench_function("scheduler_states", |b| b.iter(|| black_box(scheduler.states())));
}

fn bench_invariant_check(c: &mut Criterion) {
    let scheduler = four_lanes();

    c.bench_function("check_invariants", |b| {
        b.iter(|| check_invariants(black_box(scheduler.registry()), scheduler.active_lane()))
    });
}

fn bench_simulated_hour(c: &mut Criterion) {
    c.bench_function("simulate_hour_four_way", |b| {
        b.iter(|| {
            let mut sim = IntersectionSimulator::new(scenarios::four_way(42)).expect("valid scenario");
            black_box(sim.run(3600).expect("simulation"))
        })
    });
}

criterion_group!(
    benches,
    bench_tick,
    bench_observe_and_tick,
    bench_compute_green,
    bench_states,
    bench_invariant_check,
    bench_simulated_hour,
);
criterion_main!(benches);
