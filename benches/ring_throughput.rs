//! Ring buffer throughput, grounded on `kaos/benches/bench_spsc.rs`'s
//! shape: a dedicated producer and consumer thread racing against a
//! fixed event count, timed end to end.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::thread;

use scale_bench::ring::{FetchOutcome, MpscRing, PushOutcome, SpmcRing};

const RING_SIZE: usize = 1 << 16;

fn drive_spmc(events: u64, consumers: usize) {
    let ring: SpmcRing<u64> = SpmcRing::new(RING_SIZE).unwrap();

    thread::scope(|scope| {
        for _ in 0..consumers {
            let ring = &ring;
            scope.spawn(move || {
                let mut consumed = 0u64;
                while consumed < events / consumers as u64 {
                    match ring.fetch() {
                        FetchOutcome::Ok(value) => {
                            black_box(value);
                            consumed += 1;
                        }
                        FetchOutcome::Empty => std::hint::spin_loop(),
                    }
                }
            });
        }

        let mut sent = 0u64;
        while sent < events {
            if ring.push(sent) == PushOutcome::Ok {
                sent += 1;
            } else {
                std::hint::spin_loop();
            }
        }
    });
}

fn drive_mpsc(events: u64, producers: usize) {
    let ring: MpscRing<u64> = MpscRing::new(RING_SIZE).unwrap();

    thread::scope(|scope| {
        for p in 0..producers {
            let ring = &ring;
            scope.spawn(move || {
                let mut sent = 0u64;
                while sent < events / producers as u64 {
                    if ring.push(p as u64) == PushOutcome::Ok {
                        sent += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            });
        }

        let mut consumed = 0u64;
        while consumed < events {
            match ring.fetch() {
                FetchOutcome::Ok(value) => {
                    black_box(value);
                    consumed += 1;
                }
                FetchOutcome::Empty => std::hint::spin_loop(),
            }
        }
    });
}

fn bench_spmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("spmc_chunk_ring");
    for &consumers in &[1usize, 3, 8] {
        let events = 200_000u64;
        group.throughput(Throughput::Elements(events));
        group.bench_with_input(BenchmarkId::from_parameter(consumers), &consumers, |b, &consumers| {
            b.iter(|| drive_spmc(events, consumers));
        });
    }
    group.finish();
}

fn bench_mpsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpsc_results_ring");
    for &producers in &[1usize, 16, 64] {
        let events = 200_000u64;
        group.throughput(Throughput::Elements(events));
        group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, &producers| {
            b.iter(|| drive_mpsc(events, producers));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_spmc, bench_mpsc);
criterion_main!(benches);
