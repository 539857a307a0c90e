use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use record_context::{Epoch, MailboxRunner, RecordContext, RefCount, ReferenceCounted};

/// Benchmark: uncontended retain/release on the bare counter
fn bench_uncontended(c: &mut Criterion) {
    let rc = RefCount::new(1);
    c.bench_function("ref_count/retain_release", |b| {
        b.iter(|| {
            rc.retain().unwrap();
            black_box(rc.release().unwrap());
        });
    });
}

/// Benchmark: full context lifecycle (build, retain, occupy, release, dispose)
fn bench_context_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_lifecycle");

    for continuations in [1usize, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("continuations", continuations),
            continuations,
            |b, &continuations| {
                b.iter(|| {
                    let ctx = RecordContext::builder(0u64, 42u64, Epoch::new(0), |ctx| {
                        black_box(ctx.key());
                    })
                    .variable_count(2)
                    .build();
                    ctx.retain().unwrap();
                    ctx.set_key_occupied();
                    for _ in 0..continuations {
                        ctx.retain().unwrap();
                    }
                    for _ in 0..=continuations {
                        ctx.release(None).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: contended releases across threads, disposer via mailbox
fn bench_contended_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_release");

    for num_threads in [2usize, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("threads", num_threads),
            num_threads,
            |b, &num_threads| {
                let runner = Arc::new(MailboxRunner::new());
                b.iter(|| {
                    let ctx = RecordContext::new(0u64, 1u64, |_ctx| {}, 0, Epoch::new(0), 0);
                    ctx.set_key_occupied();
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            ctx.retain().unwrap();
                            let ctx = ctx.clone();
                            let runner = runner.clone();
                            thread::spawn(move || {
                                for _ in 0..100 {
                                    ctx.retain().unwrap();
                                    ctx.release(Some(&*runner)).unwrap();
                                }
                                ctx.release(Some(&*runner)).unwrap();
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    black_box(runner.drain());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended,
    bench_context_lifecycle,
    bench_contended_release
);
criterion_main!(benches);
