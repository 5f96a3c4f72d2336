use connqueue::{BoundedConnectionQueue, QueueError};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::Instant,
};

// Number of items pushed through the queue per benchmark iteration.
const TOTAL_ITEMS: usize = 4096;

/// Single-threaded enqueue/dequeue pairs; measures the uncontended lock path.
fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));

    for capacity in [1, 16, 256] {
        group.bench_function(format!("capacity/{capacity}"), |b| {
            let queue = BoundedConnectionQueue::new(capacity).unwrap();
            b.iter(|| {
                for i in 0..TOTAL_ITEMS {
                    queue.enqueue(i).unwrap();
                    black_box(queue.dequeue().unwrap());
                }
            });
        });
    }

    group.finish();
}

/// One producer feeding `consumers` threads through a small queue, the shape
/// of an accept thread and its worker pool.
fn bench_producer_consumers(c: &mut Criterion, consumers: usize, capacity: usize) {
    let mut group = c.benchmark_group(format!("producer/consumers/{consumers}"));
    group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));

    group.bench_function(format!("capacity/{capacity}"), |b| {
        b.iter_custom(|iters| {
            let mut total = core::time::Duration::ZERO;
            for _ in 0..iters {
                let queue = Arc::new(BoundedConnectionQueue::new(capacity).unwrap());
                let barrier = Barrier::new(consumers + 1);

                let start = scope(|s| {
                    for _ in 0..consumers {
                        let queue = Arc::clone(&queue);
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            loop {
                                match queue.dequeue() {
                                    Ok(item) => {
                                        black_box(item);
                                    }
                                    Err(QueueError::Drained) => break,
                                    Err(e) => panic!("queue failed: {e}"),
                                }
                            }
                        });
                    }

                    barrier.wait();
                    let start = Instant::now();
                    for i in 0..TOTAL_ITEMS {
                        queue.enqueue(i).unwrap();
                    }
                    queue.shutdown().unwrap();
                    start
                });
                total += start.elapsed();
            }
            total
        });
    });

    group.finish();
}

fn benchmarks(c: &mut Criterion) {
    bench_uncontended(c);

    let max_consumers = num_cpus::get().max(2) - 1;
    let mut consumers = 1;
    while consumers <= max_consumers {
        bench_producer_consumers(c, consumers, 5);
        bench_producer_consumers(c, consumers, 64);
        consumers *= 2;
    }
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
