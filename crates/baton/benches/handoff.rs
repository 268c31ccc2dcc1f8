//! Benchmark for producer/consumer hand-off throughput
//!
//! Measures how buffer capacity affects the cost of moving items between two
//! threads when neither side sleeps.
//!
//! Run with: cargo bench --bench handoff

use baton::{BoundedBuffer, Consumer, Producer};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

const ITEMS: u64 = 10_000;

fn transfer(capacity: usize) -> usize {
    let buffer = Arc::new(BoundedBuffer::new(capacity).unwrap());
    let producer = Producer::new(Arc::clone(&buffer), 0..ITEMS);
    let consumer = Consumer::new(buffer);

    let producer = thread::spawn(move || producer.run());
    let received = consumer.run().unwrap();
    producer.join().unwrap().unwrap();
    received.len()
}

/// Benchmark two-thread transfer across capacities
fn bench_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff");
    group.throughput(Throughput::Elements(ITEMS));
    group.sample_size(20);

    for capacity in [1usize, 8, 64, 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, &capacity| {
            b.iter(|| black_box(transfer(capacity)));
        });
    }

    group.finish();
}

/// Benchmark uncontended put/take on a single thread
fn bench_uncontended(c: &mut Criterion) {
    c.bench_function("put_take_single_thread", |b| {
        let buffer = BoundedBuffer::new(1).unwrap();
        b.iter(|| {
            buffer.put(black_box(42u64));
            black_box(buffer.take())
        });
    });
}

criterion_group!(benches, bench_capacity, bench_uncontended);
criterion_main!(benches);
