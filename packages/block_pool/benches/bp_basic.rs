//! Basic benchmarks for the `block_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use block_pool::{BlockPool, HEADER_SIZE};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const BLOCK_SIZE: usize = 64;
const MAX_BLOCKS: usize = 1024;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("bp_basic");

    group.bench_function("build_owned", |b| {
        b.iter(|| drop(black_box(BlockPool::new(BLOCK_SIZE, MAX_BLOCKS).unwrap())));
    });

    group.bench_function("build_external", |b| {
        let mut buffer = vec![0_u8; (BLOCK_SIZE + HEADER_SIZE) * MAX_BLOCKS];

        b.iter(|| {
            drop(black_box(
                BlockPool::with_external_buffer(BLOCK_SIZE, MAX_BLOCKS, &mut buffer).unwrap(),
            ));
        });
    });

    group.bench_function("allocate_first", |b| {
        b.iter_custom(|iters| {
            let pools = iter::repeat_with(|| BlockPool::new(BLOCK_SIZE, 1).unwrap())
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &pools {
                _ = black_box(pool.allocate().unwrap());
            }

            start.elapsed()
        });
    });

    group.bench_function("allocate_deallocate", |b| {
        let pool = BlockPool::new(BLOCK_SIZE, MAX_BLOCKS).unwrap();

        b.iter(|| {
            let block = pool.allocate().unwrap();
            pool.deallocate(black_box(block)).unwrap();
        });
    });

    group.bench_function("deallocate_invalid", |b| {
        let pool = BlockPool::new(BLOCK_SIZE, MAX_BLOCKS).unwrap();
        let invalid = pool.first_block_address().checked_add(1).unwrap();

        b.iter(|| _ = black_box(pool.deallocate(black_box(invalid))));
    });

    group.bench_function("fill_and_drain", |b| {
        let pool = BlockPool::new(BLOCK_SIZE, MAX_BLOCKS).unwrap();
        let mut blocks = Vec::with_capacity(MAX_BLOCKS);

        b.iter(|| {
            while let Ok(block) = pool.allocate() {
                blocks.push(block);
            }

            for block in blocks.drain(..) {
                pool.deallocate(block).unwrap();
            }
        });
    });

    group.finish();
}
