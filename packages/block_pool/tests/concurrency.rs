//! Multithreaded tests for `BlockPool`.
//!
//! These verify that concurrent allocation and deallocation never hand the same block to two
//! threads at once and that failing calls do not leave the pool locked.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use block_pool::{BlockAddress, BlockPool, Error};
use testing::{run_on_threads, with_watchdog};

#[test]
fn two_threads_get_the_first_two_blocks() {
    with_watchdog(|| {
        let pool = BlockPool::new(64, 10).unwrap();

        let mut addresses = run_on_threads(2, |_| pool.allocate().unwrap());
        addresses.sort();

        let first = pool.first_block_address();
        assert_eq!(addresses[0], first);
        assert_eq!(
            addresses[1],
            first.checked_add(pool.block_stride()).unwrap()
        );
    });
}

#[test]
fn live_blocks_are_never_shared() {
    const THREADS: usize = 6;
    const CYCLES: usize = 500;
    const MAX_BLOCKS: usize = 8;
    const BLOCK_SIZE: usize = 32;

    with_watchdog(|| {
        let pool = BlockPool::new(BLOCK_SIZE, MAX_BLOCKS).unwrap();

        // Blocks currently held by some thread, as observed by the threads themselves.
        let live = Mutex::new(HashSet::<BlockAddress>::new());
        let max_live = AtomicUsize::new(0);

        run_on_threads(THREADS, |thread_index| {
            // Zero is what a fresh pool starts with, so it would not reveal an overlap.
            let marker = u8::try_from(thread_index + 1).unwrap();

            for _ in 0..CYCLES {
                let block = match pool.allocate() {
                    Ok(block) => block,
                    Err(Error::OutOfAllocatableMemory { .. }) => {
                        thread::yield_now();
                        continue;
                    }
                    Err(e) => panic!("unexpected allocation error: {e}"),
                };

                {
                    let mut live = live.lock().unwrap();
                    assert!(live.insert(block), "{block} handed to two threads at once");
                    max_live.fetch_max(live.len(), Ordering::Relaxed);
                }

                // Nobody else may write to a block we hold, so the marker must survive the
                // window between our write and our read, during which the pool is unlocked.
                pool.write_block(block, &[marker; BLOCK_SIZE]).unwrap();
                thread::yield_now();

                let mut payload = [0_u8; BLOCK_SIZE];
                assert_eq!(pool.read_block(block, &mut payload).unwrap(), BLOCK_SIZE);
                assert!(
                    payload.iter().all(|byte| *byte == marker),
                    "{block} was overwritten while held by thread {thread_index}"
                );

                assert!(live.lock().unwrap().remove(&block));
                pool.deallocate(block).unwrap();
            }
        });

        assert!(max_live.load(Ordering::Relaxed) <= MAX_BLOCKS);
        assert!(pool.is_empty());
    });
}

#[test]
fn exhausted_pool_recovers_after_concurrent_deallocation() {
    with_watchdog(|| {
        let pool = Arc::new(BlockPool::new(16, 2).unwrap());

        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert!(matches!(
            pool.allocate(),
            Err(Error::OutOfAllocatableMemory { .. })
        ));

        thread::spawn({
            let pool = Arc::clone(&pool);
            move || pool.deallocate(a).unwrap()
        })
        .join()
        .unwrap();

        assert_eq!(pool.allocate().unwrap(), a);

        pool.deallocate(a).unwrap();
        pool.deallocate(b).unwrap();
    });
}

#[test]
fn failing_deallocations_do_not_block_other_threads() {
    with_watchdog(|| {
        let pool = BlockPool::new(64, 10).unwrap();
        let bogus = pool.first_block_address().checked_add(1).unwrap();

        run_on_threads(3, |thread_index| {
            if thread_index == 0 {
                for _ in 0..40 {
                    assert!(matches!(
                        pool.deallocate(bogus),
                        Err(Error::InvalidBlockAddress { .. })
                    ));
                    thread::sleep(Duration::from_micros(100));
                }
            } else {
                for _ in 0..100 {
                    let first = pool.allocate().unwrap();
                    let second = pool.allocate().unwrap();
                    thread::sleep(Duration::from_micros(100));
                    pool.deallocate(first).unwrap();
                    pool.deallocate(second).unwrap();
                }
            }
        });

        assert!(pool.is_empty());
    });
}

#[test]
fn many_threads_drain_the_pool_without_duplicates() {
    const THREADS: usize = 6;
    const MAX_BLOCKS: usize = 258;

    with_watchdog(|| {
        let pool = BlockPool::new(64, MAX_BLOCKS).unwrap();

        let per_thread = run_on_threads(THREADS, |_| {
            let mut acquired = Vec::new();

            while let Ok(block) = pool.allocate() {
                acquired.push(block);
            }

            acquired
        });

        let all: Vec<_> = per_thread.into_iter().flatten().collect();
        let distinct: HashSet<_> = all.iter().copied().collect();

        assert_eq!(all.len(), MAX_BLOCKS);
        assert_eq!(distinct.len(), MAX_BLOCKS);
        assert!(pool.is_full());
    });
}
