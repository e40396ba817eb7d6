#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests and examples in the `block_pool` workspace.

use std::sync::{Barrier, mpsc};
use std::thread;
use std::time::Duration;

/// How long a test wrapped in [`with_watchdog()`] may run before it is considered hung.
///
/// A deadlocked pool lock shows up as a hang, so multithreaded tests are bounded by this.
fn watchdog_timeout() -> Duration {
    // Miri runs thread synchronization orders of magnitude slower.
    if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    }
}

/// Runs a test on a separate thread and fails it if it does not finish in time.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the test runs directly on the
/// calling thread without a time limit, so that mutation testing can observe hanging mutants.
///
/// # Panics
///
/// Panics if the test exceeds the timeout. Panics from the test itself are propagated.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 6 * 7);
/// assert_eq!(answer, 42);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(watchdog_timeout()) {
        Ok(result) => {
            test_thread.join().expect("test thread already produced its result");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {:?} watchdog timeout", watchdog_timeout());
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without producing a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// Runs `worker` on `thread_count` threads at once and collects their results in thread order.
///
/// Every worker receives its thread index and is released only after all threads have been
/// started, to maximize contention on whatever the workers share.
///
/// # Panics
///
/// Propagates a panic from any worker after all workers have finished.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use testing::run_on_threads;
///
/// let counter = AtomicUsize::new(0);
///
/// let indexes = run_on_threads(4, |index| {
///     counter.fetch_add(1, Ordering::Relaxed);
///     index
/// });
///
/// assert_eq!(indexes, vec![0, 1, 2, 3]);
/// assert_eq!(counter.load(Ordering::Relaxed), 4);
/// ```
pub fn run_on_threads<F, R>(thread_count: usize, worker: F) -> Vec<R>
where
    F: Fn(usize) -> R + Sync,
    R: Send,
{
    let start = Barrier::new(thread_count);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..thread_count)
            .map(|index| {
                let start = &start;
                let worker = &worker;

                scope.spawn(move || {
                    start.wait();
                    worker(index)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect()
    })
}
