/*!
 * Synchronizer Benchmarks
 *
 * Fast-path costs (uncontended acquire/release, failed attempts) and
 * contended handoff through the wait queue.
 */

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use queued_sync::{QueuedSynchronizer, SyncCore, SyncError, SyncPolicy, SyncResult};
use std::sync::Arc;
use std::thread;

struct MutexPolicy;

impl SyncPolicy for MutexPolicy {
    fn try_acquire(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        Ok(core.state().compare_and_set(0, 1))
    }

    fn try_release(&self, core: &SyncCore, _arg: i64) -> SyncResult<bool> {
        if core.state().get() != 1 {
            return Err(SyncError::IllegalState("release of unheld mutex"));
        }
        core.state().set(0);
        Ok(true)
    }
}

struct SemaphorePolicy;

impl SyncPolicy for SemaphorePolicy {
    fn try_acquire_shared(&self, core: &SyncCore, arg: i64) -> SyncResult<i64> {
        loop {
            let available = core.state().get();
            let remaining = available - arg;
            if remaining < 0 || core.state().compare_and_set(available, remaining) {
                return Ok(remaining);
            }
        }
    }

    fn try_release_shared(&self, core: &SyncCore, arg: i64) -> SyncResult<bool> {
        loop {
            let current = core.state().get();
            if core.state().compare_and_set(current, current + arg) {
                return Ok(true);
            }
        }
    }
}

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    let lock = QueuedSynchronizer::new(MutexPolicy);
    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            lock.acquire(black_box(1)).unwrap();
            lock.release(black_box(1)).unwrap();
        })
    });

    let held = QueuedSynchronizer::new(MutexPolicy);
    held.acquire(1).unwrap();
    group.bench_function("failed_try_acquire", |b| {
        b.iter(|| {
            assert!(!held.try_acquire(black_box(1)).unwrap());
        })
    });

    let sem = QueuedSynchronizer::with_state(SemaphorePolicy, 64);
    group.bench_function("semaphore_shared_pair", |b| {
        b.iter(|| {
            sem.acquire_shared(black_box(1)).unwrap();
            sem.release_shared(black_box(1)).unwrap();
        })
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    group.bench_function("mutex_4_threads", |b| {
        b.iter(|| {
            let lock = Arc::new(QueuedSynchronizer::new(MutexPolicy));
            let mut handles = Vec::new();
            for _ in 0..4 {
                let lock = lock.clone();
                handles.push(thread::spawn(move || {
                    for _ in 0..500 {
                        lock.acquire(1).unwrap();
                        lock.release(1).unwrap();
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
