//! Timed and stress tests over real threads. These rely on wall-clock
//! time and large iteration counts, so they are not run under loom.

use crate::{
    loom::{
        sync::{
            atomic::{AtomicUsize, Ordering::*},
            Arc,
        },
        thread,
    },
    util::trace_init,
    BinarySemaphore, Semaphore,
};
use std::time::{Duration, Instant};

#[test]
fn waiters_drain_one_release_at_a_time() {
    let _guard = trace_init();
    const WAITERS: usize = 8;

    let sem = Arc::new(Semaphore::<WAITERS>::new(0));
    let waiters: Vec<_> = (0..WAITERS)
        .map(|_| {
            thread::spawn({
                let sem = sem.clone();
                move || sem.acquire()
            })
        })
        .collect();

    // Trickle the tokens in so that later releases land while earlier
    // waiters are mid-wakeup.
    for _ in 0..WAITERS {
        sem.release_one();
        std::thread::sleep(Duration::from_millis(1));
    }

    for waiter in waiters {
        waiter.join().unwrap();
    }
    assert!(!sem.try_acquire());
}

#[test]
fn concurrency_limit_holds() {
    let _guard = trace_init();
    const LIMIT: usize = 4;
    const THREADS: usize = 16;
    const ITERS: usize = 50;

    let sem = Arc::new(Semaphore::<LIMIT>::new(LIMIT));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn({
                let sem = sem.clone();
                let in_flight = in_flight.clone();
                move || {
                    for _ in 0..ITERS {
                        sem.acquire();
                        let n = in_flight.fetch_add(1, SeqCst) + 1;
                        assert!(n <= LIMIT, "{n} threads inside a {LIMIT}-bounded section");
                        in_flight.fetch_sub(1, SeqCst);
                        sem.release(1);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    for _ in 0..LIMIT {
        assert!(sem.try_acquire());
    }
    assert!(!sem.try_acquire());
}

#[test]
fn binary_guards_a_counter() {
    let _guard = trace_init();
    const THREADS: usize = 4;
    const ITERS: usize = 250;

    let sem = Arc::new(BinarySemaphore::new(1));
    let count = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn({
                let sem = sem.clone();
                let count = count.clone();
                move || {
                    for _ in 0..ITERS {
                        sem.acquire();
                        // Torn on purpose; the semaphore is the lock.
                        let cur = count.load(Relaxed);
                        count.store(cur + 1, Relaxed);
                        sem.release(1);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(count.load(Relaxed), THREADS * ITERS);
}

#[test]
fn timed_acquire_expires() {
    let _guard = trace_init();
    let sem = BinarySemaphore::new(0);
    let start = Instant::now();
    assert!(!sem.try_acquire_for(Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn timed_acquire_expires_counting() {
    let _guard = trace_init();
    let sem = Semaphore::<4>::new(0);
    let start = Instant::now();
    assert!(!sem.try_acquire_for(Duration::from_millis(50)));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn timed_acquire_sees_late_release() {
    let _guard = trace_init();
    let sem = Arc::new(Semaphore::<4>::new(0));
    let releaser = thread::spawn({
        let sem = sem.clone();
        move || {
            std::thread::sleep(Duration::from_millis(10));
            sem.release(1);
        }
    });
    assert!(sem.try_acquire_for(Duration::from_secs(60)));
    releaser.join().unwrap();
}

#[test]
fn timed_acquire_sees_late_release_binary() {
    let _guard = trace_init();
    let sem = Arc::new(BinarySemaphore::new(0));
    let releaser = thread::spawn({
        let sem = sem.clone();
        move || {
            std::thread::sleep(Duration::from_millis(10));
            sem.release(1);
        }
    });
    assert!(sem.try_acquire_for(Duration::from_secs(60)));
    releaser.join().unwrap();
}

#[test]
fn deadline_acquire_waits_out_the_deadline() {
    let _guard = trace_init();
    let sem = BinarySemaphore::new(0);
    let start = Instant::now();
    let deadline = start + Duration::from_millis(40);
    assert!(!sem.try_acquire_until(deadline));
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn churn() {
    let _guard = trace_init();
    const THREADS: usize = 4;
    const ITERS: usize = 1_000;

    let sem = Arc::new(Semaphore::<2>::new(2));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn({
                let sem = sem.clone();
                move || {
                    for i in 0..ITERS {
                        if i % 7 == 0 {
                            if sem.try_acquire() {
                                sem.release(1);
                            }
                        } else if i % 3 == 0 {
                            if sem.try_acquire_for(Duration::from_millis(1)) {
                                sem.release(1);
                            }
                        } else {
                            sem.acquire();
                            sem.release(1);
                        }
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert!(sem.try_acquire());
    assert!(sem.try_acquire());
    assert!(!sem.try_acquire());
}
