use super::{ArrivalToken, Barrier};
use crate::loom::{
    sync::{
        atomic::{AtomicUsize, Ordering::*},
        Arc,
    },
    thread,
};
use crate::util::test::{assert_send, assert_send_sync, assert_sync};
#[cfg(not(loom))]
use crate::util::test::trace_init;

#[test]
fn barriers_are_send_and_sync() {
    assert_send_sync::<Barrier>();
    assert_send::<ArrivalToken>();
    assert_sync::<ArrivalToken>();
}

#[test]
fn max_is_generous() {
    assert_eq!(Barrier::<fn()>::max(), isize::MAX as usize);
}

#[test]
#[cfg(not(loom))]
#[should_panic(expected = "must have participants")]
fn zero_participants_panics() {
    let _ = Barrier::new(0);
}

#[test]
#[cfg(not(loom))]
#[should_panic(expected = "too many barrier participants")]
fn too_many_participants_panics() {
    let _ = Barrier::with_completion(usize::MAX, || ());
}

#[test]
fn single_participant_never_blocks() {
    crate::loom::model(|| {
        let barrier = Barrier::new(1);
        barrier.arrive_and_wait();
        barrier.arrive_and_wait();
        let token = barrier.arrive(1);
        barrier.wait(token);
    });
}

#[test]
fn waiting_on_a_completed_phase_returns_immediately() {
    crate::loom::model(|| {
        let barrier = Barrier::new(1);
        let stale = barrier.arrive(1);
        let fresh = barrier.arrive(1);
        // Two phases have completed; neither wait may block.
        barrier.wait(stale);
        barrier.wait(fresh);
    });
}

#[test]
fn pair_rendezvous() {
    crate::loom::model(|| {
        let barrier = Arc::new(Barrier::new(2));
        let other = thread::spawn({
            let barrier = barrier.clone();
            move || barrier.arrive_and_wait()
        });
        barrier.arrive_and_wait();
        other.join().unwrap();
    });
}

#[test]
fn wait_blocks_for_the_stragglers() {
    crate::loom::model(|| {
        let barrier = Arc::new(Barrier::new(2));
        let flag = Arc::new(AtomicUsize::new(0));
        let straggler = thread::spawn({
            let barrier = barrier.clone();
            let flag = flag.clone();
            move || {
                flag.store(1, Relaxed);
                let _ = barrier.arrive(1);
            }
        });
        let token = barrier.arrive(1);
        barrier.wait(token);
        // `wait` returned, so the straggler arrived, and everything it did
        // beforehand is visible here.
        assert_eq!(flag.load(Relaxed), 1);
        straggler.join().unwrap();
    });
}

#[test]
fn arrival_and_wait_can_be_split() {
    crate::loom::model(|| {
        let barrier = Arc::new(Barrier::new(2));
        let other = thread::spawn({
            let barrier = barrier.clone();
            move || barrier.arrive_and_wait()
        });
        let token = barrier.arrive(1);
        barrier.wait(token);
        other.join().unwrap();

        // Both arrivals at the next phase can come from one thread.
        let token = barrier.arrive(2);
        barrier.wait(token);
    });
}

#[test]
fn completion_runs_once_per_phase() {
    crate::loom::model(|| {
        let ran = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::with_completion(2, {
            let ran = ran.clone();
            move || {
                ran.fetch_add(1, Relaxed);
            }
        }));
        let other = thread::spawn({
            let barrier = barrier.clone();
            move || barrier.arrive_and_wait()
        });
        barrier.arrive_and_wait();
        // The callback ran before any waiter was released, on whichever
        // thread arrived last.
        assert_eq!(ran.load(Relaxed), 1);
        other.join().unwrap();
        assert_eq!(ran.load(Relaxed), 1);
    });
}

#[test]
fn arrive_and_drop_shrinks_the_party() {
    crate::loom::model(|| {
        let barrier = Arc::new(Barrier::new(2));
        let leaver = thread::spawn({
            let barrier = barrier.clone();
            move || barrier.arrive_and_drop()
        });
        // This phase still counts the leaver; the next is ours alone.
        barrier.arrive_and_wait();
        barrier.arrive_and_wait();
        leaver.join().unwrap();
    });
}

#[test]
#[cfg(not(loom))]
fn many_rounds_of_reuse() {
    let _guard = trace_init();
    const THREADS: usize = 4;
    const ROUNDS: usize = 50;

    let phases = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::with_completion(THREADS, {
        let phases = phases.clone();
        move || {
            phases.fetch_add(1, Relaxed);
        }
    }));
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn({
                let barrier = barrier.clone();
                let phases = phases.clone();
                move || {
                    for round in 0..ROUNDS {
                        barrier.arrive_and_wait();
                        // Round N's completion has run by the time anyone
                        // is released from round N.
                        assert!(phases.load(Relaxed) >= round + 1);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(phases.load(Relaxed), ROUNDS);
}

#[test]
#[cfg(not(loom))]
fn every_thread_but_one_leaves() {
    let _guard = trace_init();
    const THREADS: usize = 4;

    let barrier = Arc::new(Barrier::new(THREADS));
    let leavers: Vec<_> = (0..THREADS - 1)
        .map(|i| {
            thread::spawn({
                let barrier = barrier.clone();
                move || {
                    // Stay for `i` full phases, then leave.
                    for _ in 0..i {
                        barrier.arrive_and_wait();
                    }
                    barrier.arrive_and_drop();
                }
            })
        })
        .collect();

    // One participant drops out per phase, so by the last round this
    // thread is rendezvousing with itself.
    for _ in 0..THREADS {
        barrier.arrive_and_wait();
    }
    for leaver in leavers {
        leaver.join().unwrap();
    }
}

#[test]
#[cfg(not(loom))]
fn debug_reports_progress() {
    let barrier = Barrier::new(3);
    let _token = barrier.arrive(1);
    let fmt = format!("{barrier:?}");
    assert!(fmt.contains("outstanding: 2"), "{fmt}");
    assert!(fmt.contains("expected: 3"), "{fmt}");
    assert!(fmt.contains("phase: 0"), "{fmt}");
}
