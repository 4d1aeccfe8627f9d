mod common;

use common::WAIT;
use hyphae::{Actor, ExecutionUnit, MessageBus, TeardownMode, TracingObserver, UnitOptions};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_producers_no_interleaving() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 250;

    let bus = MessageBus::new();
    let actor = Arc::new(Actor::new("serial", &bus).unwrap());
    let busy = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let actor = Arc::clone(&actor);
            let busy = Arc::clone(&busy);
            let overlaps = Arc::clone(&overlaps);
            let runs = Arc::clone(&runs);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let busy = Arc::clone(&busy);
                    let overlaps = Arc::clone(&overlaps);
                    let runs = Arc::clone(&runs);
                    actor
                        .execute(move || {
                            if busy.swap(true, Ordering::SeqCst) {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            runs.lock().push((p, i));
                            busy.store(false, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    assert!(actor.flush(WAIT).unwrap());

    let runs = runs.lock().clone();
    assert_eq!(runs.len(), PRODUCERS * PER_PRODUCER);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);

    // Each producer's tasks keep their relative order
    for p in 0..PRODUCERS {
        let mine: Vec<usize> = runs.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_eq!(mine, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test]
fn test_drain_teardown_runs_all_tasks() {
    const K: usize = 50;

    let unit = ExecutionUnit::spawn("drain", UnitOptions::default(), Arc::new(TracingObserver))
        .unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    for _ in 0..K {
        let done = Arc::clone(&done);
        unit.enqueue(move || {
            thread::sleep(Duration::from_micros(200));
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    unit.stop(TeardownMode::Drain);
    assert_eq!(done.load(Ordering::SeqCst), K);
}

#[test]
fn test_halt_teardown_may_skip_tasks() {
    const K: usize = 50;

    let unit = ExecutionUnit::spawn("halt", UnitOptions::default(), Arc::new(TracingObserver))
        .unwrap();
    let done = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    // Hold the worker so the rest stay queued
    unit.enqueue(move || {
        started_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
    })
    .unwrap();
    for _ in 0..K {
        let done = Arc::clone(&done);
        unit.enqueue(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    started_rx.recv_timeout(WAIT).unwrap();
    unit.stop(TeardownMode::Halt);
    assert!(done.load(Ordering::SeqCst) < K);
}

#[test]
fn test_dropping_actor_uses_configured_teardown() {
    let config = hyphae::BusConfig::from_toml_str("teardown = \"drain\"").unwrap();
    let bus = MessageBus::with_config(config).unwrap();
    let done = Arc::new(AtomicUsize::new(0));

    {
        let actor = Actor::new("short-lived", &bus).unwrap();
        for _ in 0..20 {
            let done = Arc::clone(&done);
            actor
                .execute(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
    }

    assert_eq!(done.load(Ordering::SeqCst), 20);
}
