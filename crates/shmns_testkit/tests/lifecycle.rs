//! Handle lifecycle across threads and handles.

use shmns_core::{CloseOutcome, Container, CoreError};
use shmns_testkit::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn handles_opened_concurrently_share_one_table() {
    let fixture = TestNamespace::new();
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let name = fixture.name().to_string();
            let config = fixture.config().clone();
            thread::spawn(move || {
                barrier.wait();
                Container::open_with_config(&name, 8, config).unwrap()
            })
        })
        .collect();
    let handles: Vec<Container> = workers
        .into_iter()
        .map(|worker| worker.join().unwrap())
        .collect();

    assert_eq!(handles[0].info().unwrap().refcount, 4);
    handles[0].set("k", b"v").unwrap();
    for ns in &handles {
        assert_eq!(ns.get("k").unwrap(), Some(b"v".to_vec()));
    }

    let outcomes: Vec<_> = handles.into_iter().map(|ns| ns.close().unwrap()).collect();
    assert_eq!(
        outcomes,
        vec![
            CloseOutcome::StillAttached { remaining: 3 },
            CloseOutcome::StillAttached { remaining: 2 },
            CloseOutcome::StillAttached { remaining: 1 },
            CloseOutcome::LastClosed,
        ]
    );
}

#[test]
fn namespace_survives_while_any_handle_is_open() {
    let fixture = TestNamespace::new();
    let first = fixture.open(4);
    first.set("k", b"v").unwrap();

    let second = fixture.open(4);
    first.close().unwrap();

    // Reopening attaches to the surviving table rather than a new one.
    let third = fixture.open(4);
    assert_eq!(third.get("k").unwrap(), Some(b"v".to_vec()));

    second.close().unwrap();
    assert_eq!(third.close().unwrap(), CloseOutcome::LastClosed);

    let fresh = fixture.open(4);
    assert_eq!(fresh.size().unwrap(), 0);
}

#[test]
fn threads_sharing_a_handle_do_not_lose_updates() {
    let fixture = TestNamespace::new();
    let ns = Arc::new(fixture.open(16));

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let ns = Arc::clone(&ns);
            thread::spawn(move || {
                for i in 0..20 {
                    let value = format!("{worker}-{i}");
                    ns.set(&format!("w{worker}"), value.as_bytes()).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ns.size().unwrap(), 8);
    for worker in 0..8 {
        let value = ns.get(&format!("w{worker}")).unwrap();
        assert_eq!(value, Some(format!("{worker}-19").into_bytes()));
    }
}

#[test]
fn dropped_handle_detaches() {
    let fixture = TestNamespace::new();
    let kept = fixture.open(2);
    {
        let dropped = fixture.open(2);
        dropped.set("k", b"v").unwrap();
        assert_eq!(kept.info().unwrap().refcount, 2);
    }

    assert_eq!(kept.info().unwrap().refcount, 1);
    assert_eq!(kept.get("k").unwrap(), Some(b"v".to_vec()));
    assert!(matches!(kept.get("a/b"), Err(CoreError::InvalidName { .. })));
}

#[test]
fn populate_fills_to_capacity() {
    with_namespace(5, |ns| {
        populate(ns, 5);
        assert_eq!(ns.size().unwrap(), 5);
        assert!(!ns.set("one-more", b"x").unwrap());
        ns.clear().unwrap();
        assert_eq!(ns.size().unwrap(), 0);
    });
}
