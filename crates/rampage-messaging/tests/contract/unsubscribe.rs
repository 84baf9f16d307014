use rampage_messaging::{MessageBus, Unsubscribe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crate::support::{eventually, for_each_strategy, Ping, Pong, Recorder};

#[test]
fn test_unsubscribed_handler_receives_nothing() {
    for_each_strategy(|strategy, bus| {
        let removed = Recorder::default();
        let r = removed.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| r.push(ping.0))
            .expect("subscribe");

        let sentinel = Recorder::default();
        let s = sentinel.clone();
        bus.subscribe(move |ping: &Ping| s.push(ping.0))
            .expect("subscribe");

        assert!(handle.unsubscribe());
        assert_eq!(bus.publish(Ping(1)).expect("publish"), 1, "{}", strategy);

        assert_eq!(sentinel.wait_for(1), vec![1], "{}", strategy);
        thread::sleep(Duration::from_millis(20));
        assert!(removed.values().is_empty(), "{}", strategy);
        assert_eq!(bus.subscriber_count(), 1, "{}", strategy);
    });
}

#[test]
fn test_unsubscribe_is_idempotent() {
    for_each_strategy(|strategy, bus| {
        let handle = bus.subscribe(|_: &Ping| {}).expect("subscribe");
        let id = handle.id();

        assert!(handle.unsubscribe(), "{}", strategy);
        assert!(!handle.unsubscribe(), "{}", strategy);
        assert!(!bus.unsubscribe(id), "{}", strategy);
        assert_eq!(bus.subscriber_count(), 0, "{}", strategy);
    });
}

#[test]
fn test_racing_unsubscribes_succeed_exactly_once() {
    for_each_strategy(|strategy, bus| {
        let handle = bus.subscribe(|_: &Ping| {}).expect("subscribe");
        let wins = AtomicUsize::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                let handle = handle.clone();
                let wins = &wins;
                scope.spawn(move || {
                    if handle.unsubscribe() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1, "{}", strategy);
        assert_eq!(bus.subscriber_count(), 0, "{}", strategy);
    });
}

#[test]
fn test_handler_can_unsubscribe_itself() {
    for_each_strategy(|strategy, bus| {
        let own: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());
        let seen = Recorder::default();

        let slot = own.clone();
        let s = seen.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| {
                s.push(ping.0);
                if let Some(handle) = slot.get() {
                    handle.unsubscribe();
                }
            })
            .expect("subscribe");
        own.set(handle).ok();

        let sentinel = Recorder::default();
        let t = sentinel.clone();
        bus.subscribe(move |ping: &Ping| t.push(ping.0))
            .expect("subscribe");

        for value in 1..=3 {
            bus.publish(Ping(value)).expect("publish");
        }
        assert_eq!(sentinel.wait_for(3), vec![1, 2, 3], "{}", strategy);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(seen.values(), vec![1], "{}", strategy);
    });
}

#[test]
fn test_no_new_deliveries_after_unsubscribe_returns() {
    for_each_strategy(|strategy, bus| {
        let seen = Recorder::default();
        let s = seen.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| {
                thread::sleep(Duration::from_millis(5));
                s.push(ping.0);
            })
            .expect("subscribe");

        if strategy.is_synchronous() {
            bus.publish(Ping(0)).expect("publish");
            handle.unsubscribe();
            bus.publish(Ping(1)).expect("publish");
            assert_eq!(seen.values(), vec![0], "{}", strategy);
            return;
        }

        bus.publish_all((0..20).map(Ping)).expect("publish_all");
        assert!(eventually(|| seen.len() >= 1), "{}", strategy);
        handle.unsubscribe();
        // At most the delivery already running may still finish
        let at_cancel = seen.len();
        thread::sleep(Duration::from_millis(100));
        let after = seen.len();
        assert!(after <= at_cancel + 1, "{}: {} -> {}", strategy, at_cancel, after);
        assert!(after < 20, "{}", strategy);
    });
}

#[test]
fn test_unsubscribe_closure_cancels() {
    for_each_strategy(|strategy, bus| {
        let seen = Recorder::default();
        let s = seen.clone();
        let cancel = bus
            .subscribe(move |ping: &Ping| s.push(ping.0))
            .expect("subscribe")
            .into_fn();

        cancel();
        cancel();
        bus.publish(Ping(1)).expect("publish");
        thread::sleep(Duration::from_millis(20));
        assert!(seen.values().is_empty(), "{}", strategy);
    });
}

#[test]
fn test_immediate_unsubscribe_beside_unrelated_subscriber() {
    for_each_strategy(|strategy, bus| {
        let cancelled = Recorder::default();
        let c = cancelled.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| c.push(ping.0))
            .expect("subscribe");

        let unrelated = Recorder::default();
        let u = unrelated.clone();
        bus.subscribe(move |pong: &Pong| u.push(pong.0))
            .expect("subscribe");

        handle.unsubscribe();
        for value in 1..=3 {
            assert_eq!(bus.publish(Ping(value)).expect("publish"), 0, "{}", strategy);
        }

        thread::sleep(Duration::from_millis(20));
        assert!(cancelled.values().is_empty(), "{}", strategy);
        assert!(unrelated.values().is_empty(), "{}", strategy);
        assert_eq!(bus.stats().delivered, 0, "{}", strategy);
    });
}
