use parking_lot::Mutex;
use rampage_messaging::{AnyMessageBus, BusConfig, MessageBus, Strategy};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::support::{eventually, for_each_strategy, Lane, Ping, Pong, Recorder, TIMEOUT};

#[test]
fn test_messages_only_reach_their_exact_type() {
    for_each_strategy(|strategy, bus| {
        let pings = Recorder::default();
        let pongs = Recorder::default();
        let lanes = Recorder::default();

        let p = pings.clone();
        bus.subscribe(move |ping: &Ping| p.push(ping.0))
            .expect("subscribe");
        let p = pongs.clone();
        bus.subscribe(move |pong: &Pong| p.push(pong.0))
            .expect("subscribe");
        let l = lanes.clone();
        bus.subscribe(move |lane: &Lane<1>| l.push(lane.0))
            .expect("subscribe");

        bus.publish(Ping(1)).expect("publish");
        bus.publish(Pong(2)).expect("publish");
        // Same shape, different type parameter
        assert_eq!(bus.publish(Lane::<0>(3)).expect("publish"), 0);
        bus.publish(Lane::<1>(4)).expect("publish");

        assert_eq!(pings.wait_for(1), vec![1], "{}", strategy);
        assert_eq!(pongs.wait_for(1), vec![2], "{}", strategy);
        assert_eq!(lanes.wait_for(1), vec![4], "{}", strategy);
    });
}

#[test]
fn test_panicking_handler_does_not_affect_others() {
    for_each_strategy(|strategy, bus| {
        bus.subscribe(|ping: &Ping| {
            if ping.0 % 2 == 1 {
                panic!("odd ping {}", ping.0);
            }
        })
        .expect("subscribe");

        let survivor = Recorder::default();
        let s = survivor.clone();
        bus.subscribe(move |ping: &Ping| s.push(ping.0))
            .expect("subscribe");

        for value in 1..=4 {
            assert_eq!(bus.publish(Ping(value)).expect("publish"), 2, "{}", strategy);
        }

        assert_eq!(survivor.wait_for(4), vec![1, 2, 3, 4], "{}", strategy);
        assert!(eventually(|| bus.stats().faulted == 2), "{}", strategy);
        assert!(eventually(|| bus.stats().delivered == 6), "{}", strategy);
        assert_eq!(bus.subscriber_count(), 2, "{}", strategy);
    });
}

#[test]
fn test_stalled_handler_does_not_starve_other_subscribers() {
    // Inline, data-parallel and event-loop buses wait on the stalled handler
    // by construction; the asynchronous pool and task buses must not, even
    // with fewer workers than stalled handlers.
    const STALLED: usize = 3;

    for strategy in [Strategy::Parallel, Strategy::Task] {
        let bus = AnyMessageBus::from_config(&BusConfig {
            worker_threads: 1,
            ..BusConfig::for_strategy(strategy)
        })
        .expect("bus");

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        for _ in 0..STALLED {
            let release_rx = release_rx.clone();
            bus.subscribe(move |_: &Ping| {
                release_rx.lock().recv_timeout(TIMEOUT).ok();
            })
            .expect("subscribe");
        }

        let healthy = Recorder::default();
        let h = healthy.clone();
        bus.subscribe(move |ping: &Ping| h.push(ping.0))
            .expect("subscribe");

        for value in 1..=3 {
            bus.publish(Ping(value)).expect("publish");
        }
        assert_eq!(healthy.wait_for(3), vec![1, 2, 3], "{}", strategy);

        for _ in 0..STALLED * 3 {
            release_tx.send(()).ok();
        }
        let expected = ((STALLED + 1) * 3) as u64;
        assert!(
            eventually(|| bus.stats().delivered == expected),
            "{}",
            strategy
        );
    }
}

#[test]
fn test_slow_subscriber_does_not_reorder_fast_one() {
    for_each_strategy(|strategy, bus| {
        let slow = Recorder::default();
        let s = slow.clone();
        bus.subscribe(move |ping: &Ping| {
            std::thread::sleep(Duration::from_millis(5));
            s.push(ping.0);
        })
        .expect("subscribe");

        let fast = Recorder::default();
        let f = fast.clone();
        bus.subscribe(move |ping: &Ping| f.push(ping.0))
            .expect("subscribe");

        bus.publish_all((1..=5).map(Ping)).expect("publish_all");
        assert_eq!(fast.wait_for(5), vec![1, 2, 3, 4, 5], "{}", strategy);
        assert_eq!(slow.wait_for(5), vec![1, 2, 3, 4, 5], "{}", strategy);
    });
}
