use rampage_messaging::{MessageBus, Unsubscribe};
use std::thread;
use std::time::Duration;

use crate::support::{eventually, for_each_strategy, Ping, Pong, Recorder};

const PUBLISHED: u32 = 300;
const ROUNDS: usize = 60;

/// Each value is one more than the previous
fn is_consecutive(log: &[u32]) -> bool {
    log.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

#[test]
fn test_subscribe_and_unsubscribe_while_publishing() {
    for_each_strategy(|strategy, bus| {
        let mut live: Vec<(Unsubscribe, Recorder)> = Vec::new();
        let mut cancelled: Vec<Recorder> = Vec::new();
        let pongs = Recorder::default();
        let mut pong_subscribers = 0;

        thread::scope(|scope| {
            scope.spawn(|| {
                for value in 0..PUBLISHED {
                    bus.publish(Ping(value)).expect("publish");
                }
            });

            for round in 0..ROUNDS {
                let recorder = Recorder::default();
                let r = recorder.clone();
                let handle = bus
                    .subscribe(move |ping: &Ping| r.push(ping.0))
                    .expect("subscribe");
                live.push((handle, recorder));

                if round % 3 == 2 {
                    let (handle, recorder) = live.remove(0);
                    assert!(handle.unsubscribe(), "{}", strategy);
                    cancelled.push(recorder);
                }
                if round % 10 == 0 {
                    let p = pongs.clone();
                    bus.subscribe(move |pong: &Pong| p.push(pong.0))
                        .expect("subscribe");
                    pong_subscribers += 1;
                }
                thread::sleep(Duration::from_micros(200));
            }
        });

        // Every survivor was subscribed before this publish, so its log must
        // run without gaps up to it.
        bus.publish(Ping(PUBLISHED)).expect("publish");
        for (_, recorder) in &live {
            assert!(
                eventually(|| recorder.values().last() == Some(&PUBLISHED)),
                "{}",
                strategy
            );
            let log = recorder.values();
            assert!(is_consecutive(&log), "{}: {:?}", strategy, log);
        }

        // Cancelled subscribers saw one unbroken run, possibly empty
        for recorder in &cancelled {
            let log = recorder.values();
            assert!(is_consecutive(&log), "{}: {:?}", strategy, log);
            assert!(!log.contains(&PUBLISHED), "{}", strategy);
        }

        assert!(pongs.values().is_empty(), "{}", strategy);
        assert_eq!(
            bus.subscriber_count(),
            live.len() + pong_subscribers,
            "{}",
            strategy
        );
    });
}
