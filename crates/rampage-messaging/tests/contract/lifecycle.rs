use rampage_messaging::{AnyMessageBus, BusConfig, MessageBus, MessagingError, Strategy};
use std::thread;
use std::time::Duration;

use crate::support::{for_each_strategy, Ping, Recorder};

#[test]
fn test_disposed_bus_rejects_new_work() {
    for_each_strategy(|strategy, bus| {
        let seen = Recorder::default();
        let s = seen.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| s.push(ping.0))
            .expect("subscribe");

        bus.dispose();
        assert!(bus.is_disposed(), "{}", strategy);
        assert_eq!(bus.subscriber_count(), 0, "{}", strategy);

        assert!(
            matches!(bus.publish(Ping(1)), Err(MessagingError::Disposed)),
            "{}",
            strategy
        );
        assert!(
            matches!(bus.publish_all(vec![Ping(2)]), Err(MessagingError::Disposed)),
            "{}",
            strategy
        );
        assert!(
            matches!(bus.subscribe(|_: &Ping| {}), Err(MessagingError::Disposed)),
            "{}",
            strategy
        );

        // Cancelling after disposal is a harmless no-op
        assert!(!handle.unsubscribe(), "{}", strategy);

        thread::sleep(Duration::from_millis(20));
        assert!(seen.values().is_empty(), "{}", strategy);
    });
}

#[test]
fn test_dispose_twice_is_harmless() {
    for_each_strategy(|strategy, bus| {
        bus.dispose();
        bus.dispose();
        assert!(bus.is_disposed(), "{}", strategy);
    });
}

#[test]
fn test_handle_outliving_bus_is_harmless() {
    for strategy in Strategy::ALL {
        let bus = AnyMessageBus::for_strategy(strategy).expect("bus");
        let handle = bus.subscribe(|_: &Ping| {}).expect("subscribe");
        drop(bus);
        assert!(!handle.unsubscribe(), "{}", strategy);
    }
}

#[test]
fn test_stats_after_quiescence() {
    for_each_strategy(|strategy, bus| {
        let seen = Recorder::default();
        let s = seen.clone();
        let handle = bus
            .subscribe(move |ping: &Ping| s.push(ping.0))
            .expect("subscribe");
        bus.subscribe(|_: &Ping| {}).expect("subscribe");

        bus.publish_all((0..5).map(Ping)).expect("publish_all");
        seen.wait_for(5);
        handle.unsubscribe();

        let stats = bus.stats();
        assert_eq!(stats.published, 5, "{}", strategy);
        assert_eq!(stats.subscribers, 1, "{}", strategy);
        assert_eq!(stats.faulted, 0, "{}", strategy);
    });
}

#[test]
fn test_config_drives_construction() {
    let config = BusConfig {
        worker_threads: 2,
        thread_name: "configured".to_string(),
        ..BusConfig::for_strategy(Strategy::Parallel)
    };
    let bus = AnyMessageBus::from_config(&config).expect("bus");
    assert!(matches!(bus, AnyMessageBus::Parallel(_)));

    let invalid = BusConfig {
        worker_threads: 100_000,
        ..config
    };
    assert!(matches!(
        AnyMessageBus::from_config(&invalid),
        Err(MessagingError::Config(_))
    ));
}
