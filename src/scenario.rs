//! Fan-out check: N ordered subscribers, K messages, one idle type.

use parking_lot::Mutex;
use rampage_messaging::{AnyMessageBus, BusConfig, BusStats, Message, MessageBus, Strategy};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Message every subscriber receives
#[derive(Debug, Clone)]
pub struct Sequenced(pub u32);
impl Message for Sequenced {}

/// Message type that is subscribed but never published
#[derive(Debug, Clone)]
pub struct Unpublished;
impl Message for Unpublished {}

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub strategy: Strategy,
    pub subscribers: usize,
    pub messages: u32,
    /// Subscribers that received every message in publish order.
    pub ordered: usize,
    /// Invocations of the never-published type's handler.
    pub stray: usize,
    pub elapsed_ms: u128,
    pub stats: BusStats,
}

impl ScenarioReport {
    /// Whether every subscriber saw every message in order and nothing
    /// reached the idle subscriber
    pub fn passed(&self) -> bool {
        self.ordered == self.subscribers && self.stray == 0
    }
}

/// Build a bus from `config`, run the fan-out and tear the bus down
pub fn run_fan_out(
    config: &BusConfig,
    subscribers: usize,
    messages: u32,
    timeout: Duration,
) -> anyhow::Result<ScenarioReport> {
    let bus = AnyMessageBus::from_config(config)?;
    let logs: Vec<Arc<Mutex<Vec<u32>>>> = (0..subscribers)
        .map(|_| Arc::new(Mutex::new(Vec::with_capacity(messages as usize))))
        .collect();

    for (index, log) in logs.iter().enumerate() {
        let log = Arc::clone(log);
        let jitter = index as u64;
        bus.subscribe(move |message: &Sequenced| {
            // Uneven handler latency so asynchronous strategies get a chance
            // to reorder if they were going to
            let micros = (jitter + u64::from(message.0)) % 4 * 25;
            if micros > 0 {
                thread::sleep(Duration::from_micros(micros));
            }
            log.lock().push(message.0);
        })?;
    }

    let stray = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&stray);
    bus.subscribe(move |_: &Unpublished| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;

    let started = Instant::now();
    bus.publish_all((0..messages).map(Sequenced))?;

    let deadline = started + timeout;
    let expected = messages as usize;
    while logs.iter().any(|log| log.lock().len() < expected) {
        if Instant::now() >= deadline {
            tracing::warn!("[{}] timed out waiting for deliveries", config.strategy);
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    let elapsed_ms = started.elapsed().as_millis();

    let ordered = logs
        .iter()
        .filter(|log| {
            let log = log.lock();
            log.len() == expected && log.iter().copied().eq(0..messages)
        })
        .count();

    let stats = bus.stats();
    bus.dispose();

    Ok(ScenarioReport {
        strategy: config.strategy,
        subscribers,
        messages,
        ordered,
        stray: stray.load(Ordering::Relaxed),
        elapsed_ms,
        stats,
    })
}
