//! RTD feed thread.
//!
//! `RtdFeed::start` spawns a background publisher and returns a `FeedHandle`.
//! The host sends `FeedCommand::Subscribe` for every RTD formula it evaluates;
//! once a topic's initial delay has passed the feed publishes a `Tick` for it on
//! every interval, random-walking the price. Quiet topics never publish.
//!
//! Event model:
//! - `FeedEvent::Update(Tick)` — a new value for one topic.
//! - `FeedEvent::Shutdown` — the feed stopped; no further updates follow.
use std::collections::{HashMap, HashSet};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, info};
use rtd_common::defaults;

use crate::model::tick::{Tick, next_price};
use crate::model::topic::Topic;

/// Behaviour of the simulated provider.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Program identifier the provider is registered under.
    pub provider_id: String,
    /// Delay between subscription and the first published value.
    pub publish_after: Duration,
    /// Interval between two values of the same topic.
    pub tick_interval: Duration,
    /// Starting price of every topic.
    pub initial_price: f64,
    /// Tickers that never publish.
    pub quiet_tickers: HashSet<String>,
    /// Individual topics that never publish.
    pub quiet_topics: HashSet<Topic>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            provider_id: defaults::PROG_ID.to_string(),
            publish_after: Duration::from_millis(300),
            tick_interval: Duration::from_millis(100),
            initial_price: 100.0,
            quiet_tickers: HashSet::new(),
            quiet_topics: HashSet::new(),
        }
    }
}

impl FeedConfig {
    /// Config for a provider registered as `provider_id`.
    pub fn new(provider_id: &str) -> Self {
        FeedConfig {
            provider_id: provider_id.to_string(),
            ..FeedConfig::default()
        }
    }

    /// Sets the delay before the first value.
    pub fn publish_after(mut self, delay: Duration) -> Self {
        self.publish_after = delay;
        self
    }

    /// Silences a whole ticker (`"AAPL"`) or a single topic (`"AAPL:Bid"`).
    pub fn quiet(mut self, rule: &str) -> Self {
        match rule.trim().split_once(':') {
            Some((ticker, field)) => {
                self.quiet_topics.insert(Topic::new(ticker.trim(), field.trim()));
            }
            None if !rule.trim().is_empty() => {
                self.quiet_tickers.insert(rule.trim().to_string());
            }
            None => {}
        }
        self
    }

    /// Whether `topic` never publishes.
    pub fn is_quiet(&self, topic: &Topic) -> bool {
        self.quiet_tickers.contains(&topic.ticker) || self.quiet_topics.contains(topic)
    }
}

/// Request sent to the feed thread.
#[derive(Debug, Clone)]
pub enum FeedCommand {
    /// Start publishing `Topic`.
    Subscribe(Topic),
    /// Stop the thread.
    Shutdown,
}

/// Message sent by the feed thread.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// New value for one topic.
    Update(Tick),
    /// The feed stopped.
    Shutdown,
}

struct Subscription {
    next_publish: Instant,
    price: f64,
}

/// Background provider.
pub struct RtdFeed;

impl RtdFeed {
    /// Spawns the feed thread.
    pub fn start(config: FeedConfig) -> FeedHandle {
        let (command_tx, command_rx) = unbounded::<FeedCommand>();
        let (event_tx, event_rx) = unbounded::<FeedEvent>();
        let thread = thread::spawn(move || run(config, command_rx, event_tx));
        FeedHandle {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        }
    }
}

fn run(config: FeedConfig, commands: Receiver<FeedCommand>, events: Sender<FeedEvent>) {
    info!("RTD feed `{}` started", config.provider_id);
    let mut subscriptions: HashMap<Topic, Subscription> = HashMap::new();

    loop {
        match commands.recv_timeout(config.tick_interval) {
            Ok(FeedCommand::Subscribe(topic)) => {
                debug!("Feed subscription for {}", topic);
                subscriptions.entry(topic).or_insert(Subscription {
                    next_publish: Instant::now() + config.publish_after,
                    price: config.initial_price,
                });
            }
            Ok(FeedCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        for (topic, sub) in subscriptions.iter_mut() {
            if now < sub.next_publish || config.is_quiet(topic) {
                continue;
            }
            sub.price = next_price(sub.price);
            sub.next_publish = now + config.tick_interval;
            if events.send(FeedEvent::Update(Tick::new(topic, sub.price))).is_err() {
                return;
            }
        }
    }

    let _ = events.send(FeedEvent::Shutdown);
    info!("RTD feed `{}` stopped", config.provider_id);
}

/// Owner side of a running feed. Dropping it stops the thread.
pub struct FeedHandle {
    commands: Sender<FeedCommand>,
    events: Receiver<FeedEvent>,
    thread: Option<JoinHandle<()>>,
}

impl FeedHandle {
    /// Asks the feed to publish `topic`.
    pub fn subscribe(&self, topic: Topic) {
        let _ = self.commands.send(FeedCommand::Subscribe(topic));
    }

    /// Every tick published since the last call.
    pub fn drain(&self) -> Vec<Tick> {
        self.events
            .try_iter()
            .filter_map(|event| match event {
                FeedEvent::Update(tick) => Some(tick),
                FeedEvent::Shutdown => None,
            })
            .collect()
    }

    /// Stops the thread and waits for it.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(FeedCommand::Shutdown);
            let _ = thread.join();
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
