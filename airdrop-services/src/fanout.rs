//! Live update fanout
//!
//! One shared timer refreshes the market snapshot and pushes it to every
//! connected live subscriber. Subscribers are plain bounded channels; a
//! subscriber whose receiving end is gone is pruned on the next push.

use airdrop_core::{MarketDataError, ServerMessage};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::market_cache::MarketDataCache;
use crate::task::BackgroundTask;

/// Outbound buffer per subscriber
const SUBSCRIBER_BUFFER: usize = 32;

/// Unique identifier for a live subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

/// Outcome of pushing one message to every subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose buffer was full; they miss this update only
    pub lagging: usize,
    /// Subscribers removed because their connection was gone
    pub pruned: usize,
}

/// The set of open subscribers
#[derive(Debug)]
struct SubscriberSet {
    next_id: AtomicU64,
    senders: DashMap<SubscriberId, mpsc::Sender<ServerMessage>>,
}

impl SubscriberSet {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            senders: DashMap::new(),
        }
    }

    fn insert(&self, sender: mpsc::Sender<ServerMessage>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.senders.insert(id, sender);
        id
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.senders.remove(&id).is_some()
    }

    fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for entry in self.senders.iter() {
            match entry.value().try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("{} is lagging, dropping this update", entry.key());
                    report.lagging += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    let failure = MarketDataError::SubscriberSendFailure {
                        subscriber: entry.key().0,
                        reason: "connection closed".to_string(),
                    };
                    warn!("{}", failure);
                    closed.push(*entry.key());
                }
            }
        }

        // Removal must wait until the iterator has released its shard locks
        for id in closed {
            if self.remove(id) {
                report.pruned += 1;
            }
        }

        report
    }
}

/// A live subscription
///
/// Dropping it removes the subscriber from the fanout, whichever way the
/// owning connection ends.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ServerMessage>,
    set: Arc<SubscriberSet>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message for this subscriber; `None` once it has been pruned
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.set.remove(self.id) {
            debug!("{} unsubscribed", self.id);
        }
    }
}

/// Pushes market snapshots to all live subscribers
#[derive(Debug)]
pub struct UpdateFanout {
    cache: Arc<MarketDataCache>,
    subscribers: Arc<SubscriberSet>,
    interval: Duration,
}

impl UpdateFanout {
    pub fn new(cache: Arc<MarketDataCache>, interval: Duration) -> Self {
        Self {
            cache,
            subscribers: Arc::new(SubscriberSet::new()),
            interval,
        }
    }

    pub fn cache(&self) -> &Arc<MarketDataCache> {
        &self.cache
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.senders.len()
    }

    /// Open a subscription and push it the stored snapshot, if any.
    ///
    /// No upstream I/O happens here; a cold or stale cache is refreshed by
    /// the next fanout tick.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        if let Some(snapshot) = self.cache.current() {
            // The channel is empty, so this cannot be full
            let _ = tx.try_send(ServerMessage::market_update(&snapshot));
        }

        let id = self.subscribers.insert(tx);
        info!("{} subscribed ({} open)", id, self.subscriber_count());
        Subscription {
            id,
            rx,
            set: Arc::clone(&self.subscribers),
        }
    }

    /// Register a raw sender, for transports that manage their own receiver.
    ///
    /// The caller is responsible for calling [`UpdateFanout::unsubscribe`];
    /// a sender whose receiver is dropped is pruned on the next push anyway.
    pub fn register(&self, sender: mpsc::Sender<ServerMessage>) -> SubscriberId {
        self.subscribers.insert(sender)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }

    /// Push a message to every subscriber, pruning closed ones
    pub fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        self.subscribers.broadcast(message)
    }

    /// Run one fanout round.
    ///
    /// Skipped when nobody is subscribed. Otherwise the cache is asked for a
    /// snapshot (stale data is pushed if upstream is down) and it is pushed
    /// to everyone. Returns `None` when nothing was pushed.
    pub async fn tick(&self) -> Option<BroadcastReport> {
        if self.subscriber_count() == 0 {
            debug!("No live subscribers, skipping fanout tick");
            return None;
        }

        match self.cache.get_snapshot().await {
            Ok(snapshot) => {
                let report = self.broadcast(&ServerMessage::market_update(&snapshot));
                debug!(
                    "Fanout tick: {} delivered, {} lagging, {} pruned",
                    report.delivered, report.lagging, report.pruned
                );
                Some(report)
            }
            Err(e) => {
                warn!("Skipping fanout tick, no snapshot to push: {}", e);
                None
            }
        }
    }

    /// Start the shared timer. The first tick fires one interval from now.
    pub fn spawn(self: Arc<Self>) -> BackgroundTask {
        let period = self.interval;

        BackgroundTask::spawn("fanout", move |mut shutdown_rx| async move {
            info!("Market fanout started, interval {:?}", period);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        // A tick may sit in upstream retries; stop must not wait for it
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            _ = self.tick() => {}
                        }
                    }
                }
            }
            info!("Market fanout stopped");
        })
    }
}
