//! Broadcast hub for the live and config feeds.
//!
//! Each feed is a [`SubscriberPool`]: a list of unbounded channels, one per
//! spectator connection. Publishing serializes the snapshot once and hands
//! the text to every subscriber. A subscriber whose channel is closed (its
//! socket task is gone) is pruned during that same publish; one dead
//! spectator never stops delivery to the rest.

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use buzzer_core::{ConfigSnapshot, LiveSnapshot};
use serde::Serialize;
use tokio::sync::mpsc;

/// Identifier of one feed subscription.
pub type SubscriberId = u64;

/// Feed message as delivered to subscribers (serialized JSON).
pub type FeedMessage = std::sync::Arc<str>;

/// The two spectator feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Phase, milestones and outcomes.
    Live,
    /// Names and tunables.
    Config,
}

impl Feed {
    /// Feed name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Config => "config",
        }
    }
}

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<FeedMessage>,
}

/// Receiving half of a subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Id to pass to [`SubscriberPool::unsubscribe`].
    pub id: SubscriberId,
    /// Messages published after the subscription was taken.
    pub receiver: mpsc::UnboundedReceiver<FeedMessage>,
}

/// Set of live subscribers for one feed.
pub struct SubscriberPool {
    feed: Feed,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriberPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(feed: Feed) -> Self {
        Self { feed, subscribers: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        // Membership is a plain Vec; a panic mid-push leaves it usable.
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::unbounded_channel();
        self.lock().push(Subscriber { id, tx });

        tracing::debug!(feed = self.feed.as_str(), subscriber = id, "Subscriber added");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;

        if removed {
            tracing::debug!(feed = self.feed.as_str(), subscriber = id, "Subscriber removed");
        }
        removed
    }

    /// Deliver `message` to every subscriber, pruning the dead ones.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, message: &FeedMessage) -> usize {
        let feed = self.feed.as_str();
        let mut subscribers = self.lock();

        subscribers.retain(|s| match s.tx.send(message.clone()) {
            Ok(()) => true,
            Err(_) => {
                tracing::info!(feed, subscriber = s.id, "Pruning disconnected subscriber");
                false
            },
        });
        subscribers.len()
    }

    /// Number of current subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the pool has no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SubscriberPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberPool")
            .field("feed", &self.feed)
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Live and config feed pools.
#[derive(Debug)]
pub struct BroadcastHub {
    live: SubscriberPool,
    config: SubscriberPool,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    /// Create a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self { live: SubscriberPool::new(Feed::Live), config: SubscriberPool::new(Feed::Config) }
    }

    /// Pool for the given feed.
    #[must_use]
    pub fn pool(&self, feed: Feed) -> &SubscriberPool {
        match feed {
            Feed::Live => &self.live,
            Feed::Config => &self.config,
        }
    }

    /// Publish a live snapshot.
    pub fn publish_live(&self, snapshot: &LiveSnapshot) -> usize {
        self.publish(Feed::Live, snapshot)
    }

    /// Publish a config snapshot.
    pub fn publish_config(&self, snapshot: &ConfigSnapshot) -> usize {
        self.publish(Feed::Config, snapshot)
    }

    fn publish<T: Serialize>(&self, feed: Feed, snapshot: &T) -> usize {
        match serde_json::to_string(snapshot) {
            Ok(text) => self.pool(feed).publish(&FeedMessage::from(text)),
            Err(error) => {
                tracing::error!(feed = feed.as_str(), %error, "Failed to serialize snapshot");
                0
            },
        }
    }
}
