use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::event::ChangeEvent;

/// Opaque identity of one attached subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub:{}", self.0)
    }
}

/// Filter restricting which events a subscriber receives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// If set, only events for these keys are delivered.
    pub keys: Option<Vec<String>>,
}

impl SubscriptionFilter {
    /// A filter matching every key.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching only the given keys.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self.keys {
            Some(ref keys) => keys.iter().any(|k| *k == event.key),
            None => true,
        }
    }
}

/// Configuration for the [`ChangeNotifier`].
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// Capacity of each subscriber's channel. A subscriber more than this
    /// many events behind starts losing its oldest events.
    pub channel_capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Registry entry: a filter paired with the subscriber's sending half.
struct Subscriber {
    filter: SubscriptionFilter,
    sender: broadcast::Sender<ChangeEvent>,
}

/// Receiving half handed to an attached subscriber.
///
/// Dropping the subscription detaches it lazily: the notifier prunes it on
/// the next publish.
pub struct Subscription {
    id: SubscriberId,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscriber has been detached and every event
    /// queued before the detach has been consumed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    warn!(subscriber = %self.id, missed, "subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(subscriber = %self.id, missed, "subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Fan-out publisher delivering change events to attached subscribers.
///
/// Publishing reads a consistent snapshot of the registry; attach and detach
/// may race with a publish, in which case the subscriber either sees the
/// whole event or none of it.
pub struct ChangeNotifier {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
    config: NotifierConfig,
}

impl ChangeNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Attach a new subscriber with the given filter.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = broadcast::channel(self.config.channel_capacity.max(1));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Subscriber { filter, sender });
        debug!(subscriber = %id, "subscriber attached");
        Subscription { id, receiver }
    }

    /// Detach a subscriber. Returns `true` if it was attached.
    ///
    /// Events already queued for it remain readable; afterwards its
    /// [`Subscription::recv`] returns `None`.
    pub fn detach(&self, id: SubscriberId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        if removed {
            debug!(subscriber = %id, "subscriber detached");
        }
        removed
    }

    /// Deliver an event to every matching subscriber attached right now.
    ///
    /// Returns the number of subscribers the event was queued for. Having
    /// no subscribers is not an error.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();
        {
            let subs = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for (id, sub) in subs.iter() {
                if !sub.filter.matches(event) {
                    continue;
                }
                // A send error means the subscription was dropped.
                match sub.sender.send(event.clone()) {
                    Ok(_) => delivered += 1,
                    Err(_) => stale.push(*id),
                }
            }
        }

        if !stale.is_empty() {
            let mut subs = self
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in stale {
                if subs.get(&id).is_some_and(|s| s.sender.receiver_count() == 0) {
                    subs.remove(&id);
                    debug!(subscriber = %id, "pruned dropped subscriber");
                }
            }
        }

        debug!(sequence = event.sequence, key = %event.key, delivered, "change published");
        delivered
    }

    /// Number of subscribers currently in the registry.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscriber_count", &self.subscriber_count())
            .field("channel_capacity", &self.config.channel_capacity)
            .finish()
    }
}
