//! Change notification for the GameState Service.
//!
//! Every successful write to the state store produces one [`ChangeEvent`],
//! which the [`ChangeNotifier`] fans out to the subscribers attached at that
//! moment. There is no replay: a subscriber only sees events published after
//! it attached.
//!
//! Each subscriber owns a bounded channel, so a slow consumer can only lose
//! its own oldest events and never stalls publishing or other subscribers.
//! Per-subscriber delivery order always matches publish order.

pub mod event;
pub mod notifier;

pub use event::ChangeEvent;
pub use notifier::{ChangeNotifier, NotifierConfig, SubscriberId, Subscription, SubscriptionFilter};
