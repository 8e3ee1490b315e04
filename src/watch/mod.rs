//! Watch delivery engine.
//!
//! A [`WatchNotifier`] serializes the deliveries of one subscription into a
//! [`WatchSink`], coalescing updates the consumer has not caught up with.
//! The lifetime of a subscription is bounded by a [`WatchContext`].

mod context;
mod notifier;
mod sink;

pub use context::*;
pub use notifier::*;
pub use sink::*;


use crate::HealthError;
use crate::Status;

/// One delivery: a status, or the terminal error of the subscription.
pub type WatchUpdate = std::result::Result<Status, HealthError>;
