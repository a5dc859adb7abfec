//! Lifecycle events and fire-and-forget notification dispatch.
//!
//! The lifecycle manager emits an [`OrderEvent`] after each successful
//! transition; the dispatcher fans events out to registered channels
//! (email, WhatsApp) on spawned tasks. Delivery failures are logged and
//! swallowed: an order's success is never entangled with a notification's.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::order::Order;

/// Error returned by a notification channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The channel failed to deliver.
    #[error("notification channel '{channel}' failed: {message}")]
    Delivery {
        /// Channel name.
        channel: String,
        /// Failure description.
        message: String,
    },
}

/// A lifecycle transition worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// An order was created.
    Created(Order),
    /// Payment settled.
    PaymentConfirmed(Order),
    /// The order was handed to the carrier.
    Shipped(Order),
    /// The order reached the buyer.
    Delivered(Order),
    /// The order was cancelled.
    Cancelled {
        /// The cancelled order.
        order: Order,
        /// Reason given, when any.
        reason: Option<String>,
    },
    /// The order was refunded.
    Refunded(Order),
}

impl OrderEvent {
    /// The order this event is about.
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created(order)
            | Self::PaymentConfirmed(order)
            | Self::Shipped(order)
            | Self::Delivered(order)
            | Self::Cancelled { order, .. }
            | Self::Refunded(order) => order,
        }
    }

    /// Stable name for logs and routing.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "order_created",
            Self::PaymentConfirmed(_) => "payment_confirmed",
            Self::Shipped(_) => "order_shipped",
            Self::Delivered(_) => "order_delivered",
            Self::Cancelled { .. } => "order_cancelled",
            Self::Refunded(_) => "order_refunded",
        }
    }
}

/// A notification channel (email, WhatsApp, webhook...).
///
/// Implementations live outside the core; they get the full event and
/// decide what, if anything, to send.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name, for logs.
    fn channel(&self) -> &str;

    /// Delivers one event.
    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotifyError>;
}

/// Fans lifecycle events out to every registered channel.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// A dispatcher with no channels; `dispatch` becomes a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel.
    #[must_use]
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.notifiers.len()
    }

    /// Dispatches an event to every channel on spawned tasks and returns
    /// immediately.
    ///
    /// Must run inside a tokio runtime; lifecycle operations always do.
    pub fn dispatch(&self, event: &OrderEvent) {
        for notifier in &self.notifiers {
            let notifier = Arc::clone(notifier);
            let event = event.clone();
            tokio::spawn(async move {
                match notifier.deliver(&event).await {
                    Ok(()) => debug!(
                        channel = notifier.channel(),
                        event = event.kind(),
                        order_id = %event.order().id,
                        "notification delivered"
                    ),
                    Err(err) => warn!(
                        channel = notifier.channel(),
                        event = event.kind(),
                        order_id = %event.order().id,
                        error = %err,
                        "notification delivery failed"
                    ),
                }
            });
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("channels", &self.notifiers.len())
            .finish()
    }
}
