//! Order records and the status state machine.
//!
//! An order is a persisted snapshot of one checkout attempt. It is never
//! deleted and never re-priced: only status, payment fields, tracking and
//! notes change after creation, and status changes only along the explicit
//! transition table in [`OrderStatus::allowed_transitions`].

use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::money::{Money, MoneyError};
use crate::payment::PaymentRefs;
use crate::types::{BuyerId, OrderId, OrderNumber, Revision, Timestamp, TrackingCode};

/// Business-visible fulfillment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting payment settlement.
    Pending,
    /// Payment settled; awaiting fulfillment.
    Paid,
    /// Handed to the carrier.
    Shipped,
    /// Received by the buyer.
    Delivered,
    /// Cancelled before fulfillment; stock restored.
    Cancelled,
    /// Refunded after payment; stock restored.
    Refunded,
}

impl OrderStatus {
    /// The statuses this one may move to.
    ///
    /// This is the whole state machine: `Pending` is the only initial
    /// state, `Cancelled` and `Refunded` are terminal, and once an order is
    /// shipped it can only move forward.
    pub const fn allowed_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid, Self::Cancelled],
            Self::Paid => &[Self::Shipped, Self::Cancelled, Self::Refunded],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    /// Whether the table allows moving from this status to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether an order in this status may still be cancelled.
    pub const fn cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(name)
    }
}

/// The payment gateway's view of a charge's settlement state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Charge created, not yet settled.
    Pending,
    /// Settlement confirmed by the gateway.
    Confirmed,
    /// Funds received.
    Received,
    /// Past due without settlement.
    Overdue,
    /// Charge cancelled at the gateway.
    Cancelled,
    /// Charge refunded at the gateway.
    Refunded,
}

impl PaymentStatus {
    /// The order status this payment status drives the order to, if any.
    ///
    /// `Pending` and `Overdue` leave the order alone.
    pub const fn order_status_effect(self) -> Option<OrderStatus> {
        match self {
            Self::Confirmed | Self::Received => Some(OrderStatus::Paid),
            Self::Cancelled => Some(OrderStatus::Cancelled),
            Self::Refunded => Some(OrderStatus::Refunded),
            Self::Pending | Self::Overdue => None,
        }
    }

    /// Whether this status means the buyer's money arrived.
    pub const fn settles(self) -> bool {
        matches!(self, Self::Confirmed | Self::Received)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Received => "RECEIVED",
            Self::Overdue => "OVERDUE",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(name)
    }
}

/// How the buyer chose to pay. Pass-through to the gateway, not business
/// logic here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Instant bank transfer with QR code.
    Pix,
    /// Credit card.
    CreditCard,
    /// Debit card.
    DebitCard,
    /// Printable bank slip.
    Boleto,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pix => "PIX",
            Self::CreditCard => "CREDIT_CARD",
            Self::DebitCard => "DEBIT_CARD",
            Self::Boleto => "BOLETO",
        };
        f.write_str(name)
    }
}

/// Buyer identity captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerSnapshot {
    /// Identity-provider id.
    pub id: BuyerId,
    /// Name at checkout time.
    pub name: String,
    /// Email at checkout time.
    pub email: String,
    /// Phone at checkout time, for WhatsApp notifications.
    pub phone: Option<String>,
}

/// The shipping method chosen at checkout, frozen on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    /// Carrier/service label ("Correios SEDEX").
    pub carrier: String,
    /// Quoted cost.
    pub cost: Money,
    /// Quoted delivery estimate in days.
    pub estimated_days: u32,
}

/// Destination address captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Street name.
    pub street: String,
    /// Street number.
    pub number: String,
    /// Apartment/unit, when any.
    pub complement: Option<String>,
    /// Neighborhood.
    pub neighborhood: String,
    /// City.
    pub city: String,
    /// State code.
    pub state: String,
    /// Postal code (CEP).
    pub postal_code: String,
}

/// The money breakdown of an order.
///
/// Constructed only through [`OrderTotals::compute`], which enforces
/// `total == max(0, subtotal + shipping - discount)`. Deserialization
/// re-checks the clamp so a hand-edited record cannot smuggle in a broken
/// total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    subtotal: Money,
    shipping: Money,
    discount: Money,
    total: Money,
}

impl OrderTotals {
    /// Computes totals from line snapshots plus shipping and discount.
    ///
    /// The subtotal is the sum of effective unit price x quantity over the
    /// lines, computed here, once, and never again from catalog prices.
    pub fn compute(lines: &[CartLine], shipping: Money, discount: Money) -> Result<Self, MoneyError> {
        let subtotal = lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.add(&line.line_total()?))?;
        let total = subtotal.add(&shipping)?.saturating_sub(&discount);
        Ok(Self {
            subtotal,
            shipping,
            discount,
            total,
        })
    }

    /// Sum of line totals.
    pub const fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Shipping cost.
    pub const fn shipping(&self) -> Money {
        self.shipping
    }

    /// Discount applied.
    pub const fn discount(&self) -> Money {
        self.discount
    }

    /// Amount charged: `max(0, subtotal + shipping - discount)`.
    pub const fn total(&self) -> Money {
        self.total
    }
}

impl<'de> Deserialize<'de> for OrderTotals {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            subtotal: Money,
            shipping: Money,
            discount: Money,
            total: Money,
        }

        let raw = Raw::deserialize(deserializer)?;
        let expected = raw
            .subtotal
            .add(&raw.shipping)
            .map_err(serde::de::Error::custom)?
            .saturating_sub(&raw.discount);
        if raw.total != expected {
            return Err(serde::de::Error::custom(format!(
                "order total {} does not match subtotal {} + shipping {} - discount {}",
                raw.total, raw.subtotal, raw.shipping, raw.discount
            )));
        }
        Ok(Self {
            subtotal: raw.subtotal,
            shipping: raw.shipping,
            discount: raw.discount,
            total: raw.total,
        })
    }
}

/// A transition the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionDenied {
    /// Status the order was in.
    pub from: OrderStatus,
    /// Status that was requested.
    pub to: OrderStatus,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Store-assigned sequential number shown to humans.
    pub number: OrderNumber,
    /// Buyer snapshot.
    pub buyer: BuyerSnapshot,
    /// Line snapshots from the cart.
    pub lines: Vec<CartLine>,
    /// Money breakdown, frozen at creation.
    pub totals: OrderTotals,
    /// Fulfillment status.
    pub status: OrderStatus,
    /// How the buyer pays.
    pub payment_method: PaymentMethod,
    /// Gateway settlement state.
    pub payment_status: PaymentStatus,
    /// External gateway references (charge id, QR, links).
    pub payment_refs: Option<PaymentRefs>,
    /// Shipping method snapshot.
    pub shipping: ShippingSelection,
    /// Destination address snapshot.
    pub address: ShippingAddress,
    /// Carrier tracking code, once shipped.
    pub tracking_code: Option<TrackingCode>,
    /// Free-text notes; cancellation reasons are appended here.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// When payment settled, stamped once.
    pub paid_at: Option<Timestamp>,
    /// When the order was shipped.
    pub shipped_at: Option<Timestamp>,
    /// When the order was delivered.
    pub delivered_at: Option<Timestamp>,
    /// Optimistic-concurrency token, bumped by every store write.
    pub revision: Revision,
}

impl Order {
    /// Moves the order to `next`, enforcing the transition table and
    /// stamping the milestone timestamp of the target state.
    ///
    /// `paid_at` is stamped only if unset, so re-confirmations cannot
    /// overwrite the original settlement time.
    pub fn transition(&mut self, next: OrderStatus, now: Timestamp) -> Result<(), TransitionDenied> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionDenied {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        self.updated_at = now;
        match next {
            OrderStatus::Paid => self.mark_paid(now),
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    /// Stamps `paid_at` if it has not been stamped yet.
    pub fn mark_paid(&mut self, now: Timestamp) {
        if self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
    }

    /// Appends a line of free text to the order notes.
    pub fn append_note(&mut self, text: &str) {
        match &mut self.notes {
            Some(notes) => {
                notes.push('\n');
                notes.push_str(text);
            }
            None => self.notes = Some(text.to_string()),
        }
    }

    /// Whether the order produced revenue (payment settled at some point).
    pub const fn has_settled_payment(&self) -> bool {
        self.paid_at.is_some()
    }
}
