//! Persistence port traits.
//!
//! Backend-independent contracts for order and product storage. Two
//! guarantees the lifecycle's concurrency model needs are part of the
//! contract itself, not the implementations' goodwill:
//!
//! - `insert_order` assigns the sequential order number atomically on the
//!   insert path (no read-then-increment race) and enforces checkout-key
//!   uniqueness, and
//! - `decrement_stock` is a single conditional operation, so concurrent
//!   checkouts on the same product can never drive stock negative.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::errors::StoreResult;
use crate::order::{
    BuyerSnapshot, Order, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, ShippingAddress,
    ShippingSelection,
};
use crate::product::Product;
use crate::types::{BuyerId, CheckoutKey, OrderId, OrderNumber, ProductId, Quantity, Revision, Timestamp};

/// What a conditional stock decrement did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTaken {
    /// Units actually removed (may be less than requested under
    /// [`OverdrawPolicy::Clamp`]).
    pub taken: u32,
    /// Stock remaining after the decrement.
    pub remaining: u32,
}

/// What to do when a decrement asks for more than is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverdrawPolicy {
    /// Fail the decrement with `InsufficientStock`. The default: a checkout
    /// for 3 units of a 1-unit product loses, explicitly.
    #[default]
    Reject,
    /// Take whatever is available, flooring stock at zero, for
    /// deployments that would rather oversell than lose the sale.
    Clamp,
}

/// Input to [`OrderStore::insert_order`].
///
/// Everything the caller decides; the store supplies the order number and
/// the initial revision. Status fields are not here on purpose: a new order
/// is always `Pending`/`Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Pre-generated order id.
    pub id: OrderId,
    /// Buyer snapshot.
    pub buyer: BuyerSnapshot,
    /// Cart line snapshots.
    pub lines: Vec<CartLine>,
    /// Computed money breakdown.
    pub totals: OrderTotals,
    /// Chosen billing method.
    pub payment_method: PaymentMethod,
    /// Shipping method snapshot.
    pub shipping: ShippingSelection,
    /// Destination address.
    pub address: ShippingAddress,
    /// Initial notes.
    pub notes: Option<String>,
    /// Checkout idempotency key, when the caller supplies one.
    pub checkout_key: Option<CheckoutKey>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl NewOrder {
    /// Materializes the order record with its store-assigned number.
    ///
    /// This is the single place the initial state is defined: status
    /// `Pending`, payment `Pending`, revision zero, no milestone stamps.
    pub fn into_order(self, number: OrderNumber) -> Order {
        Order {
            id: self.id,
            number,
            buyer: self.buyer,
            lines: self.lines,
            totals: self.totals,
            status: OrderStatus::Pending,
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_refs: None,
            shipping: self.shipping,
            address: self.address,
            tracking_code: None,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.created_at,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            revision: Revision::initial(),
        }
    }
}

/// Port interface for order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order, assigning the next sequential order number
    /// atomically.
    ///
    /// When `checkout_key` is set and was already used, fails with
    /// `StoreError::DuplicateCheckout` carrying the original order's id,
    /// so the caller resolves the retry to that order instead of creating
    /// a second one.
    async fn insert_order(&self, new_order: NewOrder) -> StoreResult<Order>;

    /// Fetches an order by id.
    async fn order(&self, id: &OrderId) -> StoreResult<Option<Order>>;

    /// Fetches an order by its human-facing number.
    async fn order_by_number(&self, number: OrderNumber) -> StoreResult<Option<Order>>;

    /// All orders placed by one buyer, most recent first.
    async fn orders_for_buyer(&self, buyer: &BuyerId) -> StoreResult<Vec<Order>>;

    /// Every order in the store, most recent first.
    async fn all_orders(&self) -> StoreResult<Vec<Order>>;

    /// Writes an order under optimistic concurrency.
    ///
    /// Fails with `RevisionConflict` when the stored revision differs from
    /// `expected`; on success the stored (and returned) order carries
    /// `expected.next()`.
    async fn update_order(&self, order: &Order, expected: Revision) -> StoreResult<Order>;
}

/// Port interface for product persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fetches a product by id.
    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>>;

    /// Every product in the catalog.
    async fn all_products(&self) -> StoreResult<Vec<Product>>;

    /// Creates or replaces a product record.
    async fn upsert_product(&self, product: &Product) -> StoreResult<()>;

    /// Atomically removes up to `quantity` units of stock.
    ///
    /// A single conditional operation: concurrent decrements serialize at
    /// the storage layer and stock never goes negative. Behavior on
    /// shortfall is chosen by `policy`.
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: Quantity,
        policy: OverdrawPolicy,
    ) -> StoreResult<StockTaken>;

    /// Unconditionally returns units of stock. The compensating half of
    /// `decrement_stock`, used on cancellation/refund and reservation
    /// rollback. Returns the new stock level.
    async fn restore_stock(&self, id: &ProductId, quantity: Quantity) -> StoreResult<u32>;
}
