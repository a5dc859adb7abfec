//! The order lifecycle manager.
//!
//! Orchestrates the path from cart snapshot to terminal order state:
//! stock reservation, order insertion, payment-status reconciliation and
//! the compensating stock restoration of cancellation/refund. All
//! collaborators are injected (an instance holds its stores, ledger and
//! dispatcher rather than importing ambient singletons), so the state
//! machine is unit-testable against any store implementation.
//!
//! Every mutation runs under optimistic concurrency: load, change, write
//! with the loaded revision, and on a conflict reload and reapply within
//! the configured retry budget. A webhook-driven payment update and an
//! admin fulfillment update racing on one order resolve to exactly one
//! winner per write.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::cart::CartLine;
use crate::errors::{LifecycleError, LifecycleResult, StoreError};
use crate::inventory::InventoryLedger;
use crate::money::Money;
use crate::notify::{NotificationDispatcher, OrderEvent};
use crate::order::{
    BuyerSnapshot, Order, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, ShippingAddress,
    ShippingSelection,
};
use crate::payment::PaymentRefs;
use crate::retry::RetryStrategy;
use crate::store::{NewOrder, OrderStore};
use crate::types::{BuyerId, CheckoutKey, OrderId, Timestamp, TrackingCode};

/// Everything a checkout hands to [`OrderLifecycle::create_order`].
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Buyer identity snapshot.
    pub buyer: BuyerSnapshot,
    /// Cart line snapshots; must be non-empty.
    pub lines: Vec<CartLine>,
    /// Chosen billing method.
    pub payment_method: PaymentMethod,
    /// Chosen shipping method (carries the shipping cost).
    pub shipping: ShippingSelection,
    /// Destination address.
    pub address: ShippingAddress,
    /// Discount to apply; the total clamps at zero.
    pub discount: Money,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Idempotency key for blind-retry deduplication.
    pub checkout_key: Option<CheckoutKey>,
}

/// Tunables of the lifecycle manager.
#[derive(Debug, Clone, Default)]
pub struct LifecycleConfig {
    /// Backoff for revision-conflicted writes.
    pub retry: RetryStrategy,
}

/// The order lifecycle state machine.
#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    ledger: InventoryLedger,
    dispatcher: NotificationDispatcher,
    config: LifecycleConfig,
}

impl OrderLifecycle {
    /// Creates a manager with no notification channels and default config.
    pub fn new(orders: Arc<dyn OrderStore>, ledger: InventoryLedger) -> Self {
        Self {
            orders,
            ledger,
            dispatcher: NotificationDispatcher::new(),
            config: LifecycleConfig::default(),
        }
    }

    /// Attaches a notification dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Overrides the configuration.
    #[must_use]
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// The inventory ledger this manager compensates through.
    pub const fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// Creates an order from a cart snapshot.
    ///
    /// Stock is reserved before the order is inserted; if the insert fails
    /// the reservation is released, so the operation is atomic from the
    /// caller's point of view. A duplicate checkout key resolves to the
    /// order the first attempt created.
    #[instrument(skip(self, request), fields(buyer = %request.buyer.id, lines = request.lines.len()))]
    pub async fn create_order(&self, request: CheckoutRequest) -> LifecycleResult<Order> {
        let CheckoutRequest {
            buyer,
            lines,
            payment_method,
            shipping,
            address,
            discount,
            notes,
            checkout_key,
        } = request;

        if lines.is_empty() {
            return Err(LifecycleError::EmptyCart);
        }

        let totals = OrderTotals::compute(&lines, shipping.cost, discount)?;
        let reservation = self.ledger.reserve(&lines).await?;

        let new_order = NewOrder {
            id: OrderId::generate(),
            buyer,
            lines,
            totals,
            payment_method,
            shipping,
            address,
            notes,
            checkout_key,
            created_at: Timestamp::now(),
        };

        match self.orders.insert_order(new_order).await {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    number = %order.number,
                    total = %order.totals.total(),
                    "order created"
                );
                self.dispatcher.dispatch(&OrderEvent::Created(order.clone()));
                Ok(order)
            }
            Err(StoreError::DuplicateCheckout { key, existing }) => {
                // A blind retry of the same checkout: hand back the original
                // order and put the duplicate reservation back.
                self.ledger.release(reservation).await;
                debug!(%key, order_id = %existing, "duplicate checkout key, returning existing order");
                self.orders
                    .order(&existing)
                    .await?
                    .ok_or(LifecycleError::OrderNotFound(existing))
            }
            Err(err) => {
                self.ledger.release(reservation).await;
                Err(err.into())
            }
        }
    }

    /// Moves an order to a new fulfillment status.
    ///
    /// The transition table is enforced; `shipped_at`/`delivered_at` are
    /// stamped on the corresponding transition and the tracking code is
    /// stored when given.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        next: OrderStatus,
        tracking: Option<TrackingCode>,
    ) -> LifecycleResult<Order> {
        let mut attempt = 0;
        loop {
            let order = self.load(id).await?;
            let mut updated = order.clone();

            updated
                .transition(next, Timestamp::now())
                .map_err(|denied| LifecycleError::IllegalTransition {
                    order_id: id.clone(),
                    from: denied.from,
                    to: denied.to,
                })?;
            if let Some(code) = tracking.clone() {
                updated.tracking_code = Some(code);
            }

            match self.orders.update_order(&updated, order.revision).await {
                Ok(saved) => {
                    info!(order_id = %saved.id, status = %saved.status, "order status updated");
                    match next {
                        OrderStatus::Shipped => {
                            self.dispatcher.dispatch(&OrderEvent::Shipped(saved.clone()));
                        }
                        OrderStatus::Delivered => {
                            self.dispatcher.dispatch(&OrderEvent::Delivered(saved.clone()));
                        }
                        _ => {}
                    }
                    return Ok(saved);
                }
                Err(StoreError::RevisionConflict { .. })
                    if attempt + 1 < self.config.retry.max_attempts =>
                {
                    attempt += 1;
                    self.wait_out_conflict(id, attempt).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Applies a payment-status change reported by the gateway (webhook or
    /// poll) and derives the order-status effect.
    ///
    /// Settlement stamps `paid_at` once; re-confirmations leave the
    /// original stamp alone and apply no side effect twice. A cancellation
    /// or refund restores stock for every line. A payment status whose
    /// mapped order transition the table forbids (a refund webhook for an
    /// order that never settled, say) is rejected with no mutation.
    #[instrument(skip(self, refs))]
    pub async fn update_payment_status(
        &self,
        id: &OrderId,
        status: PaymentStatus,
        refs: Option<PaymentRefs>,
    ) -> LifecycleResult<Order> {
        let mut attempt = 0;
        loop {
            let order = self.load(id).await?;
            let mut updated = order.clone();
            let now = Timestamp::now();

            updated.payment_status = status;
            if let Some(new_refs) = refs.clone() {
                match &mut updated.payment_refs {
                    Some(existing) => existing.merge(new_refs),
                    slot @ None => *slot = Some(new_refs),
                }
            }

            let mut applied = None;
            if let Some(target) = status.order_status_effect() {
                if updated.status != target {
                    updated
                        .transition(target, now)
                        .map_err(|denied| LifecycleError::IllegalTransition {
                            order_id: id.clone(),
                            from: denied.from,
                            to: denied.to,
                        })?;
                    applied = Some(target);
                }
            }
            updated.updated_at = now;

            match self.orders.update_order(&updated, order.revision).await {
                Ok(saved) => {
                    info!(
                        order_id = %saved.id,
                        payment_status = %saved.payment_status,
                        status = %saved.status,
                        "payment status updated"
                    );
                    if matches!(applied, Some(OrderStatus::Cancelled | OrderStatus::Refunded)) {
                        self.ledger.restore_lines(&saved.lines).await;
                    }
                    match applied {
                        Some(OrderStatus::Paid) => self
                            .dispatcher
                            .dispatch(&OrderEvent::PaymentConfirmed(saved.clone())),
                        Some(OrderStatus::Cancelled) => self.dispatcher.dispatch(&OrderEvent::Cancelled {
                            order: saved.clone(),
                            reason: None,
                        }),
                        Some(OrderStatus::Refunded) => {
                            self.dispatcher.dispatch(&OrderEvent::Refunded(saved.clone()));
                        }
                        _ => {}
                    }
                    return Ok(saved);
                }
                Err(StoreError::RevisionConflict { .. })
                    if attempt + 1 < self.config.retry.max_attempts =>
                {
                    attempt += 1;
                    self.wait_out_conflict(id, attempt).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Cancels an order that has not shipped.
    ///
    /// Rejected with no mutation once the order is `Shipped` or
    /// `Delivered`. On success the order moves to `Cancelled` on both
    /// status fields, the reason lands in the notes and every line's stock
    /// is restored.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, id: &OrderId, reason: Option<&str>) -> LifecycleResult<Order> {
        let mut attempt = 0;
        loop {
            let order = self.load(id).await?;

            if !order.status.cancellable() {
                return Err(LifecycleError::NotCancellable {
                    order_id: id.clone(),
                    status: order.status,
                });
            }

            let mut updated = order.clone();
            let now = Timestamp::now();
            updated
                .transition(OrderStatus::Cancelled, now)
                .map_err(|denied| LifecycleError::IllegalTransition {
                    order_id: id.clone(),
                    from: denied.from,
                    to: denied.to,
                })?;
            updated.payment_status = PaymentStatus::Cancelled;
            if let Some(text) = reason {
                updated.append_note(&format!("Cancelamento: {text}"));
            }

            match self.orders.update_order(&updated, order.revision).await {
                Ok(saved) => {
                    warn!(order_id = %saved.id, reason, "order cancelled");
                    self.ledger.restore_lines(&saved.lines).await;
                    self.dispatcher.dispatch(&OrderEvent::Cancelled {
                        order: saved.clone(),
                        reason: reason.map(str::to_string),
                    });
                    return Ok(saved);
                }
                Err(StoreError::RevisionConflict { .. })
                    if attempt + 1 < self.config.retry.max_attempts =>
                {
                    attempt += 1;
                    self.wait_out_conflict(id, attempt).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Fetches an order, failing with `OrderNotFound` when absent.
    pub async fn order(&self, id: &OrderId) -> LifecycleResult<Order> {
        self.load(id).await
    }

    /// All orders of one buyer, most recent first.
    pub async fn orders_for_buyer(&self, buyer: &BuyerId) -> LifecycleResult<Vec<Order>> {
        Ok(self.orders.orders_for_buyer(buyer).await?)
    }

    async fn load(&self, id: &OrderId) -> LifecycleResult<Order> {
        self.orders
            .order(id)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(id.clone()))
    }

    async fn wait_out_conflict(&self, id: &OrderId, attempt: u32) {
        let delay = self.config.retry.delay_for(attempt);
        debug!(order_id = %id, attempt, delay_ms = delay.as_millis() as u64, "revision conflict, retrying");
        tokio::time::sleep(delay).await;
    }
}

impl std::fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycle")
            .field("ledger", &self.ledger)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
