//! The checkout flow.
//!
//! Glues the pieces a storefront needs at the buy button: shipping quotes
//! (best-effort, with a static fallback), order creation through the
//! lifecycle manager, and charge creation at the payment gateway. A
//! gateway failure never loses the order: it stays `Pending` and the
//! charge can be retried or reconciled later.

use std::sync::Arc;

use thiserror::Error;
use tracing::{instrument, warn};

use crate::errors::{LifecycleError, PaymentError};
use crate::lifecycle::{CheckoutRequest, OrderLifecycle};
use crate::order::{Order, PaymentStatus};
use crate::payment::{BillingInfo, CardDetails, ChargeReceipt, ChargeRequest, PaymentGateway};
use crate::shipping::{PostalCode, ShippingManifest, ShippingQuote, ShippingQuoter, StaticQuoter};
use crate::types::OrderId;

/// Errors surfaced by the checkout flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The lifecycle manager rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The payment gateway rejected the operation.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The order has no gateway charge to act on.
    #[error("order '{0}' has no gateway charge reference")]
    NoCharge(OrderId),

    /// A new charge only makes sense while payment is pending.
    #[error("order '{order_id}' is not chargeable in payment status {status}")]
    NotChargeable {
        /// The order in question.
        order_id: OrderId,
        /// Its current payment status.
        status: PaymentStatus,
    },
}

/// What a completed checkout hands back to the storefront.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    /// The created (or charge-updated) order.
    pub order: Order,
    /// The gateway receipt, absent when charge creation failed and should
    /// be retried.
    pub charge: Option<ChargeReceipt>,
}

/// Storefront-facing composition of lifecycle, gateway and quoter.
#[derive(Clone)]
pub struct CheckoutFlow {
    lifecycle: Arc<OrderLifecycle>,
    gateway: Arc<dyn PaymentGateway>,
    quoter: Arc<dyn ShippingQuoter>,
    fallback: StaticQuoter,
}

impl CheckoutFlow {
    /// Wires a checkout flow.
    pub fn new(
        lifecycle: Arc<OrderLifecycle>,
        gateway: Arc<dyn PaymentGateway>,
        quoter: Arc<dyn ShippingQuoter>,
    ) -> Self {
        Self {
            lifecycle,
            gateway,
            quoter,
            fallback: StaticQuoter::default(),
        }
    }

    /// Overrides the fallback quote table.
    #[must_use]
    pub fn with_fallback(mut self, fallback: StaticQuoter) -> Self {
        self.fallback = fallback;
        self
    }

    /// Shipping options for a route, never failing: a provider error falls
    /// back to the static table.
    #[instrument(skip(self, manifest))]
    pub async fn shipping_quotes(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        manifest: &ShippingManifest,
    ) -> Vec<ShippingQuote> {
        match self.quoter.quotes(origin, destination, manifest).await {
            Ok(quotes) if !quotes.is_empty() => quotes,
            Ok(_) => {
                warn!("shipping provider returned no options, using fallback rates");
                self.fallback_rates(origin, destination, manifest).await
            }
            Err(err) => {
                warn!(error = %err, "shipping provider failed, using fallback rates");
                self.fallback_rates(origin, destination, manifest).await
            }
        }
    }

    /// Creates the order and its gateway charge.
    ///
    /// Order creation failures propagate. Charge creation failures do not:
    /// the order stays `Pending`, the failure is logged, and the returned
    /// [`PlacedOrder`] carries no receipt. [`Self::retry_charge`] picks it
    /// up from there.
    #[instrument(skip_all, fields(buyer = %request.buyer.id))]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
        billing: BillingInfo,
        card: Option<CardDetails>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let order = self.lifecycle.create_order(request).await?;

        match self.charge(&order, billing, card).await {
            Ok((order, receipt)) => Ok(PlacedOrder {
                order,
                charge: Some(receipt),
            }),
            Err(err) => {
                warn!(
                    order_id = %order.id,
                    error = %err,
                    "charge creation failed, order stays pending"
                );
                Ok(PlacedOrder {
                    order,
                    charge: None,
                })
            }
        }
    }

    /// Retries charge creation for a pending order.
    pub async fn retry_charge(
        &self,
        id: &OrderId,
        billing: BillingInfo,
        card: Option<CardDetails>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let order = self.lifecycle.order(id).await?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(CheckoutError::NotChargeable {
                order_id: id.clone(),
                status: order.payment_status,
            });
        }

        let (order, receipt) = self.charge(&order, billing, card).await?;
        Ok(PlacedOrder {
            order,
            charge: Some(receipt),
        })
    }

    /// Polls the gateway for a charge's settlement state and feeds the
    /// answer into the lifecycle manager: the manual reconciliation path
    /// for when no webhook arrives.
    #[instrument(skip(self))]
    pub async fn reconcile_payment(&self, id: &OrderId) -> Result<Order, CheckoutError> {
        let order = self.lifecycle.order(id).await?;
        let payment_id = order
            .payment_refs
            .as_ref()
            .and_then(|refs| refs.payment_id.clone())
            .ok_or_else(|| CheckoutError::NoCharge(id.clone()))?;

        let status = self.gateway.charge_status(&payment_id).await?;
        Ok(self
            .lifecycle
            .update_payment_status(id, status.status, None)
            .await?)
    }

    async fn charge(
        &self,
        order: &Order,
        billing: BillingInfo,
        card: Option<CardDetails>,
    ) -> Result<(Order, ChargeReceipt), CheckoutError> {
        let request = ChargeRequest::for_order(order, billing, card);
        let receipt = self.gateway.create_charge(&request).await?;
        let updated = self
            .lifecycle
            .update_payment_status(&order.id, PaymentStatus::Pending, Some(receipt.clone().into_refs()))
            .await?;
        Ok((updated, receipt))
    }

    async fn fallback_rates(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        manifest: &ShippingManifest,
    ) -> Vec<ShippingQuote> {
        self.fallback
            .quotes(origin, destination, manifest)
            .await
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for CheckoutFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutFlow").finish_non_exhaustive()
    }
}
