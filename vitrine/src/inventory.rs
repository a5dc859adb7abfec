//! The inventory ledger.
//!
//! A thin orchestration over [`ProductStore`]'s atomic stock operations:
//! reserve a whole cart's worth of stock line by line, rolling back the
//! lines already taken when one fails, and restore stock as the
//! compensating action of cancellation and refund.

use std::sync::Arc;

use tracing::{error, instrument, warn};

use crate::cart::CartLine;
use crate::errors::StoreResult;
use crate::store::{OverdrawPolicy, ProductStore};
use crate::types::{ProductId, Quantity};

/// Stock successfully taken for an order, line by line.
///
/// Holds exactly what was decremented (under [`OverdrawPolicy::Clamp`]
/// that can be less than what was requested), so a release puts back
/// precisely what was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReservation {
    taken: Vec<(ProductId, u32)>,
}

impl StockReservation {
    /// The per-product units this reservation holds.
    pub fn taken(&self) -> &[(ProductId, u32)] {
        &self.taken
    }

    /// Total units across all products.
    pub fn unit_count(&self) -> u32 {
        self.taken.iter().map(|(_, n)| *n).fold(0, u32::saturating_add)
    }
}

/// Tracks per-product stock through the product store's atomic operations.
#[derive(Clone)]
pub struct InventoryLedger {
    products: Arc<dyn ProductStore>,
    policy: OverdrawPolicy,
}

impl InventoryLedger {
    /// Creates a ledger with the default [`OverdrawPolicy::Reject`] policy.
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self {
            products,
            policy: OverdrawPolicy::default(),
        }
    }

    /// Overrides the overdraw policy.
    #[must_use]
    pub fn with_policy(mut self, policy: OverdrawPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active overdraw policy.
    pub const fn policy(&self) -> OverdrawPolicy {
        self.policy
    }

    /// Decrements stock for every line of a checkout.
    ///
    /// Lines are taken in order; when one fails, everything already taken
    /// is restored before the error is returned, so a failed reservation
    /// leaves stock exactly where it started.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(&self, lines: &[CartLine]) -> StoreResult<StockReservation> {
        let mut taken: Vec<(ProductId, u32)> = Vec::with_capacity(lines.len());

        for line in lines {
            match self
                .products
                .decrement_stock(&line.product_id, line.quantity, self.policy)
                .await
            {
                Ok(outcome) => {
                    if outcome.taken < u32::from(line.quantity) {
                        warn!(
                            product_id = %line.product_id,
                            requested = u32::from(line.quantity),
                            taken = outcome.taken,
                            "stock clamped below requested quantity"
                        );
                    }
                    if outcome.taken > 0 {
                        taken.push((line.product_id.clone(), outcome.taken));
                    }
                }
                Err(err) => {
                    self.rollback(&taken).await;
                    return Err(err);
                }
            }
        }

        Ok(StockReservation { taken })
    }

    /// Releases a reservation, restoring exactly the units it took.
    pub async fn release(&self, reservation: StockReservation) {
        self.rollback(&reservation.taken).await;
    }

    /// Restores stock for order lines, the compensating action of
    /// cancellation and refund.
    ///
    /// Individual restore failures are logged and skipped: the order's
    /// status change already happened and must not be undone by a
    /// bookkeeping failure on one product.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn restore_lines(&self, lines: &[CartLine]) {
        for line in lines {
            if let Err(err) = self
                .products
                .restore_stock(&line.product_id, line.quantity)
                .await
            {
                error!(
                    product_id = %line.product_id,
                    quantity = u32::from(line.quantity),
                    error = %err,
                    "stock restore failed; product needs manual reconciliation"
                );
            }
        }
    }

    async fn rollback(&self, taken: &[(ProductId, u32)]) {
        for (product_id, units) in taken {
            let quantity = match Quantity::try_new(*units) {
                Ok(q) => q,
                // Zero-unit entries are never recorded.
                Err(_) => continue,
            };
            if let Err(err) = self.products.restore_stock(product_id, quantity).await {
                error!(
                    product_id = %product_id,
                    units,
                    error = %err,
                    "rollback restore failed; product needs manual reconciliation"
                );
            }
        }
    }
}

impl std::fmt::Debug for InventoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryLedger")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
