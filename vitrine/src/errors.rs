//! Error types for the order lifecycle core.
//!
//! One rule throughout: expected business-rule violations (order not
//! found, illegal transition, insufficient stock) are explicit `Result`
//! variants callers can match on, while infrastructure failures are
//! wrapped so every public operation has a single failure handling path.
//!
//! - [`StoreError`]: persistence-layer failures, including the optimistic
//!   concurrency and atomic-stock outcomes the store contract defines.
//! - [`LifecycleError`]: business-level failures of the lifecycle manager.
//! - [`PaymentError`]: failures of the external payment gateway contract.

use crate::order::OrderStatus;
use crate::types::{CheckoutKey, OrderId, ProductId, Revision};
use thiserror::Error;

/// Errors surfaced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An `update_order` lost an optimistic-concurrency race.
    ///
    /// The caller should reload the order and reapply its change; the
    /// lifecycle manager does this automatically within its retry budget.
    #[error(
        "revision conflict on order '{order_id}': expected {expected}, but current is {current}"
    )]
    RevisionConflict {
        /// The contested order.
        order_id: OrderId,
        /// The revision the writer read.
        expected: Revision,
        /// The revision actually stored.
        current: Revision,
    },

    /// An insert reused a checkout idempotency key.
    #[error("checkout key '{key}' already created order '{existing}'")]
    DuplicateCheckout {
        /// The duplicated key.
        key: CheckoutKey,
        /// The order the first use of the key created.
        existing: OrderId,
    },

    /// A conditional stock decrement found less stock than requested.
    ///
    /// Only produced under `OverdrawPolicy::Reject`; the clamp policy takes
    /// what is available instead.
    #[error(
        "insufficient stock for product '{product_id}': requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// The product that ran short.
        product_id: ProductId,
        /// Quantity the decrement asked for.
        requested: u32,
        /// Stock available at the time of the attempt.
        available: u32,
    },

    /// A stock operation referenced a product the store does not have.
    #[error("product '{0}' not found")]
    ProductMissing(ProductId),

    /// An update referenced an order the store does not have.
    #[error("order '{0}' not found")]
    OrderMissing(OrderId),

    /// The backing store was unreachable or rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the order lifecycle manager.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The referenced order does not exist.
    #[error("order '{0}' not found")]
    OrderNotFound(OrderId),

    /// A checkout was attempted with no cart lines.
    #[error("an order needs at least one cart line")]
    EmptyCart,

    /// The requested status change is not in the transition table.
    #[error("illegal transition for order '{order_id}': {from} -> {to}")]
    IllegalTransition {
        /// The order whose transition was rejected.
        order_id: OrderId,
        /// Status the order currently has.
        from: OrderStatus,
        /// Status the caller asked for.
        to: OrderStatus,
    },

    /// Cancellation was rejected because fulfillment already started.
    #[error("order '{order_id}' can no longer be cancelled in status {status}")]
    NotCancellable {
        /// The order whose cancellation was rejected.
        order_id: OrderId,
        /// Its current, non-cancellable status.
        status: OrderStatus,
    },

    /// Stock reservation failed for one of the cart lines.
    #[error(
        "insufficient stock for product '{product_id}': requested {requested}, available {available}"
    )]
    InsufficientStock {
        /// The product that ran short.
        product_id: ProductId,
        /// Quantity the checkout asked for.
        requested: u32,
        /// Stock available at the time of the attempt.
        available: u32,
    },

    /// Order math produced an invalid monetary value.
    #[error(transparent)]
    Money(#[from] crate::money::MoneyError),

    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderMissing(id) => Self::OrderNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Result alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors surfaced by the payment gateway contract.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The provider processed the request and rejected it.
    #[error("payment provider rejected the request: {message}")]
    Provider {
        /// Provider-specific error code, when one was given.
        code: Option<String>,
        /// Human-readable rejection reason.
        message: String,
    },

    /// The provider reported a charge status this crate does not know.
    #[error("unknown gateway payment status '{0}'")]
    UnknownStatus(String),

    /// The provider could not be reached.
    #[error("payment provider transport failure: {0}")]
    Transport(String),
}

/// Result alias for payment gateway operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_insufficient_stock_maps_to_lifecycle_variant() {
        let err: LifecycleError = StoreError::InsufficientStock {
            product_id: ProductId::try_new("p1").unwrap(),
            requested: 3,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            LifecycleError::InsufficientStock {
                requested: 3,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn store_order_missing_maps_to_not_found() {
        let id = OrderId::generate();
        let err: LifecycleError = StoreError::OrderMissing(id.clone()).into();
        assert!(matches!(err, LifecycleError::OrderNotFound(found) if found == id));
    }

    #[test]
    fn backend_error_stays_generic() {
        let err: LifecycleError = StoreError::Backend("connection refused".into()).into();
        assert!(matches!(err, LifecycleError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn error_messages_name_the_order() {
        let id = OrderId::generate();
        let err = LifecycleError::NotCancellable {
            order_id: id.clone(),
            status: OrderStatus::Shipped,
        };
        assert!(err.to_string().contains(id.as_ref()));
    }
}
