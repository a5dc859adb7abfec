//! Order lifecycle and inventory core for a small apparel storefront.
//!
//! This crate owns the part of the shop with real invariants: the order
//! state machine (creation, payment settlement, fulfillment, cancellation
//! and refund with compensating stock restoration), the inventory ledger,
//! and the read-side reporting the back office consumes. Presentation,
//! payment vendors, carriers and the hosted data store sit behind port
//! traits ([`store::OrderStore`], [`store::ProductStore`],
//! [`payment::PaymentGateway`], [`shipping::ShippingQuoter`],
//! [`notify::Notifier`]).
//!
//! The crate guarantees, independent of backend:
//!
//! - stock never goes negative, and every unit taken by an order comes
//!   back on cancellation or refund;
//! - an order's totals are computed once, from the cart snapshot, and hold
//!   `total == max(0, subtotal + shipping - discount)` forever;
//! - order status only moves along the explicit transition table, and
//!   `paid_at` is stamped exactly once however many times the gateway
//!   re-confirms.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cart;
pub mod checkout;
pub mod errors;
pub mod inventory;
pub mod lifecycle;
pub mod money;
pub mod notify;
pub mod order;
pub mod payment;
pub mod product;
pub mod reporting;
pub mod retry;
pub mod shipping;
pub mod store;
pub mod types;

pub use cart::{Cart, CartLine, LineKey};
pub use checkout::{CheckoutError, CheckoutFlow, PlacedOrder};
pub use errors::{
    LifecycleError, LifecycleResult, PaymentError, PaymentResult, StoreError, StoreResult,
};
pub use inventory::{InventoryLedger, StockReservation};
pub use lifecycle::{CheckoutRequest, LifecycleConfig, OrderLifecycle};
pub use money::{Money, MoneyError};
pub use notify::{NotificationDispatcher, Notifier, NotifyError, OrderEvent};
pub use order::{
    BuyerSnapshot, Order, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus, ShippingAddress,
    ShippingSelection,
};
pub use payment::{
    BillingInfo, CardDetails, ChargeReceipt, ChargeRequest, ChargeStatus, GatewayPaymentId,
    PaymentGateway, PaymentRefs,
};
pub use product::{ColorVariant, Product};
pub use reporting::{
    DashboardStats, DateRange, LowStockAlert, ProfitReport, ReportError, ReportResult,
    ReportingAggregator, ReportingConfig,
};
pub use retry::RetryStrategy;
pub use shipping::{
    ManifestLine, PostalCode, ShippingError, ShippingManifest, ShippingQuote, ShippingQuoter,
    StaticQuoter,
};
pub use store::{NewOrder, OrderStore, OverdrawPolicy, ProductStore, StockTaken};
pub use types::{
    BuyerId, CheckoutKey, OrderId, OrderNumber, ProductId, Quantity, Revision, Timestamp,
    TrackingCode,
};
