//! Read-side reporting over the order history.
//!
//! Pure derivation: the aggregator scans the stores and computes dashboard
//! statistics, a profit/loss breakdown and low-stock alerts. Filtering
//! happens in memory, which is fine at this catalog's scale; a larger
//! deployment would push the date filters into the store queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::{Money, MoneyError};
use crate::order::{Order, OrderStatus};
use crate::store::{OrderStore, ProductStore};
use crate::types::{ProductId, Timestamp};

/// Errors surfaced by report computation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Reading the stores failed.
    #[error(transparent)]
    Store(#[from] crate::errors::StoreError),

    /// Aggregated money exceeded representable bounds.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Result alias for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Tunables of the reporting aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// When a line has no captured cost price, its cost is assumed to be
    /// this ratio of the sale price. Named and configurable so tests and
    /// deployments can see and change it.
    pub default_cost_ratio: Decimal,
    /// Low-stock threshold for products without one of their own.
    pub default_low_stock_threshold: u32,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_cost_ratio: dec!(0.5),
            default_low_stock_threshold: 5,
        }
    }
}

/// An optional closed date window over order creation times.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Inclusive lower bound.
    pub from: Option<Timestamp>,
    /// Inclusive upper bound.
    pub to: Option<Timestamp>,
}

impl DateRange {
    /// Whether a timestamp falls inside the window.
    pub fn contains(&self, ts: &Timestamp) -> bool {
        if let Some(from) = &self.from {
            if ts < from {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if ts > to {
                return false;
            }
        }
        true
    }
}

/// Order counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    /// Orders awaiting payment.
    pub pending: usize,
    /// Paid, unfulfilled orders.
    pub paid: usize,
    /// Orders with the carrier.
    pub shipped: usize,
    /// Delivered orders.
    pub delivered: usize,
    /// Cancelled orders.
    pub cancelled: usize,
    /// Refunded orders.
    pub refunded: usize,
}

impl StatusBreakdown {
    fn bump(&mut self, status: OrderStatus) {
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Paid => self.paid += 1,
            OrderStatus::Shipped => self.shipped += 1,
            OrderStatus::Delivered => self.delivered += 1,
            OrderStatus::Cancelled => self.cancelled += 1,
            OrderStatus::Refunded => self.refunded += 1,
        }
    }
}

/// Revenue and order count for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRevenue {
    /// The day (UTC).
    pub day: NaiveDate,
    /// Revenue from orders created that day whose payment settled.
    pub revenue: Money,
    /// Orders created that day.
    pub orders: usize,
}

/// The admin dashboard's headline numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Orders in the window.
    pub total_orders: usize,
    /// Counts per status.
    pub by_status: StatusBreakdown,
    /// Revenue from settled orders in the window.
    pub revenue_total: Money,
    /// Revenue from settled orders created today.
    pub revenue_today: Money,
    /// Revenue from settled orders created this month.
    pub revenue_this_month: Money,
    /// Orders created today.
    pub orders_today: usize,
    /// Average value of settled orders.
    pub average_order_value: Money,
    /// Per-day revenue series, oldest first.
    pub daily: Vec<DailyRevenue>,
}

/// Revenue/cost/profit for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProfit {
    /// The day (UTC).
    pub day: NaiveDate,
    /// Revenue that day.
    pub revenue: Money,
    /// Cost of goods that day.
    pub cost: Money,
    /// Revenue minus cost; can be negative.
    pub profit: Decimal,
}

/// Profit breakdown over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitReport {
    /// Revenue over all non-cancelled orders in the window.
    pub revenue: Money,
    /// Cost of goods, using captured cost prices with the configured
    /// fallback ratio where unknown.
    pub cost: Money,
    /// Revenue minus cost; can be negative.
    pub profit: Decimal,
    /// Profit as a percentage of revenue; zero when revenue is zero.
    pub margin_pct: Decimal,
    /// Orders counted.
    pub orders: usize,
    /// Per-day series, oldest first.
    pub daily: Vec<DailyProfit>,
}

/// A product at or below its alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// The product.
    pub product_id: ProductId,
    /// Its display name.
    pub name: String,
    /// Units left.
    pub stock: u32,
    /// The threshold that triggered the alert.
    pub threshold: u32,
}

/// Read-only aggregation over the order and product stores.
#[derive(Clone)]
pub struct ReportingAggregator {
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    config: ReportingConfig,
}

impl ReportingAggregator {
    /// Creates an aggregator with default configuration.
    pub fn new(orders: Arc<dyn OrderStore>, products: Arc<dyn ProductStore>) -> Self {
        Self {
            orders,
            products,
            config: ReportingConfig::default(),
        }
    }

    /// Overrides the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReportingConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub const fn config(&self) -> &ReportingConfig {
        &self.config
    }

    /// Computes the dashboard headline numbers for a window (or all time).
    pub async fn dashboard(&self, range: DateRange) -> ReportResult<DashboardStats> {
        let now = Timestamp::now();
        let orders = self.orders.all_orders().await?;

        let mut by_status = StatusBreakdown::default();
        let mut revenue_total = Money::zero();
        let mut revenue_today = Money::zero();
        let mut revenue_this_month = Money::zero();
        let mut orders_today = 0usize;
        let mut settled = 0usize;
        let mut daily: BTreeMap<NaiveDate, DailyRevenue> = BTreeMap::new();
        let mut total_orders = 0usize;

        for order in orders.iter().filter(|o| range.contains(&o.created_at)) {
            total_orders += 1;
            by_status.bump(order.status);

            if order.created_at.same_day_as(&now) {
                orders_today += 1;
            }

            let bucket = daily.entry(order.created_at.day()).or_insert(DailyRevenue {
                day: order.created_at.day(),
                revenue: Money::zero(),
                orders: 0,
            });
            bucket.orders += 1;

            if order.has_settled_payment() && order.status != OrderStatus::Cancelled {
                let total = order.totals.total();
                revenue_total = revenue_total.add(&total)?;
                settled += 1;
                bucket.revenue = bucket.revenue.add(&total)?;
                if order.created_at.same_day_as(&now) {
                    revenue_today = revenue_today.add(&total)?;
                }
                if order.created_at.same_month_as(&now) {
                    revenue_this_month = revenue_this_month.add(&total)?;
                }
            }
        }

        let average_order_value = if settled == 0 {
            Money::zero()
        } else {
            Money::new((revenue_total.amount() / Decimal::from(settled as u64)).round_dp(2))?
        };

        Ok(DashboardStats {
            total_orders,
            by_status,
            revenue_total,
            revenue_today,
            revenue_this_month,
            orders_today,
            average_order_value,
            daily: daily.into_values().collect(),
        })
    }

    /// Computes the profit report over all non-cancelled orders in a
    /// window (or all time).
    pub async fn profit(&self, range: DateRange) -> ReportResult<ProfitReport> {
        let orders = self.orders.all_orders().await?;

        let mut revenue = Money::zero();
        let mut cost = Money::zero();
        let mut counted = 0usize;
        let mut daily: BTreeMap<NaiveDate, DailyProfit> = BTreeMap::new();

        for order in orders.iter().filter(|o| {
            o.status != OrderStatus::Cancelled && range.contains(&o.created_at)
        }) {
            let order_revenue = order.totals.total();
            let order_cost = self.order_cost(order)?;

            revenue = revenue.add(&order_revenue)?;
            cost = cost.add(&order_cost)?;
            counted += 1;

            let bucket = daily.entry(order.created_at.day()).or_insert(DailyProfit {
                day: order.created_at.day(),
                revenue: Money::zero(),
                cost: Money::zero(),
                profit: Decimal::ZERO,
            });
            bucket.revenue = bucket.revenue.add(&order_revenue)?;
            bucket.cost = bucket.cost.add(&order_cost)?;
            bucket.profit = bucket.revenue.amount() - bucket.cost.amount();
        }

        let profit = revenue.amount() - cost.amount();
        let margin_pct = if revenue.is_zero() {
            Decimal::ZERO
        } else {
            (profit / revenue.amount() * dec!(100)).round_dp(2)
        };

        Ok(ProfitReport {
            revenue,
            cost,
            profit,
            margin_pct,
            orders: counted,
            daily: daily.into_values().collect(),
        })
    }

    /// Products at or below their low-stock threshold, emptiest first.
    pub async fn low_stock(&self) -> ReportResult<Vec<LowStockAlert>> {
        let products = self.products.all_products().await?;
        let default = self.config.default_low_stock_threshold;

        let mut alerts: Vec<LowStockAlert> = products
            .into_iter()
            .filter(|p| p.active && p.is_low_stock(default))
            .map(|p| LowStockAlert {
                threshold: p.min_stock.unwrap_or(default),
                product_id: p.id,
                name: p.name,
                stock: p.stock,
            })
            .collect();
        alerts.sort_by_key(|a| a.stock);
        Ok(alerts)
    }

    /// Cost of one order's goods: captured cost price where known, the
    /// configured ratio of the sale price where not.
    fn order_cost(&self, order: &Order) -> Result<Money, MoneyError> {
        order.lines.iter().try_fold(Money::zero(), |acc, line| {
            let unit_cost = match line.cost_price {
                Some(cost) => cost,
                None => line.unit_price.ratio(self.config.default_cost_ratio)?,
            };
            acc.add(&unit_cost.times(line.quantity)?)
        })
    }
}

impl std::fmt::Debug for ReportingAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportingAggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
