//! Catalog product records.
//!
//! Products are owned by the catalog backend; this crate reads them for
//! price/cost snapshots and mutates exactly one field, `stock`, through
//! the store's atomic decrement/restore operations.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ProductId, Timestamp};

/// A named color variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    /// Display name ("Preto", "Off-white").
    pub name: String,
    /// Optional hex swatch for the storefront.
    pub hex: Option<String>,
}

/// A catalog product.
///
/// `stock` is an unsigned count, so negative inventory is unrepresentable;
/// the floor-at-zero/reject semantics live in the store's conditional
/// decrement, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long-form description.
    pub description: String,
    /// List price.
    pub price: Money,
    /// Acquisition cost, when known. Reporting falls back to a configured
    /// ratio of the sale price when this is `None`.
    pub cost_price: Option<Money>,
    /// Promotional price; takes precedence over `price` when set.
    pub promotional_price: Option<Money>,
    /// Image URLs.
    pub images: Vec<String>,
    /// Category reference (catalog-owned).
    pub category: Option<String>,
    /// Units available.
    pub stock: u32,
    /// Low-stock alert threshold for the back office.
    pub min_stock: Option<u32>,
    /// Available sizes ("P", "M", "G", "GG").
    pub sizes: Vec<String>,
    /// Available color variants.
    pub colors: Vec<ColorVariant>,
    /// Whether the product is visible in the storefront.
    pub active: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

impl Product {
    /// Creates a product with the given identity, name and price, everything
    /// else empty or defaulted.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            name: name.into(),
            description: String::new(),
            price,
            cost_price: None,
            promotional_price: None,
            images: Vec::new(),
            category: None,
            stock: 0,
            min_stock: None,
            sizes: Vec::new(),
            colors: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the available stock.
    #[must_use]
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    /// Sets the acquisition cost.
    #[must_use]
    pub fn with_cost_price(mut self, cost: Money) -> Self {
        self.cost_price = Some(cost);
        self
    }

    /// Sets the promotional price.
    #[must_use]
    pub fn with_promotional_price(mut self, promo: Money) -> Self {
        self.promotional_price = Some(promo);
        self
    }

    /// Sets the low-stock alert threshold.
    #[must_use]
    pub fn with_min_stock(mut self, min: u32) -> Self {
        self.min_stock = Some(min);
        self
    }

    /// The price a buyer pays right now: promotional when set, list otherwise.
    pub fn effective_price(&self) -> Money {
        self.promotional_price.unwrap_or(self.price)
    }

    /// Whether stock is at or below the alert threshold.
    ///
    /// `default_threshold` applies when the product has no threshold of its
    /// own.
    pub fn is_low_stock(&self, default_threshold: u32) -> bool {
        self.stock <= self.min_stock.unwrap_or(default_threshold)
    }
}
