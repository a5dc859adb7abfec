//! The client-side cart accumulator.
//!
//! A cart is independent of the order lifecycle: it holds denormalized line
//! snapshots captured at add time, and checkout hands a copy of those lines
//! to the lifecycle manager. Price changes in the catalog after a line was
//! added do not touch the line; that is the snapshot-integrity invariant
//! orders rely on.

use serde::{Deserialize, Serialize};

use crate::money::{Money, MoneyError};
use crate::product::Product;
use crate::types::{ProductId, Quantity};

/// Uniqueness key of a cart line: the same product in a different size or
/// color is a different line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    /// Referenced product.
    pub product_id: ProductId,
    /// Chosen size, if the product has sizes.
    pub size: Option<String>,
    /// Chosen color name, if the product has color variants.
    pub color: Option<String>,
}

/// One product+variant+quantity entry in a cart or order.
///
/// Name, prices and image are captured when the line is created and never
/// refreshed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Referenced product.
    pub product_id: ProductId,
    /// Product name at add time.
    pub name: String,
    /// List price at add time.
    pub unit_price: Money,
    /// Promotional price at add time, when one was running.
    pub promotional_price: Option<Money>,
    /// Acquisition cost at add time, for profit reporting.
    pub cost_price: Option<Money>,
    /// Primary image at add time.
    pub image: Option<String>,
    /// Units of this line.
    pub quantity: Quantity,
    /// Chosen size.
    pub size: Option<String>,
    /// Chosen color name.
    pub color: Option<String>,
}

impl CartLine {
    /// Captures a line snapshot from a catalog product.
    pub fn from_product(
        product: &Product,
        quantity: Quantity,
        size: Option<String>,
        color: Option<String>,
    ) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            promotional_price: product.promotional_price,
            cost_price: product.cost_price,
            image: product.images.first().cloned(),
            quantity,
            size,
            color,
        }
    }

    /// The uniqueness key of this line.
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }

    /// The price one unit actually sells for.
    pub fn effective_unit_price(&self) -> Money {
        self.promotional_price.unwrap_or(self.unit_price)
    }

    /// Effective price times quantity.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.effective_unit_price().times(self.quantity)
    }
}

/// A shopping cart: an ordered list of unique lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Adds a line. A line matching an existing `(product, size, color)` key
    /// increments that line's quantity instead of duplicating the entry.
    pub fn add(&mut self, line: CartLine) {
        let key = line.key();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.key() == key) {
            existing.quantity = existing.quantity.plus(line.quantity);
        } else {
            self.lines.push(line);
        }
    }

    /// Replaces the quantity of the line with the given key.
    ///
    /// Returns `false` when no line matches.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: Quantity) -> bool {
        match self.lines.iter_mut().find(|l| &l.key() == key) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes the line with the given key. Returns `false` when no line
    /// matches.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.key() != key);
        self.lines.len() != before
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// The lines currently in the cart.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn unit_count(&self) -> u32 {
        self.lines
            .iter()
            .map(|l| u32::from(l.quantity))
            .fold(0, u32::saturating_add)
    }

    /// Sum of line totals at the prices captured in the lines.
    pub fn subtotal(&self) -> Result<Money, MoneyError> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, line| acc.add(&line.line_total()?))
    }

    /// A snapshot of the lines for checkout.
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }
}
