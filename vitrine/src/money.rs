//! Monetary amounts for catalog prices and order totals.
//!
//! `Money` is always non-negative, carries at most 2 decimal places and is
//! bounded, so a constructed value is valid everywhere it flows. Order math
//! that must clamp (the total invariant) goes through [`Money::saturating_sub`];
//! everything else is checked arithmetic.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

use crate::types::Quantity;

/// Errors that can occur when constructing or combining [`Money`] values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is negative, which is not representable.
    #[error("money amount cannot be negative: {0}")]
    NegativeAmount(Decimal),

    /// The amount has more than 2 decimal places.
    #[error("money can only have up to 2 decimal places, got: {0}")]
    TooManyDecimalPlaces(Decimal),

    /// The amount exceeds the maximum allowed value.
    #[error("money amount {0} exceeds maximum allowed value of {1}")]
    ExceedsMaximum(Decimal, Decimal),

    /// Failed to parse money from a string.
    #[error("failed to parse money from string: {0}")]
    ParseError(String),
}

/// Maximum amount of money that can be represented (1 trillion).
pub const MAX_MONEY_AMOUNT: Decimal = dec!(1_000_000_000_000.00);

/// A monetary amount in the store currency.
///
/// Always non-negative with at most 2 decimal places; both are enforced at
/// construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Creates a new `Money` value from a `Decimal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, has more than 2 decimal
    /// places, or exceeds [`MAX_MONEY_AMOUNT`].
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::NegativeAmount(amount));
        }

        if amount.scale() > 2 {
            return Err(MoneyError::TooManyDecimalPlaces(amount));
        }

        if amount > MAX_MONEY_AMOUNT {
            return Err(MoneyError::ExceedsMaximum(amount, MAX_MONEY_AMOUNT));
        }

        Ok(Self(amount))
    }

    /// Creates `Money` from cents (e.g. 1234 = 12.34).
    pub fn from_cents(cents: u64) -> Result<Self, MoneyError> {
        let amount = Decimal::from(cents) / dec!(100);
        Self::new(amount)
    }

    /// Returns the amount as a `Decimal`.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns the amount in cents.
    pub fn to_cents(&self) -> u64 {
        (self.0 * dec!(100)).to_u64().unwrap_or(0)
    }

    /// The zero value.
    pub fn zero() -> Self {
        Self(dec!(0))
    }

    /// Whether this amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds two amounts, failing if the sum exceeds the maximum.
    pub fn add(&self, other: &Self) -> Result<Self, MoneyError> {
        Self::new(self.0 + other.0)
    }

    /// Subtracts `other`, failing if the result would be negative.
    pub fn subtract(&self, other: &Self) -> Result<Self, MoneyError> {
        if other.0 > self.0 {
            return Err(MoneyError::NegativeAmount(self.0 - other.0));
        }
        Self::new(self.0 - other.0)
    }

    /// Subtracts `other`, flooring at zero.
    ///
    /// This is the clamp the order-total invariant relies on: a discount
    /// larger than subtotal + shipping produces a zero total, never a
    /// negative one.
    pub fn saturating_sub(&self, other: &Self) -> Self {
        if other.0 >= self.0 {
            Self::zero()
        } else {
            Self(self.0 - other.0)
        }
    }

    /// Multiplies by a line quantity.
    pub fn times(&self, quantity: Quantity) -> Result<Self, MoneyError> {
        Self::new(self.0 * Decimal::from(u32::from(quantity)))
    }

    /// Scales by a ratio, rounding to 2 decimal places.
    ///
    /// Used by the fallback-cost heuristic (`price x default_cost_ratio`)
    /// when a product has no recorded cost price.
    pub fn ratio(&self, ratio: Decimal) -> Result<Self, MoneyError> {
        Self::new((self.0 * ratio).round_dp(2))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R$ {}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.trim_start_matches("R$").trim_start_matches('$').trim();

        let amount = Decimal::from_str(s).map_err(|_| MoneyError::ParseError(s.to_string()))?;

        Self::new(amount)
    }
}
