//! Shipping-quote contract.
//!
//! Quoting is consumed by the checkout flow, not by the order state
//! machine: given origin/destination postal codes and a manifest of what
//! ships, a provider returns carrier options. Quoting is pure and
//! best-effort; when a provider fails, checkout falls back to
//! [`StaticQuoter`]'s defaults rather than blocking the sale.

use async_trait::async_trait;
use nutype::nutype;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;
use crate::types::{ProductId, Quantity};

/// Errors from a shipping-quote provider.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// The provider could not produce quotes.
    #[error("shipping provider failure: {0}")]
    Provider(String),
}

/// A postal code (CEP), loosely validated; carriers do the real
/// validation.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 16),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Display,
        AsRef,
        Deref,
        Serialize,
        Deserialize,
        TryFrom
    )
)]
pub struct PostalCode(String);

/// One product entry in a shipping manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLine {
    /// Product shipping.
    pub product_id: ProductId,
    /// Units shipping.
    pub quantity: Quantity,
}

/// What ships, for quote computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingManifest {
    /// Lines shipping.
    pub lines: Vec<ManifestLine>,
}

/// One carrier option returned by a quoter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    /// Carrier/service label.
    pub carrier: String,
    /// Quoted cost.
    pub cost: Money,
    /// Delivery estimate in days.
    pub estimated_days: u32,
}

/// Port interface to shipping-quote providers.
#[async_trait]
pub trait ShippingQuoter: Send + Sync {
    /// Returns carrier options for shipping `manifest` from `origin` to
    /// `destination`.
    async fn quotes(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        manifest: &ShippingManifest,
    ) -> Result<Vec<ShippingQuote>, ShippingError>;
}

/// A fixed quote table.
///
/// Serves two roles: the provider of last resort when the real quoter
/// fails, and a workable quoter for development.
#[derive(Debug, Clone)]
pub struct StaticQuoter {
    table: Vec<ShippingQuote>,
}

impl StaticQuoter {
    /// A quoter with a custom table.
    pub const fn new(table: Vec<ShippingQuote>) -> Self {
        Self { table }
    }

    /// The fallback options used when no table is configured.
    pub fn standard_rates() -> Vec<ShippingQuote> {
        vec![
            ShippingQuote {
                carrier: "Correios PAC".into(),
                cost: "19.90".parse().expect("static rate is valid money"),
                estimated_days: 8,
            },
            ShippingQuote {
                carrier: "Correios SEDEX".into(),
                cost: "34.90".parse().expect("static rate is valid money"),
                estimated_days: 3,
            },
        ]
    }
}

impl Default for StaticQuoter {
    fn default() -> Self {
        Self::new(Self::standard_rates())
    }
}

#[async_trait]
impl ShippingQuoter for StaticQuoter {
    async fn quotes(
        &self,
        _origin: &PostalCode,
        _destination: &PostalCode,
        _manifest: &ShippingManifest,
    ) -> Result<Vec<ShippingQuote>, ShippingError> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_quoter_returns_its_table_for_any_route() {
        let quoter = StaticQuoter::default();
        let origin = PostalCode::try_new("80000-000").unwrap();
        let destination = PostalCode::try_new("01310-100").unwrap();

        let quotes = quoter
            .quotes(&origin, &destination, &ShippingManifest::default())
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert!(quotes.iter().any(|q| q.carrier.contains("SEDEX")));
    }

    #[test]
    fn postal_code_rejects_empty() {
        assert!(PostalCode::try_new("  ").is_err());
        assert!(PostalCode::try_new("80000-000").is_ok());
    }
}
