//! The payment gateway contract.
//!
//! The lifecycle core treats the gateway as opaque and synchronous: it
//! creates a charge, keeps the returned references on the order, and later
//! learns the settlement outcome either through a webhook-style call into
//! `update_payment_status` or by polling [`PaymentGateway::charge_status`].
//! Vendor wire formats stay behind this module's request/response types.

use async_trait::async_trait;
use nutype::nutype;
use serde::{Deserialize, Serialize};

use crate::errors::{PaymentError, PaymentResult};
use crate::money::Money;
use crate::order::{Order, PaymentMethod, PaymentStatus};
use crate::types::{OrderId, OrderNumber, Timestamp};

/// Identifier the gateway assigned to a charge.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 128),
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
pub struct GatewayPaymentId(String);

/// External payment references kept on an order.
///
/// Populated from a [`ChargeReceipt`] and merged field-by-field: a later
/// update only overwrites the fields it actually carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRefs {
    /// Gateway charge id.
    pub payment_id: Option<GatewayPaymentId>,
    /// Hosted invoice page.
    pub invoice_url: Option<String>,
    /// PIX QR code payload (copy-and-paste string).
    pub qr_payload: Option<String>,
    /// PIX QR code image, base64.
    pub qr_image: Option<String>,
    /// When the PIX QR expires.
    pub qr_expiration: Option<Timestamp>,
    /// Printable bank-slip URL.
    pub bank_slip_url: Option<String>,
    /// Direct payment link.
    pub payment_link: Option<String>,
}

impl PaymentRefs {
    /// Merges `other` into `self`; fields present in `other` win.
    pub fn merge(&mut self, other: Self) {
        if other.payment_id.is_some() {
            self.payment_id = other.payment_id;
        }
        if other.invoice_url.is_some() {
            self.invoice_url = other.invoice_url;
        }
        if other.qr_payload.is_some() {
            self.qr_payload = other.qr_payload;
        }
        if other.qr_image.is_some() {
            self.qr_image = other.qr_image;
        }
        if other.qr_expiration.is_some() {
            self.qr_expiration = other.qr_expiration;
        }
        if other.bank_slip_url.is_some() {
            self.bank_slip_url = other.bank_slip_url;
        }
        if other.payment_link.is_some() {
            self.payment_link = other.payment_link;
        }
    }
}

/// Billing identity the gateway requires to create a charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    /// Payer name.
    pub name: String,
    /// Payer email.
    pub email: String,
    /// CPF/CNPJ tax id, when the gateway requires one.
    pub tax_id: Option<String>,
    /// Payer phone.
    pub phone: Option<String>,
    /// Billing postal code.
    pub postal_code: Option<String>,
    /// Billing address number.
    pub address_number: Option<String>,
}

/// Card data for card charges. Never persisted; passes through to the
/// gateway's tokenization.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Name on the card.
    pub holder_name: String,
    /// Card number.
    pub number: String,
    /// Expiry month (1-12).
    pub expiry_month: u8,
    /// Expiry year, four digits.
    pub expiry_year: u16,
    /// Security code.
    pub ccv: String,
}

impl std::fmt::Debug for CardDetails {
    // Card number and CCV must not reach logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked: String = self
            .number
            .chars()
            .rev()
            .enumerate()
            .map(|(i, c)| if i < 4 { c } else { '*' })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CardDetails")
            .field("holder_name", &self.holder_name)
            .field("number", &masked)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("ccv", &"***")
            .finish()
    }
}

/// A request to create a charge for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// The order being charged.
    pub order_id: OrderId,
    /// Human-facing order number, used in the charge description.
    pub order_number: OrderNumber,
    /// Amount to charge.
    pub amount: Money,
    /// Billing method chosen by the buyer.
    pub method: PaymentMethod,
    /// Description shown on the invoice.
    pub description: String,
    /// Payer identity.
    pub billing: BillingInfo,
    /// Card data, for card methods.
    pub card: Option<CardDetails>,
}

impl ChargeRequest {
    /// Builds a charge request for an order's total.
    pub fn for_order(order: &Order, billing: BillingInfo, card: Option<CardDetails>) -> Self {
        Self {
            order_id: order.id.clone(),
            order_number: order.number,
            amount: order.totals.total(),
            method: order.payment_method,
            description: format!("Pedido #{}", order.number),
            billing,
            card,
        }
    }
}

/// What the gateway returned for a created charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// Gateway charge id.
    pub payment_id: GatewayPaymentId,
    /// Hosted invoice page.
    pub invoice_url: Option<String>,
    /// PIX QR payload.
    pub qr_payload: Option<String>,
    /// PIX QR image, base64.
    pub qr_image: Option<String>,
    /// PIX QR expiration.
    pub qr_expiration: Option<Timestamp>,
    /// Bank-slip URL.
    pub bank_slip_url: Option<String>,
    /// Direct payment link.
    pub payment_link: Option<String>,
}

impl ChargeReceipt {
    /// Converts the receipt into the refs kept on the order.
    pub fn into_refs(self) -> PaymentRefs {
        PaymentRefs {
            payment_id: Some(self.payment_id),
            invoice_url: self.invoice_url,
            qr_payload: self.qr_payload,
            qr_image: self.qr_image,
            qr_expiration: self.qr_expiration,
            bank_slip_url: self.bank_slip_url,
            payment_link: self.payment_link,
        }
    }
}

/// A charge's settlement state as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeStatus {
    /// Parsed settlement state.
    pub status: PaymentStatus,
    /// Amount the gateway says was paid, when settled.
    pub paid_value: Option<Money>,
}

/// Parses a gateway status string into a [`PaymentStatus`].
///
/// Accepts the spellings real gateways emit, including the in-cash and
/// risk-analysis variants; anything unknown is an error rather than a
/// guessed state.
pub fn parse_gateway_status(raw: &str) -> PaymentResult<PaymentStatus> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "PENDING" | "AWAITING_RISK_ANALYSIS" => Ok(PaymentStatus::Pending),
        "CONFIRMED" => Ok(PaymentStatus::Confirmed),
        "RECEIVED" | "RECEIVED_IN_CASH" => Ok(PaymentStatus::Received),
        "OVERDUE" => Ok(PaymentStatus::Overdue),
        "CANCELLED" | "CANCELED" | "PAYMENT_DELETED" => Ok(PaymentStatus::Cancelled),
        "REFUNDED" | "REFUND_REQUESTED" => Ok(PaymentStatus::Refunded),
        other => Err(PaymentError::UnknownStatus(other.to_string())),
    }
}

/// Port interface to the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a charge for an order. The returned receipt's references are
    /// stored on the order for later reconciliation.
    async fn create_charge(&self, request: &ChargeRequest) -> PaymentResult<ChargeReceipt>;

    /// Fetches the current settlement state of a charge.
    async fn charge_status(&self, payment_id: &GatewayPaymentId) -> PaymentResult<ChargeStatus>;

    /// Cancels a charge at the gateway.
    async fn cancel_charge(&self, payment_id: &GatewayPaymentId) -> PaymentResult<()>;

    /// Refunds a settled charge at the gateway.
    async fn refund_charge(&self, payment_id: &GatewayPaymentId) -> PaymentResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_strings_parse() {
        assert_eq!(parse_gateway_status("CONFIRMED").unwrap(), PaymentStatus::Confirmed);
        assert_eq!(parse_gateway_status("received").unwrap(), PaymentStatus::Received);
        assert_eq!(
            parse_gateway_status("RECEIVED_IN_CASH").unwrap(),
            PaymentStatus::Received
        );
        assert_eq!(
            parse_gateway_status(" OVERDUE ").unwrap(),
            PaymentStatus::Overdue
        );
        assert_eq!(
            parse_gateway_status("CANCELED").unwrap(),
            PaymentStatus::Cancelled
        );
        assert!(matches!(
            parse_gateway_status("SOMETHING_ELSE"),
            Err(PaymentError::UnknownStatus(_))
        ));
    }

    #[test]
    fn refs_merge_keeps_existing_fields() {
        let mut refs = PaymentRefs {
            payment_id: Some(GatewayPaymentId::try_new("pay_1").unwrap()),
            invoice_url: Some("https://inv/1".into()),
            ..PaymentRefs::default()
        };

        refs.merge(PaymentRefs {
            qr_payload: Some("000201...".into()),
            ..PaymentRefs::default()
        });

        assert_eq!(refs.invoice_url.as_deref(), Some("https://inv/1"));
        assert_eq!(refs.qr_payload.as_deref(), Some("000201..."));
        assert!(refs.payment_id.is_some());
    }

    #[test]
    fn card_debug_masks_sensitive_fields() {
        let card = CardDetails {
            holder_name: "ANA SILVA".into(),
            number: "5162306219378829".into(),
            expiry_month: 11,
            expiry_year: 2028,
            ccv: "318".into(),
        };
        let debug = format!("{card:?}");
        assert!(!debug.contains("5162306219378829"));
        assert!(!debug.contains("318"));
        assert!(debug.contains("8829"));
    }
}
