//! Shared fixtures for the lifecycle scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use vitrine::cart::CartLine;
use vitrine::notify::{Notifier, NotifyError, OrderEvent};
use vitrine::order::{BuyerSnapshot, PaymentMethod, ShippingAddress, ShippingSelection};
use vitrine::types::{BuyerId, CheckoutKey, ProductId, Quantity};
use vitrine::{CheckoutRequest, InventoryLedger, Money, OrderLifecycle, Product};
use vitrine_memory::InMemoryStore;

pub fn money(s: &str) -> Money {
    s.parse().unwrap()
}

pub fn qty(n: u32) -> Quantity {
    Quantity::try_new(n).unwrap()
}

pub fn product_id(s: &str) -> ProductId {
    ProductId::try_new(s).unwrap()
}

/// A store seeded with one product: `tee-01`, price 100.00, given stock.
pub fn seeded_store(stock: u32) -> InMemoryStore {
    let store = InMemoryStore::new();
    store.seed_product(
        Product::new(product_id("tee-01"), "Camiseta Basica", money("100.00")).with_stock(stock),
    );
    store
}

pub fn lifecycle_over(store: &InMemoryStore) -> OrderLifecycle {
    let ledger = InventoryLedger::new(Arc::new(store.clone()));
    OrderLifecycle::new(Arc::new(store.clone()), ledger)
}

pub fn line(product: &str, price: &str, quantity: u32) -> CartLine {
    CartLine {
        product_id: product_id(product),
        name: "Camiseta Basica".into(),
        unit_price: money(price),
        promotional_price: None,
        cost_price: None,
        image: None,
        quantity: qty(quantity),
        size: Some("M".into()),
        color: Some("Preto".into()),
    }
}

/// Scenario A's request: 2 units at 100.00, shipping 10.00, no discount.
pub fn checkout_request() -> CheckoutRequest {
    request_with_lines(vec![line("tee-01", "100.00", 2)])
}

pub fn request_with_lines(lines: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        buyer: BuyerSnapshot {
            id: BuyerId::try_new("buyer-1").unwrap(),
            name: "Ana Silva".into(),
            email: "ana@example.com".into(),
            phone: Some("+55 41 99999-0000".into()),
        },
        lines,
        payment_method: PaymentMethod::Pix,
        shipping: ShippingSelection {
            carrier: "Correios PAC".into(),
            cost: money("10.00"),
            estimated_days: 7,
        },
        address: ShippingAddress {
            street: "Rua das Flores".into(),
            number: "100".into(),
            complement: None,
            neighborhood: "Centro".into(),
            city: "Curitiba".into(),
            state: "PR".into(),
            postal_code: "80000-000".into(),
        },
        discount: Money::zero(),
        notes: None,
        checkout_key: None,
    }
}

pub fn with_key(mut request: CheckoutRequest, key: &str) -> CheckoutRequest {
    request.checkout_key = Some(CheckoutKey::try_new(key).unwrap());
    request
}

/// Records every delivered event kind.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap()
            .push(event.kind().to_string());
        Ok(())
    }
}

/// Always fails; the lifecycle must not care.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn channel(&self) -> &str {
        "broken-email"
    }

    async fn deliver(&self, _event: &OrderEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery {
            channel: "broken-email".into(),
            message: "smtp timeout".into(),
        })
    }
}
