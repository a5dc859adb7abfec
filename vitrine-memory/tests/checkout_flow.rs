//! Checkout flow against the in-memory store and a scripted gateway.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{checkout_request, lifecycle_over, seeded_store};
use vitrine::errors::{PaymentError, PaymentResult};
use vitrine::order::{OrderStatus, PaymentStatus};
use vitrine::payment::{
    ChargeReceipt, ChargeRequest, ChargeStatus, GatewayPaymentId, PaymentGateway,
};
use vitrine::shipping::{
    PostalCode, ShippingError, ShippingManifest, ShippingQuote, ShippingQuoter, StaticQuoter,
};
use vitrine::{BillingInfo, CheckoutError, CheckoutFlow};

/// Scripted gateway: fails on demand, reports a configurable status.
struct ScriptedGateway {
    fail_create: AtomicBool,
    status: Mutex<PaymentStatus>,
}

impl ScriptedGateway {
    fn new() -> Self {
        Self {
            fail_create: AtomicBool::new(false),
            status: Mutex::new(PaymentStatus::Pending),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.fail_create.store(failing, Ordering::SeqCst);
    }

    fn settle(&self, status: PaymentStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> PaymentResult<ChargeReceipt> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PaymentError::Transport("connection reset".into()));
        }
        Ok(ChargeReceipt {
            payment_id: GatewayPaymentId::try_new(format!("pay_{}", request.order_number))
                .unwrap(),
            invoice_url: Some("https://gateway.test/i/1".into()),
            qr_payload: Some("00020126...".into()),
            qr_image: None,
            qr_expiration: None,
            bank_slip_url: None,
            payment_link: None,
        })
    }

    async fn charge_status(&self, _payment_id: &GatewayPaymentId) -> PaymentResult<ChargeStatus> {
        Ok(ChargeStatus {
            status: *self.status.lock().unwrap(),
            paid_value: None,
        })
    }

    async fn cancel_charge(&self, _payment_id: &GatewayPaymentId) -> PaymentResult<()> {
        Ok(())
    }

    async fn refund_charge(&self, _payment_id: &GatewayPaymentId) -> PaymentResult<()> {
        Ok(())
    }
}

struct FailingQuoter;

#[async_trait]
impl ShippingQuoter for FailingQuoter {
    async fn quotes(
        &self,
        _origin: &PostalCode,
        _destination: &PostalCode,
        _manifest: &ShippingManifest,
    ) -> Result<Vec<ShippingQuote>, ShippingError> {
        Err(ShippingError::Provider("carrier API down".into()))
    }
}

fn billing() -> BillingInfo {
    BillingInfo {
        name: "Ana Silva".into(),
        email: "ana@example.com".into(),
        tax_id: Some("123.456.789-09".into()),
        phone: None,
        postal_code: None,
        address_number: None,
    }
}

fn flow_with(
    store: &vitrine_memory::InMemoryStore,
    gateway: Arc<ScriptedGateway>,
) -> CheckoutFlow {
    CheckoutFlow::new(
        Arc::new(lifecycle_over(store)),
        gateway,
        Arc::new(StaticQuoter::default()),
    )
}

#[tokio::test]
async fn place_order_attaches_gateway_references() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    let flow = flow_with(&store, gateway);

    let placed = flow
        .place_order(checkout_request(), billing(), None)
        .await
        .unwrap();

    let receipt = placed.charge.expect("charge should have been created");
    assert_eq!(receipt.payment_id.as_ref(), "pay_1");

    let refs = placed.order.payment_refs.expect("refs stored on the order");
    assert_eq!(refs.payment_id.unwrap().as_ref(), "pay_1");
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert_eq!(placed.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn gateway_failure_keeps_the_pending_order() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.set_failing(true);
    let flow = flow_with(&store, gateway.clone());

    let placed = flow
        .place_order(checkout_request(), billing(), None)
        .await
        .unwrap();

    assert!(placed.charge.is_none());
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert!(placed.order.payment_refs.is_none());

    // The charge can be retried once the gateway recovers.
    gateway.set_failing(false);
    let retried = flow
        .retry_charge(&placed.order.id, billing(), None)
        .await
        .unwrap();
    assert!(retried.charge.is_some());
    assert!(retried.order.payment_refs.is_some());
}

#[tokio::test]
async fn reconcile_payment_applies_the_gateway_status() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    let flow = flow_with(&store, gateway.clone());

    let placed = flow
        .place_order(checkout_request(), billing(), None)
        .await
        .unwrap();

    gateway.settle(PaymentStatus::Confirmed);
    let reconciled = flow.reconcile_payment(&placed.order.id).await.unwrap();

    assert_eq!(reconciled.status, OrderStatus::Paid);
    assert_eq!(reconciled.payment_status, PaymentStatus::Confirmed);
    assert!(reconciled.paid_at.is_some());
}

#[tokio::test]
async fn reconcile_without_a_charge_is_an_error() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.set_failing(true);
    let flow = flow_with(&store, gateway);

    let placed = flow
        .place_order(checkout_request(), billing(), None)
        .await
        .unwrap();

    let result = flow.reconcile_payment(&placed.order.id).await;
    assert!(matches!(result, Err(CheckoutError::NoCharge(_))));
}

#[tokio::test]
async fn retry_charge_is_rejected_once_settled() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    let flow = flow_with(&store, gateway.clone());

    let placed = flow
        .place_order(checkout_request(), billing(), None)
        .await
        .unwrap();
    gateway.settle(PaymentStatus::Received);
    flow.reconcile_payment(&placed.order.id).await.unwrap();

    let result = flow.retry_charge(&placed.order.id, billing(), None).await;
    assert!(matches!(
        result,
        Err(CheckoutError::NotChargeable {
            status: PaymentStatus::Received,
            ..
        })
    ));
}

#[tokio::test]
async fn shipping_quotes_fall_back_when_the_provider_fails() {
    let store = seeded_store(10);
    let gateway = Arc::new(ScriptedGateway::new());
    let flow = CheckoutFlow::new(
        Arc::new(lifecycle_over(&store)),
        gateway,
        Arc::new(FailingQuoter),
    );

    let quotes = flow
        .shipping_quotes(
            &PostalCode::try_new("80000-000").unwrap(),
            &PostalCode::try_new("01310-100").unwrap(),
            &ShippingManifest::default(),
        )
        .await;

    assert!(!quotes.is_empty(), "fallback rates must kick in");
    assert!(quotes.iter().any(|q| q.carrier.contains("PAC")));
}
