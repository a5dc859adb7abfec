//! End-to-end checkout walkthrough on the in-memory store.
//!
//! Seeds a small catalog, builds a cart, places an order through a stub
//! payment gateway, confirms the payment, and prints the dashboard the
//! back office would see.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vitrine::cart::Cart;
use vitrine::errors::PaymentResult;
use vitrine::order::{BuyerSnapshot, PaymentMethod, ShippingAddress};
use vitrine::payment::{ChargeReceipt, ChargeRequest, ChargeStatus, GatewayPaymentId};
use vitrine::reporting::DateRange;
use vitrine::shipping::{PostalCode, ShippingManifest, StaticQuoter};
use vitrine::types::{BuyerId, ProductId, Quantity};
use vitrine::{
    BillingInfo, CartLine, CheckoutFlow, CheckoutRequest, InventoryLedger, Money, OrderLifecycle,
    PaymentGateway, PaymentStatus, Product, ReportingAggregator, ShippingSelection,
};
use vitrine_memory::InMemoryStore;

/// Stub gateway that approves every charge.
struct DemoGateway;

#[async_trait]
impl PaymentGateway for DemoGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> PaymentResult<ChargeReceipt> {
        Ok(ChargeReceipt {
            payment_id: GatewayPaymentId::try_new(format!("pay_demo_{}", request.order_number))
                .expect("generated id is valid"),
            invoice_url: Some("https://gateway.example/invoice/1".into()),
            qr_payload: Some("00020126580014br.gov.bcb.pix...".into()),
            qr_image: None,
            qr_expiration: None,
            bank_slip_url: None,
            payment_link: None,
        })
    }

    async fn charge_status(&self, _payment_id: &GatewayPaymentId) -> PaymentResult<ChargeStatus> {
        Ok(ChargeStatus {
            status: PaymentStatus::Confirmed,
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

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("seeding catalog");
    let store = InMemoryStore::new();
    let tee = Product::new(
        ProductId::try_new("tee-01")?,
        "Camiseta Basica",
        Money::from_cents(7990)?,
    )
    .with_cost_price(Money::from_cents(3200)?)
    .with_stock(25);
    store.seed_product(tee.clone());

    let lifecycle = Arc::new(OrderLifecycle::new(
        Arc::new(store.clone()),
        InventoryLedger::new(Arc::new(store.clone())),
    ));
    let flow = CheckoutFlow::new(
        lifecycle.clone(),
        Arc::new(DemoGateway),
        Arc::new(StaticQuoter::default()),
    );

    info!("building a cart: 2x Camiseta Basica (M, Preto)");
    let mut cart = Cart::new();
    cart.add(CartLine::from_product(
        &tee,
        Quantity::try_new(2)?,
        Some("M".into()),
        Some("Preto".into()),
    ));

    let quotes = flow
        .shipping_quotes(
            &PostalCode::try_new("80010-000")?,
            &PostalCode::try_new("01310-100")?,
            &ShippingManifest::default(),
        )
        .await;
    let chosen = quotes.first().expect("static quoter always has rates");
    info!(carrier = %chosen.carrier, cost = %chosen.cost, "shipping selected");

    let request = CheckoutRequest {
        buyer: BuyerSnapshot {
            id: BuyerId::try_new("buyer-ana")?,
            name: "Ana Silva".into(),
            email: "ana@example.com".into(),
            phone: Some("+55 41 99999-0000".into()),
        },
        lines: cart.snapshot(),
        payment_method: PaymentMethod::Pix,
        shipping: ShippingSelection {
            carrier: chosen.carrier.clone(),
            cost: chosen.cost,
            estimated_days: chosen.estimated_days,
        },
        address: ShippingAddress {
            street: "Rua das Flores".into(),
            number: "100".into(),
            complement: Some("ap 31".into()),
            neighborhood: "Centro".into(),
            city: "Curitiba".into(),
            state: "PR".into(),
            postal_code: "80010-000".into(),
        },
        discount: Money::zero(),
        notes: None,
        checkout_key: None,
    };

    let billing = BillingInfo {
        name: "Ana Silva".into(),
        email: "ana@example.com".into(),
        tax_id: Some("123.456.789-09".into()),
        phone: None,
        postal_code: None,
        address_number: None,
    };

    let placed = flow.place_order(request, billing, None).await?;
    info!(
        order = %placed.order.number,
        total = %placed.order.totals.total(),
        "order placed, awaiting PIX payment"
    );

    // The buyer pays; polling the gateway settles the order.
    let paid = flow.reconcile_payment(&placed.order.id).await?;
    info!(order = %paid.number, status = %paid.status, "payment confirmed");

    let reports = ReportingAggregator::new(Arc::new(store.clone()), Arc::new(store.clone()));
    let stats = reports.dashboard(DateRange::default()).await?;
    info!(
        orders = stats.total_orders,
        revenue = %stats.revenue_total,
        "dashboard"
    );
    let profit = reports.profit(DateRange::default()).await?;
    info!(revenue = %profit.revenue, cost = %profit.cost, profit = %profit.profit, "profit report");

    Ok(())
}
