//! End-to-end lifecycle scenarios against the in-memory store.

mod common;

use std::sync::Arc;

use common::{
    checkout_request, lifecycle_over, line, money, product_id, request_with_lines, seeded_store,
    with_key, FailingNotifier, RecordingNotifier,
};
use vitrine::notify::NotificationDispatcher;
use vitrine::order::{OrderStatus, PaymentStatus};
use vitrine::types::TrackingCode;
use vitrine::{InventoryLedger, LifecycleError, OrderLifecycle, OverdrawPolicy};

#[tokio::test]
async fn create_order_computes_totals_and_decrements_stock() {
    // Scenario A: 2 x 100.00 + shipping 10.00.
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);

    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    assert_eq!(order.totals.subtotal(), money("200.00"));
    assert_eq!(order.totals.total(), money("210.00"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(u64::from(order.number), 1);
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(8));
}

#[tokio::test]
async fn received_payment_marks_order_paid() {
    // Scenario B.
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    let updated = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Received, None)
        .await
        .unwrap();

    assert_eq!(updated.status, OrderStatus::Paid);
    assert_eq!(updated.payment_status, PaymentStatus::Received);
    assert!(updated.paid_at.is_some());
}

#[tokio::test]
async fn cancel_restores_stock_to_pre_order_level() {
    // Scenario C.
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(8));

    let cancelled = lifecycle
        .cancel_order(&order.id, Some("cliente desistiu"))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
    assert!(cancelled.notes.as_deref().unwrap().contains("cliente desistiu"));
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(10));
}

#[tokio::test]
async fn cancel_after_shipping_is_rejected_without_mutation() {
    // Scenario D.
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    lifecycle
        .update_order_status(
            &order.id,
            OrderStatus::Shipped,
            Some(TrackingCode::try_new("BR123456789").unwrap()),
        )
        .await
        .unwrap();
    let stock_before = store.stock_of(&product_id("tee-01"));

    let result = lifecycle.cancel_order(&order.id, None).await;

    assert!(matches!(
        result,
        Err(LifecycleError::NotCancellable {
            status: OrderStatus::Shipped,
            ..
        })
    ));
    let reloaded = lifecycle.order(&order.id).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Shipped);
    assert_eq!(store.stock_of(&product_id("tee-01")), stock_before);
}

#[tokio::test]
async fn concurrent_checkouts_on_last_unit_produce_one_winner() {
    // Scenario E, under the explicit Reject policy.
    let store = seeded_store(1);
    let lifecycle = lifecycle_over(&store);

    let request = request_with_lines(vec![line("tee-01", "100.00", 1)]);
    let (a, b) = tokio::join!(
        lifecycle.create_order(request.clone()),
        lifecycle.create_order(request.clone()),
    );

    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one checkout must win the last unit");

    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser,
        Err(LifecycleError::InsufficientStock {
            requested: 1,
            available: 0,
            ..
        })
    ));
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(0));
}

#[tokio::test]
async fn pay_confirmation_is_idempotent() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    let first = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    let stamped = first.paid_at.unwrap();

    let second = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();

    assert_eq!(second.paid_at, Some(stamped), "paid_at must be stamped once");
    assert_eq!(second.status, OrderStatus::Paid);

    // A later RECEIVED (both map to Paid) updates the payment status but
    // nothing else.
    let third = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Received, None)
        .await
        .unwrap();
    assert_eq!(third.paid_at, Some(stamped));
    assert_eq!(third.payment_status, PaymentStatus::Received);
}

#[tokio::test]
async fn sequential_orders_get_monotonic_numbers() {
    let store = seeded_store(100);
    let lifecycle = lifecycle_over(&store);

    for expected in 1u64..=5 {
        let order = lifecycle.create_order(checkout_request()).await.unwrap();
        assert_eq!(u64::from(order.number), expected);
    }
}

#[tokio::test]
async fn order_totals_survive_catalog_price_changes() {
    use vitrine::store::ProductStore;

    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    // Reprice the product after the sale.
    let mut product = store.product(&product_id("tee-01")).await.unwrap().unwrap();
    product.price = money("250.00");
    store.upsert_product(&product).await.unwrap();

    let reloaded = lifecycle.order(&order.id).await.unwrap();
    assert_eq!(reloaded.totals.subtotal(), money("200.00"));
    assert_eq!(reloaded.totals.total(), money("210.00"));
    assert_eq!(reloaded.lines[0].unit_price, money("100.00"));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);

    let result = lifecycle.create_order(request_with_lines(Vec::new())).await;
    assert!(matches!(result, Err(LifecycleError::EmptyCart)));
}

#[tokio::test]
async fn transition_table_blocks_illegal_direct_updates() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    // Every mutator checks the transition table, not just cancel_order.
    let result = lifecycle
        .update_order_status(&order.id, OrderStatus::Delivered, None)
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered,
            ..
        })
    ));
}

#[tokio::test]
async fn shipping_stamps_timestamp_and_tracking_code() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();
    lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();

    let shipped = lifecycle
        .update_order_status(
            &order.id,
            OrderStatus::Shipped,
            Some(TrackingCode::try_new("BR987654321").unwrap()),
        )
        .await
        .unwrap();

    assert!(shipped.shipped_at.is_some());
    assert_eq!(
        shipped.tracking_code.clone().unwrap().into_inner(),
        "BR987654321"
    );

    let delivered = lifecycle
        .update_order_status(&order.id, OrderStatus::Delivered, None)
        .await
        .unwrap();
    assert!(delivered.delivered_at.is_some());
}

#[tokio::test]
async fn refund_after_delivery_restores_stock() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    lifecycle
        .update_order_status(&order.id, OrderStatus::Shipped, None)
        .await
        .unwrap();
    lifecycle
        .update_order_status(&order.id, OrderStatus::Delivered, None)
        .await
        .unwrap();
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(8));

    let refunded = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Refunded, None)
        .await
        .unwrap();

    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(10));
}

#[tokio::test]
async fn refund_webhook_on_unpaid_order_is_rejected() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    let result = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Refunded, None)
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Refunded,
            ..
        })
    ));
    let reloaded = lifecycle.order(&order.id).await.unwrap();
    assert_eq!(reloaded.payment_status, PaymentStatus::Pending);
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(8));
}

#[tokio::test]
async fn overdue_leaves_order_status_alone() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);
    let order = lifecycle.create_order(checkout_request()).await.unwrap();

    let updated = lifecycle
        .update_payment_status(&order.id, PaymentStatus::Overdue, None)
        .await
        .unwrap();

    assert_eq!(updated.status, OrderStatus::Pending);
    assert_eq!(updated.payment_status, PaymentStatus::Overdue);
    assert!(updated.paid_at.is_none());
}

#[tokio::test]
async fn duplicate_checkout_key_returns_original_order_once() {
    let store = seeded_store(10);
    let lifecycle = lifecycle_over(&store);

    let first = lifecycle
        .create_order(with_key(checkout_request(), "ck-retry"))
        .await
        .unwrap();
    let second = lifecycle
        .create_order(with_key(checkout_request(), "ck-retry"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(u64::from(second.number), 1);
    // The duplicate's reservation was released: only one order's worth of
    // stock is gone.
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(8));
}

#[tokio::test]
async fn clamp_policy_creates_order_with_floored_stock() {
    let store = seeded_store(1);
    let ledger =
        InventoryLedger::new(Arc::new(store.clone())).with_policy(OverdrawPolicy::Clamp);
    let lifecycle = OrderLifecycle::new(Arc::new(store.clone()), ledger);

    let order = lifecycle
        .create_order(request_with_lines(vec![line("tee-01", "100.00", 3)]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(0));
}

#[tokio::test]
async fn unknown_order_is_an_explicit_error() {
    let store = seeded_store(1);
    let lifecycle = lifecycle_over(&store);
    let ghost = vitrine::OrderId::generate();

    assert!(matches!(
        lifecycle.cancel_order(&ghost, None).await,
        Err(LifecycleError::OrderNotFound(_))
    ));
    assert!(matches!(
        lifecycle
            .update_payment_status(&ghost, PaymentStatus::Confirmed, None)
            .await,
        Err(LifecycleError::OrderNotFound(_))
    ));
}

#[tokio::test]
async fn notification_failures_never_fail_the_order() {
    let store = seeded_store(10);
    let recording = Arc::new(RecordingNotifier::default());
    let dispatcher = NotificationDispatcher::new()
        .with(recording.clone())
        .with(Arc::new(FailingNotifier));
    let ledger = InventoryLedger::new(Arc::new(store.clone()));
    let lifecycle =
        OrderLifecycle::new(Arc::new(store.clone()), ledger).with_dispatcher(dispatcher);

    let order = lifecycle.create_order(checkout_request()).await.unwrap();
    lifecycle
        .update_payment_status(&order.id, PaymentStatus::Confirmed, None)
        .await
        .unwrap();
    lifecycle.cancel_order(&order.id, Some("troca")).await.unwrap();

    // Give the fire-and-forget tasks a beat to run.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let delivered = recording.delivered.lock().unwrap().clone();
    assert!(delivered.contains(&"order_created".to_string()));
    assert!(delivered.contains(&"payment_confirmed".to_string()));
    assert!(delivered.contains(&"order_cancelled".to_string()));
}

#[tokio::test]
async fn stock_conservation_across_create_and_cancel() {
    // Multi-line order: restore must put back exactly what was taken,
    // per line.
    use vitrine::store::ProductStore;

    let store = seeded_store(10);
    store.seed_product(
        vitrine::Product::new(product_id("calca-02"), "Calca Jeans", money("180.00"))
            .with_stock(4),
    );
    let lifecycle = lifecycle_over(&store);

    let order = lifecycle
        .create_order(request_with_lines(vec![
            line("tee-01", "100.00", 3),
            line("calca-02", "180.00", 2),
        ]))
        .await
        .unwrap();
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(7));
    assert_eq!(store.stock_of(&product_id("calca-02")), Some(2));

    lifecycle.cancel_order(&order.id, None).await.unwrap();

    assert_eq!(store.stock_of(&product_id("tee-01")), Some(10));
    assert_eq!(store.stock_of(&product_id("calca-02")), Some(4));

    // And stock never went negative anywhere along the way.
    for id in [product_id("tee-01"), product_id("calca-02")] {
        let product = store.product(&id).await.unwrap().unwrap();
        assert!(product.stock <= 10);
    }
}

#[tokio::test]
async fn failed_line_reservation_rolls_back_earlier_lines() {
    let store = seeded_store(10);
    // calca-02 exists with too little stock; the second line must fail and
    // the first line's decrement must be undone.
    store.seed_product(
        vitrine::Product::new(product_id("calca-02"), "Calca Jeans", money("180.00"))
            .with_stock(1),
    );
    let lifecycle = lifecycle_over(&store);

    let result = lifecycle
        .create_order(request_with_lines(vec![
            line("tee-01", "100.00", 2),
            line("calca-02", "180.00", 2),
        ]))
        .await;

    assert!(matches!(
        result,
        Err(LifecycleError::InsufficientStock { .. })
    ));
    assert_eq!(store.stock_of(&product_id("tee-01")), Some(10));
    assert_eq!(store.stock_of(&product_id("calca-02")), Some(1));
}
