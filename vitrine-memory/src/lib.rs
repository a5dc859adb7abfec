//! In-memory store adapter for the Vitrine order lifecycle core.
//!
//! Implements both store traits behind shared `RwLock`ed maps, for tests
//! and development where persistence is not required. The concurrency
//! contract still holds: order numbers come from a counter inside the same
//! lock as the order map, stock decrements are check-and-set under the
//! write lock, and updates enforce the revision token.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use vitrine::errors::{StoreError, StoreResult};
use vitrine::store::{NewOrder, OrderStore, OverdrawPolicy, ProductStore, StockTaken};
use vitrine::types::{
    BuyerId, CheckoutKey, OrderId, OrderNumber, ProductId, Quantity, Revision, Timestamp,
};
use vitrine::{Order, Product};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    by_number: HashMap<u64, OrderId>,
    by_checkout_key: HashMap<CheckoutKey, OrderId>,
    // Persistent counter, not a row count: deleting nothing is an
    // invariant, but the counter must survive either way.
    issued_numbers: u64,
    products: HashMap<ProductId, Product>,
}

/// Thread-safe in-memory order and product store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product, replacing any existing record with the same id.
    ///
    /// Convenience for tests and demos; the async trait method does the
    /// same thing.
    pub fn seed_product(&self, product: Product) {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.products.insert(product.id.clone(), product);
    }

    /// Current stock of a product, when it exists.
    pub fn stock_of(&self, id: &ProductId) -> Option<u32> {
        let state = self.state.read().expect("RwLock poisoned");
        state.products.get(id).map(|p| p.stock)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, new_order: NewOrder) -> StoreResult<Order> {
        let mut state = self.state.write().expect("RwLock poisoned");

        if let Some(key) = &new_order.checkout_key {
            if let Some(existing) = state.by_checkout_key.get(key) {
                return Err(StoreError::DuplicateCheckout {
                    key: key.clone(),
                    existing: existing.clone(),
                });
            }
        }

        state.issued_numbers += 1;
        let number_raw = state.issued_numbers;
        let number = OrderNumber::try_new(number_raw)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let checkout_key = new_order.checkout_key.clone();
        let order = new_order.into_order(number);
        state.by_number.insert(number_raw, order.id.clone());
        if let Some(key) = checkout_key {
            state.by_checkout_key.insert(key, order.id.clone());
        }
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn order(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.orders.get(id).cloned())
    }

    async fn order_by_number(&self, number: OrderNumber) -> StoreResult<Option<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state
            .by_number
            .get(&u64::from(number))
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn orders_for_buyer(&self, buyer: &BuyerId) -> StoreResult<Vec<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| &o.buyer.id == buyer)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(orders)
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(orders)
    }

    async fn update_order(&self, order: &Order, expected: Revision) -> StoreResult<Order> {
        let mut state = self.state.write().expect("RwLock poisoned");

        let current = state
            .orders
            .get(&order.id)
            .ok_or_else(|| StoreError::OrderMissing(order.id.clone()))?;

        if current.revision != expected {
            return Err(StoreError::RevisionConflict {
                order_id: order.id.clone(),
                expected,
                current: current.revision,
            });
        }

        let mut saved = order.clone();
        saved.revision = expected.next();
        state.orders.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let state = self.state.read().expect("RwLock poisoned");
        Ok(state.products.get(id).cloned())
    }

    async fn all_products(&self) -> StoreResult<Vec<Product>> {
        let state = self.state.read().expect("RwLock poisoned");
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        let mut state = self.state.write().expect("RwLock poisoned");
        state.products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: Quantity,
        policy: OverdrawPolicy,
    ) -> StoreResult<StockTaken> {
        let mut state = self.state.write().expect("RwLock poisoned");

        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductMissing(id.clone()))?;

        let requested = u32::from(quantity);
        let available = product.stock;

        let taken = match policy {
            OverdrawPolicy::Reject => {
                if requested > available {
                    return Err(StoreError::InsufficientStock {
                        product_id: id.clone(),
                        requested,
                        available,
                    });
                }
                requested
            }
            OverdrawPolicy::Clamp => requested.min(available),
        };

        product.stock = available - taken;
        product.updated_at = Timestamp::now();
        Ok(StockTaken {
            taken,
            remaining: product.stock,
        })
    }

    async fn restore_stock(&self, id: &ProductId, quantity: Quantity) -> StoreResult<u32> {
        let mut state = self.state.write().expect("RwLock poisoned");

        let product = state
            .products
            .get_mut(id)
            .ok_or_else(|| StoreError::ProductMissing(id.clone()))?;

        product.stock = product.stock.saturating_add(u32::from(quantity));
        product.updated_at = Timestamp::now();
        Ok(product.stock)
    }
}
