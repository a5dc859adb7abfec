//! Store trait implementations on the `PostgreSQL` pool.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, instrument};
use vitrine::errors::{StoreError, StoreResult};
use vitrine::store::{NewOrder, OrderStore, OverdrawPolicy, ProductStore, StockTaken};
use vitrine::types::{BuyerId, OrderId, OrderNumber, ProductId, Quantity, Revision};
use vitrine::{Order, Product};

use crate::{is_unique_violation, map_sqlx_error, PostgresStore};

fn decode_order(row: &PgRow) -> StoreResult<Order> {
    let record: Value = row.try_get("record").map_err(map_sqlx_error)?;
    serde_json::from_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_product(row: &PgRow) -> StoreResult<Product> {
    let record: Value = row.try_get("record").map_err(map_sqlx_error)?;
    serde_json::from_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn stock_delta(quantity: Quantity) -> StoreResult<i32> {
    i32::try_from(u32::from(quantity)).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[allow(clippy::cast_sign_loss)]
fn stock_level(level: i32) -> u32 {
    level.max(0) as u32
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[instrument(name = "postgres.insert_order", skip(self, new_order))]
    async fn insert_order(&self, new_order: NewOrder) -> StoreResult<Order> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let raw_number: i64 = sqlx::query_scalar("SELECT nextval('vitrine_order_number_seq')")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let number = u64::try_from(raw_number)
            .ok()
            .and_then(|n| OrderNumber::try_new(n).ok())
            .ok_or_else(|| {
                StoreError::Serialization(format!("sequence produced invalid order number {raw_number}"))
            })?;

        let checkout_key = new_order.checkout_key.clone();
        let order = new_order.into_order(number);
        let record = encode(&order)?;

        let insert = sqlx::query(
            "INSERT INTO vitrine_orders
                (id, number, buyer_id, checkout_key, status, payment_status, revision, record, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(order.id.as_ref())
        .bind(raw_number)
        .bind(order.buyer.id.as_ref())
        .bind(checkout_key.as_ref().map(AsRef::as_ref))
        .bind(order.status.to_string())
        .bind(order.payment_status.to_string())
        .bind(0_i64)
        .bind(&record)
        .bind(order.created_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .execute(&mut *tx)
        .await;

        match insert {
            Ok(_) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                debug!(order_id = %order.id, number = %order.number, "order inserted");
                Ok(order)
            }
            Err(err) if is_unique_violation(&err, "checkout_key") => {
                drop(tx);
                let key = checkout_key.ok_or_else(|| map_sqlx_error(err))?;
                let existing: Option<String> =
                    sqlx::query_scalar("SELECT id FROM vitrine_orders WHERE checkout_key = $1")
                        .bind(key.as_ref())
                        .fetch_optional(self.pool())
                        .await
                        .map_err(map_sqlx_error)?;
                let existing = existing
                    .and_then(|id| OrderId::try_new(id).ok())
                    .ok_or_else(|| {
                        StoreError::Backend("duplicate checkout key but original order vanished".into())
                    })?;
                Err(StoreError::DuplicateCheckout { key, existing })
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    #[instrument(name = "postgres.order", skip(self))]
    async fn order(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT record FROM vitrine_orders WHERE id = $1")
            .bind(id.as_ref())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(decode_order).transpose()
    }

    #[instrument(name = "postgres.order_by_number", skip(self))]
    async fn order_by_number(&self, number: OrderNumber) -> StoreResult<Option<Order>> {
        let raw = i64::try_from(u64::from(number))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let row = sqlx::query("SELECT record FROM vitrine_orders WHERE number = $1")
            .bind(raw)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(decode_order).transpose()
    }

    #[instrument(name = "postgres.orders_for_buyer", skip(self))]
    async fn orders_for_buyer(&self, buyer: &BuyerId) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT record FROM vitrine_orders WHERE buyer_id = $1 ORDER BY number DESC",
        )
        .bind(buyer.as_ref())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        rows.iter().map(decode_order).collect()
    }

    #[instrument(name = "postgres.all_orders", skip(self))]
    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query("SELECT record FROM vitrine_orders ORDER BY number DESC")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_order).collect()
    }

    #[instrument(name = "postgres.update_order", skip(self, order))]
    async fn update_order(&self, order: &Order, expected: Revision) -> StoreResult<Order> {
        let mut saved = order.clone();
        saved.revision = expected.next();
        let record = encode(&saved)?;

        let expected_raw = i64::try_from(u64::from(expected))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let next_raw = i64::try_from(u64::from(saved.revision))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE vitrine_orders
             SET status = $2, payment_status = $3, revision = $4, record = $5, updated_at = $6
             WHERE id = $1 AND revision = $7",
        )
        .bind(saved.id.as_ref())
        .bind(saved.status.to_string())
        .bind(saved.payment_status.to_string())
        .bind(next_raw)
        .bind(&record)
        .bind(saved.updated_at.as_datetime())
        .bind(expected_raw)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 1 {
            return Ok(saved);
        }

        // Zero rows: either the order is gone or someone else wrote first.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT revision FROM vitrine_orders WHERE id = $1")
                .bind(saved.id.as_ref())
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        match current {
            None => Err(StoreError::OrderMissing(saved.id.clone())),
            Some(revision) => Err(StoreError::RevisionConflict {
                order_id: saved.id.clone(),
                expected,
                current: Revision::new(u64::try_from(revision).unwrap_or(0)),
            }),
        }
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[instrument(name = "postgres.product", skip(self))]
    async fn product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query("SELECT record FROM vitrine_products WHERE id = $1")
            .bind(id.as_ref())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(name = "postgres.all_products", skip(self))]
    async fn all_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query("SELECT record FROM vitrine_products ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_product).collect()
    }

    #[instrument(name = "postgres.upsert_product", skip(self, product), fields(product_id = %product.id))]
    async fn upsert_product(&self, product: &Product) -> StoreResult<()> {
        let record = encode(product)?;
        let stock = i32::try_from(product.stock)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO vitrine_products (id, stock, record, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET stock = EXCLUDED.stock, record = EXCLUDED.record, updated_at = EXCLUDED.updated_at",
        )
        .bind(product.id.as_ref())
        .bind(stock)
        .bind(&record)
        .bind(product.updated_at.as_datetime())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(name = "postgres.decrement_stock", skip(self))]
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: Quantity,
        policy: OverdrawPolicy,
    ) -> StoreResult<StockTaken> {
        let delta = stock_delta(quantity)?;

        // One conditional statement per policy; the FROM-subquery exposes
        // the pre-update stock so the taken amount comes back with the row.
        let sql = match policy {
            OverdrawPolicy::Reject => {
                "UPDATE vitrine_products p
                 SET stock = p.stock - $2,
                     record = jsonb_set(p.record, '{stock}', to_jsonb(p.stock - $2)),
                     updated_at = NOW()
                 FROM (SELECT id, stock AS prev_stock FROM vitrine_products WHERE id = $1 FOR UPDATE) old
                 WHERE p.id = old.id AND old.prev_stock >= $2
                 RETURNING old.prev_stock, p.stock AS new_stock"
            }
            OverdrawPolicy::Clamp => {
                "UPDATE vitrine_products p
                 SET stock = GREATEST(p.stock - $2, 0),
                     record = jsonb_set(p.record, '{stock}', to_jsonb(GREATEST(p.stock - $2, 0))),
                     updated_at = NOW()
                 FROM (SELECT id, stock AS prev_stock FROM vitrine_products WHERE id = $1 FOR UPDATE) old
                 WHERE p.id = old.id
                 RETURNING old.prev_stock, p.stock AS new_stock"
            }
        };

        let row = sqlx::query(sql)
            .bind(id.as_ref())
            .bind(delta)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            let prev: i32 = row.try_get("prev_stock").map_err(map_sqlx_error)?;
            let new: i32 = row.try_get("new_stock").map_err(map_sqlx_error)?;
            return Ok(StockTaken {
                taken: stock_level(prev) - stock_level(new),
                remaining: stock_level(new),
            });
        }

        // No row updated: distinguish a missing product from a shortfall.
        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM vitrine_products WHERE id = $1")
                .bind(id.as_ref())
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        match available {
            None => Err(StoreError::ProductMissing(id.clone())),
            Some(stock) => Err(StoreError::InsufficientStock {
                product_id: id.clone(),
                requested: u32::from(quantity),
                available: stock_level(stock),
            }),
        }
    }

    #[instrument(name = "postgres.restore_stock", skip(self))]
    async fn restore_stock(&self, id: &ProductId, quantity: Quantity) -> StoreResult<u32> {
        let delta = stock_delta(quantity)?;

        let row = sqlx::query(
            "UPDATE vitrine_products
             SET stock = stock + $2,
                 record = jsonb_set(record, '{stock}', to_jsonb(stock + $2)),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING stock",
        )
        .bind(id.as_ref())
        .bind(delta)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let level: i32 = row.try_get("stock").map_err(map_sqlx_error)?;
                Ok(stock_level(level))
            }
            None => Err(StoreError::ProductMissing(id.clone())),
        }
    }
}
