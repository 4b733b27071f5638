//! Order ledger persistence

use rust_decimal::Decimal;
use shared::models::{Order, OrderLine, OrderStatus, PaymentStatus, ShippingAddress};
use sqlx::{PgConnection, PgPool};

use super::BoxError;

pub struct CreateOrder<'a> {
    pub id: i64,
    pub user_id: i64,
    pub payment_status: &'a str,
    pub payment_method: &'a str,
    pub total: Decimal,
    pub shipping_address: &'a ShippingAddress,
    /// Gateway correlation id, gateway orders only
    pub khalti_pidx: Option<&'a str>,
    /// Embedded provisional lines (empty for directly settled orders)
    pub items: &'a [OrderLine],
    pub now: i64,
}

pub async fn insert(conn: &mut PgConnection, order: &CreateOrder<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, status, payment_status, payment_method, total,
                             shipping_address, khalti_pidx, items, created_at, updated_at)
         VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $9)",
    )
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.payment_status)
    .bind(order.payment_method)
    .bind(order.total)
    .bind(sqlx::types::Json(order.shipping_address))
    .bind(order.khalti_pidx)
    .bind(sqlx::types::Json(order.items))
    .bind(order.now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Insert one durable line-item row per order line.
pub async fn insert_items(
    conn: &mut PgConnection,
    order_id: i64,
    lines: &[OrderLine],
) -> Result<(), sqlx::Error> {
    for line in lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Provisional order row, locked during settlement
#[derive(Debug, sqlx::FromRow)]
pub struct ProvisionalOrder {
    pub id: i64,
    pub user_id: i64,
    pub payment_status: String,
    pub items: serde_json::Value,
}

/// Row-lock the order matching a gateway correlation id. The lock serializes
/// duplicate callbacks for the same pidx.
pub async fn lock_by_pidx(
    conn: &mut PgConnection,
    pidx: &str,
) -> Result<Option<ProvisionalOrder>, sqlx::Error> {
    sqlx::query_as::<_, ProvisionalOrder>(
        "SELECT id, user_id, payment_status, items FROM orders
         WHERE khalti_pidx = $1 FOR UPDATE",
    )
    .bind(pidx)
    .fetch_optional(conn)
    .await
}

/// The single gateway-settlement transition: payment completed + transaction id.
pub async fn mark_settled(
    conn: &mut PgConnection,
    order_id: i64,
    transaction_id: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET payment_status = 'completed', transaction_id = $2, updated_at = $3
         WHERE id = $1",
    )
    .bind(order_id)
    .bind(transaction_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Fail a pending gateway order by correlation id. No-op if the order was
/// already settled or failed.
pub async fn mark_failed_by_pidx(pool: &PgPool, pidx: &str, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET payment_status = 'failed', updated_at = $2
         WHERE khalti_pidx = $1 AND payment_status = 'pending'",
    )
    .bind(pidx)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_payment_failed(
    pool: &PgPool,
    order_id: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET payment_status = 'failed', updated_at = $2
         WHERE id = $1 AND payment_status = 'pending'",
    )
    .bind(order_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    payment_status: String,
    payment_method: String,
    total: Decimal,
    shipping_address: serde_json::Value,
    khalti_pidx: Option<String>,
    transaction_id: Option<String>,
    items: serde_json::Value,
    created_at: i64,
    updated_at: i64,
}

const ORDER_COLUMNS: &str = "id, user_id, status, payment_status, payment_method, total, \
     shipping_address, khalti_pidx, transaction_id, items, created_at, updated_at";

impl OrderRow {
    /// Assemble the wire model. Durable order_items rows win; provisional
    /// orders that were never materialized fall back to the embedded lines.
    fn into_model(self, item_rows: Vec<OrderLine>) -> Result<Order, BoxError> {
        let items = if item_rows.is_empty() {
            serde_json::from_value(self.items)?
        } else {
            item_rows
        };
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status: OrderStatus::from_db(&self.status)
                .ok_or_else(|| format!("unknown order status: {}", self.status))?,
            payment_status: PaymentStatus::from_db(&self.payment_status)
                .ok_or_else(|| format!("unknown payment status: {}", self.payment_status))?,
            payment_method: self.payment_method,
            total: self.total,
            shipping_address: serde_json::from_value(self.shipping_address)?,
            khalti_pidx: self.khalti_pidx,
            transaction_id: self.transaction_id,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn items_for(pool: &PgPool, order_id: i64) -> Result<Vec<OrderLine>, sqlx::Error> {
    let rows: Vec<(i64, i32, Decimal)> = sqlx::query_as(
        "SELECT product_id, quantity, price FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(product_id, quantity, price)| OrderLine {
            product_id,
            quantity,
            price,
        })
        .collect())
}

pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Order>, BoxError> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = items_for(pool, row.id).await?;
        orders.push(row.into_model(items)?);
    }
    Ok(orders)
}

pub async fn find_for_user(
    pool: &PgPool,
    order_id: i64,
    user_id: i64,
) -> Result<Option<Order>, BoxError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
    ))
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let items = items_for(pool, row.id).await?;
            Ok(Some(row.into_model(items)?))
        }
        None => Ok(None),
    }
}

pub struct AdminOrderFilter<'a> {
    pub status: Option<&'a str>,
    pub payment_status: Option<&'a str>,
    /// Matches the order id or the shipping recipient name
    pub search: Option<&'a str>,
    pub limit: i64,
    pub offset: i64,
}

const ADMIN_FILTER: &str = "($1::text IS NULL OR status = $1)
           AND ($2::text IS NULL OR payment_status = $2)
           AND ($3::text IS NULL
                OR id::text = $3
                OR shipping_address->>'fullName' ILIKE '%' || $3 || '%')";

pub async fn list_all(pool: &PgPool, filter: &AdminOrderFilter<'_>) -> Result<Vec<Order>, BoxError> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE {ADMIN_FILTER}
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5"
    ))
    .bind(filter.status)
    .bind(filter.payment_status)
    .bind(filter.search)
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = items_for(pool, row.id).await?;
        orders.push(row.into_model(items)?);
    }
    Ok(orders)
}

pub async fn count_all(pool: &PgPool, filter: &AdminOrderFilter<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders WHERE {ADMIN_FILTER}"))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(filter.search)
        .fetch_one(pool)
        .await
}

/// Admin status mutation. Enum values are validated at the API layer;
/// this is a pure field update with no stock side effects.
pub async fn update_status(
    pool: &PgPool,
    order_id: i64,
    status: Option<&str>,
    payment_status: Option<&str>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = COALESCE($2, status),
                           payment_status = COALESCE($3, payment_status),
                           updated_at = $4
         WHERE id = $1",
    )
    .bind(order_id)
    .bind(status)
    .bind(payment_status)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Gateway orders still pending settlement and older than the cutoff,
/// candidates for reconciliation.
pub async fn list_stale_pending(
    pool: &PgPool,
    cutoff_ms: i64,
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, khalti_pidx FROM orders
         WHERE khalti_pidx IS NOT NULL AND payment_status = 'pending' AND created_at < $1
         ORDER BY created_at",
    )
    .bind(cutoff_ms)
    .fetch_all(pool)
    .await
}
