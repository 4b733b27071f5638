//! Catalog store operations
//!
//! The catalog is owned by an external service; checkout only reads active
//! products and performs conditional stock decrements.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

/// Price and stock of an active product, read at validation time
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

/// Look up an active product. Deleted products are invisible to checkout.
pub async fn find_active_by_id(
    pool: &PgPool,
    product_id: i64,
) -> Result<Option<CatalogEntry>, sqlx::Error> {
    sqlx::query_as::<_, CatalogEntry>(
        "SELECT id, name, price, stock FROM products WHERE id = $1 AND status = 'active'",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
}

/// Conditional atomic stock decrement: succeeds only if the product is active
/// and currently holds at least `quantity` units. Returns false otherwise,
/// letting the caller reject (and roll back) the enclosing settlement.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: i64,
    quantity: i32,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2, updated_at = $3
         WHERE id = $1 AND status = 'active' AND stock >= $2",
    )
    .bind(product_id)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
