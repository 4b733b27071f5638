//! Cart store operations
//!
//! Carts are owned by an external service; settlement only clears them.

use sqlx::PgConnection;

/// Empty the user's cart, part of every settlement transaction.
pub async fn clear_for_user(conn: &mut PgConnection, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
