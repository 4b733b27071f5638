//! Checkout orchestration: line validation, direct settlement, provisional
//! gateway orders and their settlement on verified payment.

pub mod pricing;

use rust_decimal::Decimal;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderLine, ShippingAddress};
use shared::util::{now_millis, snowflake_id};
use sqlx::PgPool;

use crate::db::{cart, catalog, orders};
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::LookupStatus;

#[derive(Debug, serde::Deserialize)]
pub struct RequestedLine {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub quantity: i32,
}

/// Price every requested line against the live catalog. First failing line
/// wins; client-supplied prices never enter the result.
pub async fn validate_lines(
    pool: &PgPool,
    requested: &[RequestedLine],
) -> ServiceResult<Vec<OrderLine>> {
    if requested.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty).into());
    }

    let mut lines = Vec::with_capacity(requested.len());
    for req in requested {
        if req.quantity < 1 {
            return Err(AppError::validation("quantity must be at least 1")
                .with_detail("productId", req.product_id)
                .into());
        }
        let entry = catalog::find_active_by_id(pool, req.product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::from(
                    AppError::new(ErrorCode::ProductNotFound)
                        .with_detail("productId", req.product_id),
                )
            })?;
        if entry.stock < req.quantity {
            return Err(AppError::new(ErrorCode::ProductOutOfStock)
                .with_detail("productId", req.product_id)
                .with_detail("available", entry.stock)
                .into());
        }
        lines.push(OrderLine {
            product_id: req.product_id,
            quantity: req.quantity,
            price: entry.price,
        });
    }
    Ok(lines)
}

/// Direct settlement path (cash on delivery, card on file). The order, its
/// line items, the stock decrements and the cart clear commit together or
/// not at all.
pub async fn create_settled_order(
    pool: &PgPool,
    user_id: i64,
    requested: &[RequestedLine],
    shipping_address: &ShippingAddress,
    payment_method: &str,
    payment_status: &str,
) -> ServiceResult<(i64, Decimal)> {
    let lines = validate_lines(pool, requested).await?;
    let total = pricing::subtotal(&lines);
    let order_id = snowflake_id();
    let now = now_millis();

    let mut tx = pool.begin().await?;
    for line in &lines {
        if !catalog::decrement_stock(&mut *tx, line.product_id, line.quantity, now).await? {
            tx.rollback().await?;
            return Err(AppError::new(ErrorCode::ProductOutOfStock)
                .with_detail("productId", line.product_id)
                .into());
        }
    }
    orders::insert(
        &mut *tx,
        &orders::CreateOrder {
            id: order_id,
            user_id,
            payment_status,
            payment_method,
            total,
            shipping_address,
            khalti_pidx: None,
            items: &[],
            now,
        },
    )
    .await?;
    orders::insert_items(&mut *tx, order_id, &lines).await?;
    cart::clear_for_user(&mut *tx, user_id).await?;
    tx.commit().await?;

    Ok((order_id, total))
}

/// Persist a pending order awaiting gateway settlement. Line items stay
/// embedded on the order row; no stock is touched until the payment is
/// verified.
pub async fn create_provisional_order(
    pool: &PgPool,
    order_id: i64,
    user_id: i64,
    lines: &[OrderLine],
    total: Decimal,
    shipping_address: &ShippingAddress,
    pidx: &str,
) -> ServiceResult<i64> {
    let now = now_millis();

    let mut tx = pool.begin().await?;
    orders::insert(
        &mut *tx,
        &orders::CreateOrder {
            id: order_id,
            user_id,
            payment_status: "pending",
            payment_method: "khalti",
            total,
            shipping_address,
            khalti_pidx: Some(pidx),
            items: lines,
            now,
        },
    )
    .await?;
    tx.commit().await?;

    Ok(order_id)
}

#[derive(Debug, PartialEq)]
pub enum SettlementOutcome {
    Settled { order_id: i64 },
    /// A previous callback already settled this order; nothing was written.
    AlreadySettled { order_id: i64 },
}

/// Turn a verified gateway order into a settled one: stock decrements,
/// durable line items, completed payment status and a cleared cart, all in
/// one transaction. Duplicate callbacks are serialized by the row lock and
/// short-circuit once the order is completed.
pub async fn materialize_on_settlement(
    pool: &PgPool,
    pidx: &str,
    transaction_id: &str,
) -> ServiceResult<SettlementOutcome> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let order = orders::lock_by_pidx(&mut *tx, pidx)
        .await?
        .ok_or_else(|| ServiceError::from(AppError::new(ErrorCode::OrderNotFound)))?;

    if order.payment_status == "completed" {
        tx.rollback().await?;
        return Ok(SettlementOutcome::AlreadySettled { order_id: order.id });
    }

    let lines: Vec<OrderLine> = serde_json::from_value(order.items)?;
    for line in &lines {
        if !catalog::decrement_stock(&mut *tx, line.product_id, line.quantity, now).await? {
            tx.rollback().await?;
            orders::mark_payment_failed(pool, order.id, now).await?;
            return Err(AppError::new(ErrorCode::ProductOutOfStock)
                .with_detail("productId", line.product_id)
                .into());
        }
    }
    orders::insert_items(&mut *tx, order.id, &lines).await?;
    orders::mark_settled(&mut *tx, order.id, transaction_id, now).await?;
    cart::clear_for_user(&mut *tx, order.user_id).await?;
    tx.commit().await?;

    Ok(SettlementOutcome::Settled { order_id: order.id })
}

#[derive(Debug, PartialEq)]
pub enum GatewayVerdict {
    Settled,
    /// Still pending on the gateway side; leave the order untouched.
    InFlight,
    Failed(&'static str),
}

/// Classify a gateway lookup status. Only a verified Completed settles;
/// callback query parameters are never trusted.
pub fn classify_lookup(status: &LookupStatus) -> GatewayVerdict {
    match status {
        LookupStatus::Completed => GatewayVerdict::Settled,
        LookupStatus::Pending | LookupStatus::Initiated => GatewayVerdict::InFlight,
        LookupStatus::Expired => GatewayVerdict::Failed("payment_expired"),
        LookupStatus::UserCanceled => GatewayVerdict::Failed("payment_canceled"),
        LookupStatus::Refunded | LookupStatus::Other(_) => {
            GatewayVerdict::Failed("payment_not_completed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_settles() {
        assert_eq!(
            classify_lookup(&LookupStatus::Completed),
            GatewayVerdict::Settled
        );
        assert_eq!(
            classify_lookup(&LookupStatus::Pending),
            GatewayVerdict::InFlight
        );
        assert_eq!(
            classify_lookup(&LookupStatus::Initiated),
            GatewayVerdict::InFlight
        );
    }

    #[test]
    fn terminal_failures_carry_a_reason() {
        assert_eq!(
            classify_lookup(&LookupStatus::Expired),
            GatewayVerdict::Failed("payment_expired")
        );
        assert_eq!(
            classify_lookup(&LookupStatus::UserCanceled),
            GatewayVerdict::Failed("payment_canceled")
        );
        assert_eq!(
            classify_lookup(&LookupStatus::Refunded),
            GatewayVerdict::Failed("payment_not_completed")
        );
        assert_eq!(
            classify_lookup(&LookupStatus::Other("Partially refunded".into())),
            GatewayVerdict::Failed("payment_not_completed")
        );
    }
}
