//! User-facing order endpoints

use axum::Extension;
use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ApiResponse, ErrorCode};
use shared::models::{Order, PaymentStatus, ShippingAddress};

use crate::auth::Identity;
use crate::checkout::{self, RequestedLine};
use crate::db::orders;
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<RequestedLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    /// Initial settlement state, e.g. "completed" for card-on-file
    pub payment_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderData {
    pub order_id: i64,
    pub total: Decimal,
}

/// POST /api/orders
///
/// Direct settlement for offline payment methods. Gateway payments must go
/// through the initiate-payment flow instead.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> ServiceResult<ApiResponse<CreateOrderData>> {
    match req.payment_method.as_str() {
        "cash" | "card" => {}
        "khalti" => {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                "khalti orders must be created via initiate-payment",
            )
            .into());
        }
        other => {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvalidMethod,
                format!("unsupported payment method: {other}"),
            )
            .into());
        }
    }

    let payment_status = req.payment_status.as_deref().unwrap_or("pending");
    if PaymentStatus::from_db(payment_status).is_none() {
        return Err(
            AppError::validation(format!("invalid payment status: {payment_status}")).into(),
        );
    }

    let (order_id, total) = checkout::create_settled_order(
        &state.pool,
        identity.user_id,
        &req.items,
        &req.shipping_address,
        &req.payment_method,
        payment_status,
    )
    .await?;

    tracing::info!(order_id, user_id = identity.user_id, "order created");
    Ok(ApiResponse::success(CreateOrderData { order_id, total }))
}

/// GET /api/orders
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ServiceResult<ApiResponse<Vec<Order>>> {
    let orders = orders::list_for_user(&state.pool, identity.user_id)
        .await
        .map_err(ServiceError::Db)?;
    Ok(ApiResponse::success(orders))
}

/// GET /api/orders/{id}
pub async fn get_one(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(order_id): Path<i64>,
) -> ServiceResult<ApiResponse<Order>> {
    let order = orders::find_for_user(&state.pool, order_id, identity.user_id)
        .await
        .map_err(ServiceError::Db)?
        .ok_or_else(|| ServiceError::from(AppError::new(ErrorCode::OrderNotFound)))?;
    Ok(ApiResponse::success(order))
}
