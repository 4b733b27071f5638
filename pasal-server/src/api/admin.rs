//! Admin order management

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ApiResponse, ErrorCode};
use shared::models::{Order, OrderStatus, PaymentStatus};
use shared::util::now_millis;

use crate::db::orders::{self, AdminOrderFilter};
use crate::error::{ServiceError, ServiceResult};
use crate::state::AppState;

const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    /// Order id or shipping recipient name
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// GET /api/admin/orders
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ServiceResult<ApiResponse<OrderPage>> {
    if let Some(status) = params.status.as_deref() {
        if OrderStatus::from_db(status).is_none() {
            return Err(AppError::validation(format!("invalid status: {status}")).into());
        }
    }
    if let Some(payment_status) = params.payment_status.as_deref() {
        if PaymentStatus::from_db(payment_status).is_none() {
            return Err(
                AppError::validation(format!("invalid payment status: {payment_status}")).into(),
            );
        }
    }

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, MAX_PER_PAGE);

    let filter = AdminOrderFilter {
        status: params.status.as_deref(),
        payment_status: params.payment_status.as_deref(),
        search: params.search.as_deref().filter(|s| !s.is_empty()),
        limit: per_page,
        offset: (page - 1) * per_page,
    };
    let orders = orders::list_all(&state.pool, &filter)
        .await
        .map_err(ServiceError::Db)?;
    let total = orders::count_all(&state.pool, &filter).await?;

    Ok(ApiResponse::success(OrderPage {
        orders,
        total,
        page,
        per_page,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

/// PUT /api/admin/orders/{id}
///
/// Pure field mutation; never touches stock or line items.
pub async fn update(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(req): Json<UpdateOrderRequest>,
) -> ServiceResult<ApiResponse<()>> {
    if req.status.is_none() && req.payment_status.is_none() {
        return Err(AppError::validation("nothing to update").into());
    }
    if let Some(status) = req.status.as_deref() {
        if OrderStatus::from_db(status).is_none() {
            return Err(AppError::validation(format!("invalid status: {status}")).into());
        }
    }
    if let Some(payment_status) = req.payment_status.as_deref() {
        if PaymentStatus::from_db(payment_status).is_none() {
            return Err(
                AppError::validation(format!("invalid payment status: {payment_status}")).into(),
            );
        }
    }

    let found = orders::update_status(
        &state.pool,
        order_id,
        req.status.as_deref(),
        req.payment_status.as_deref(),
        now_millis(),
    )
    .await?;
    if !found {
        return Err(AppError::new(ErrorCode::OrderNotFound).into());
    }

    tracing::info!(order_id, "order status updated");
    Ok(ApiResponse::ok())
}
