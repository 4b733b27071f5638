//! Gateway payment endpoints: initiation and the verify callback.

use axum::Extension;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ApiResponse, ErrorCode};
use shared::models::ShippingAddress;
use shared::util::{now_millis, snowflake_id};

use crate::auth::Identity;
use crate::checkout::{self, pricing, GatewayVerdict, RequestedLine};
use crate::db::orders;
use crate::error::ServiceResult;
use crate::gateway::{CustomerInfo, InitiateRequest, PaymentGateway};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub items: Vec<RequestedLine>,
    pub shipping_address: ShippingAddress,
    pub customer_info: Option<CustomerInfo>,
    /// Where the gateway sends the customer after payment; defaults to this
    /// service's verify endpoint. Any client-supplied amount is ignored.
    pub return_url: Option<String>,
    pub website_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentData {
    pub order_id: i64,
    pub pidx: String,
    pub payment_url: String,
}

/// POST /api/orders/initiate-payment
///
/// The charge amount is recomputed from catalog prices; anything the client
/// sends about money is ignored. Nothing is persisted unless the gateway
/// accepts the initiation.
pub async fn initiate(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<InitiatePaymentRequest>,
) -> ServiceResult<ApiResponse<InitiatePaymentData>> {
    let lines = checkout::validate_lines(&state.pool, &req.items).await?;
    let total = pricing::grand_total(&lines);
    let amount_paisa = pricing::to_minor_units(total)
        .ok_or_else(|| AppError::internal("order total out of range"))?;

    let order_id = snowflake_id();
    let init = state
        .gateway
        .initiate(&InitiateRequest {
            amount: amount_paisa,
            return_url: req.return_url.unwrap_or_else(|| {
                format!("{}/api/orders/payment/verify", state.public_url)
            }),
            website_url: req
                .website_url
                .unwrap_or_else(|| state.frontend_url.clone()),
            purchase_order_id: order_id.to_string(),
            purchase_order_name: format!("Order #{order_id}"),
            customer_info: req.customer_info,
        })
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "payment initiation failed");
            AppError::new(ErrorCode::PaymentInitFailed)
        })?;

    checkout::create_provisional_order(
        &state.pool,
        order_id,
        identity.user_id,
        &lines,
        total,
        &req.shipping_address,
        &init.pidx,
    )
    .await?;

    tracing::info!(order_id, pidx = %init.pidx, "payment initiated");
    Ok(ApiResponse::success(InitiatePaymentData {
        order_id,
        pidx: init.pidx,
        payment_url: init.payment_url,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub pidx: Option<String>,
    pub transaction_id: Option<String>,
    // The gateway echoes its own status here; it is never trusted.
    #[allow(dead_code)]
    pub status: Option<String>,
}

fn success_redirect(frontend_url: &str) -> Redirect {
    Redirect::to(&format!("{frontend_url}/orders?payment=success"))
}

fn failure_redirect(frontend_url: &str, reason: &str) -> Redirect {
    Redirect::to(&format!(
        "{frontend_url}/orders?payment=failed&error={reason}"
    ))
}

/// What the callback should do, decided purely from the gateway lookup.
#[derive(Debug, PartialEq)]
enum CallbackDecision {
    Settle { transaction_id: String },
    Reject { reason: &'static str, mark_failed: bool },
}

/// Verify the payment against the gateway's lookup endpoint. The callback's
/// own query parameters never influence the decision, except as a fallback
/// transaction id when the lookup omits one.
async fn decide_callback(
    gateway: &dyn PaymentGateway,
    pidx: &str,
    callback_transaction_id: Option<String>,
) -> CallbackDecision {
    let lookup = match gateway.lookup(pidx).await {
        Ok(lookup) => lookup,
        Err(err) => {
            tracing::warn!(pidx, error = %err, "payment lookup failed");
            return CallbackDecision::Reject {
                reason: "verification_failed",
                mark_failed: false,
            };
        }
    };

    match checkout::classify_lookup(&lookup.lookup_status()) {
        GatewayVerdict::Settled => CallbackDecision::Settle {
            transaction_id: lookup
                .transaction_id
                .or(callback_transaction_id)
                .unwrap_or_default(),
        },
        GatewayVerdict::InFlight => CallbackDecision::Reject {
            reason: "payment_not_completed",
            mark_failed: false,
        },
        GatewayVerdict::Failed(reason) => CallbackDecision::Reject {
            reason,
            mark_failed: true,
        },
    }
}

/// Redirect reason when a verified-completed payment still fails to settle.
/// An unknown pidx surfaces as `OrderNotFound` from materialization.
fn settlement_failure_reason(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::OrderNotFound => "order_not_found",
        ErrorCode::ProductOutOfStock => "insufficient_stock",
        _ => "verification_failed",
    }
}

/// GET /api/orders/payment/verify
///
/// The customer's browser lands here after the gateway's hosted page. Every
/// outcome is a redirect back to the storefront; the payment state itself is
/// re-verified against the gateway's lookup endpoint.
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Redirect {
    let Some(pidx) = params.pidx.as_deref() else {
        return failure_redirect(&state.frontend_url, "verification_failed");
    };

    match decide_callback(state.gateway.as_ref(), pidx, params.transaction_id).await {
        CallbackDecision::Settle { transaction_id } => {
            match checkout::materialize_on_settlement(&state.pool, pidx, &transaction_id).await {
                Ok(outcome) => {
                    tracing::info!(pidx, ?outcome, "payment settled");
                    success_redirect(&state.frontend_url)
                }
                Err(err) => {
                    tracing::error!(pidx, error = %err, "settlement failed");
                    failure_redirect(&state.frontend_url, settlement_failure_reason(err.code()))
                }
            }
        }
        CallbackDecision::Reject { reason, mark_failed } => {
            if mark_failed {
                if let Err(err) =
                    orders::mark_failed_by_pidx(&state.pool, pidx, now_millis()).await
                {
                    tracing::error!(pidx, error = %err, "failed to mark order failed");
                }
            }
            failure_redirect(&state.frontend_url, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{InitiateResponse, LookupResponse};
    use async_trait::async_trait;
    use axum::response::IntoResponse;
    use http::header::LOCATION;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    /// Gateway stub returning a canned lookup result.
    struct StubGateway {
        status: &'static str,
        transaction_id: Option<&'static str>,
        fail_lookup: bool,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn initiate(&self, _req: &InitiateRequest) -> Result<InitiateResponse, BoxError> {
            Err("initiate not expected in these tests".into())
        }

        async fn lookup(&self, pidx: &str) -> Result<LookupResponse, BoxError> {
            if self.fail_lookup {
                return Err("gateway unreachable".into());
            }
            Ok(LookupResponse {
                pidx: pidx.to_string(),
                status: self.status.to_string(),
                transaction_id: self.transaction_id.map(str::to_string),
                total_amount: Some(100_000),
            })
        }
    }

    fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        response.headers()[LOCATION].to_str().unwrap().to_string()
    }

    #[test]
    fn success_redirect_target() {
        assert_eq!(
            location(success_redirect("https://shop.example")),
            "https://shop.example/orders?payment=success"
        );
    }

    #[test]
    fn failure_redirect_preserves_reason() {
        assert_eq!(
            location(failure_redirect("https://shop.example", "payment_expired")),
            "https://shop.example/orders?payment=failed&error=payment_expired"
        );
    }

    #[tokio::test]
    async fn verified_completed_settles_with_lookup_transaction_id() {
        let gateway = StubGateway {
            status: "Completed",
            transaction_id: Some("txn-from-lookup"),
            fail_lookup: false,
        };
        // The lookup's transaction id wins over the callback's query parameter.
        let decision = decide_callback(&gateway, "pidx123", Some("txn-from-query".into())).await;
        assert_eq!(
            decision,
            CallbackDecision::Settle {
                transaction_id: "txn-from-lookup".into()
            }
        );
    }

    #[tokio::test]
    async fn completed_without_lookup_transaction_falls_back_to_query() {
        let gateway = StubGateway {
            status: "Completed",
            transaction_id: None,
            fail_lookup: false,
        };
        let decision = decide_callback(&gateway, "pidx123", Some("txn-from-query".into())).await;
        assert_eq!(
            decision,
            CallbackDecision::Settle {
                transaction_id: "txn-from-query".into()
            }
        );
    }

    #[tokio::test]
    async fn expired_lookup_rejects_and_fails_the_order() {
        let gateway = StubGateway {
            status: "Expired",
            transaction_id: None,
            fail_lookup: false,
        };
        let decision = decide_callback(&gateway, "pidx123", None).await;
        assert_eq!(
            decision,
            CallbackDecision::Reject {
                reason: "payment_expired",
                mark_failed: true,
            }
        );
    }

    #[tokio::test]
    async fn pending_lookup_rejects_without_failing_the_order() {
        let gateway = StubGateway {
            status: "Pending",
            transaction_id: None,
            fail_lookup: false,
        };
        let decision = decide_callback(&gateway, "pidx123", None).await;
        assert_eq!(
            decision,
            CallbackDecision::Reject {
                reason: "payment_not_completed",
                mark_failed: false,
            }
        );
    }

    #[tokio::test]
    async fn lookup_error_rejects_without_any_order_mutation() {
        let gateway = StubGateway {
            status: "Completed",
            transaction_id: None,
            fail_lookup: true,
        };
        let decision = decide_callback(&gateway, "pidx123", None).await;
        assert_eq!(
            decision,
            CallbackDecision::Reject {
                reason: "verification_failed",
                mark_failed: false,
            }
        );
    }

    #[test]
    fn settlement_failure_reasons() {
        // Unknown pidx surfaces as OrderNotFound from materialization.
        assert_eq!(
            settlement_failure_reason(ErrorCode::OrderNotFound),
            "order_not_found"
        );
        assert_eq!(
            settlement_failure_reason(ErrorCode::ProductOutOfStock),
            "insufficient_stock"
        );
        assert_eq!(
            settlement_failure_reason(ErrorCode::InternalError),
            "verification_failed"
        );
    }
}
