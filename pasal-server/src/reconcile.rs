//! Settlement reconciler.
//!
//! A customer can abandon the gateway's payment page without ever hitting the
//! verify callback, leaving the order pending forever. This task periodically
//! re-checks stale pending gateway orders against the gateway's lookup
//! endpoint and settles or fails them.

use std::time::Duration;

use shared::util::now_millis;

use crate::checkout::{self, GatewayVerdict};
use crate::db::orders;
use crate::state::AppState;

pub fn spawn(state: AppState, interval_secs: u64, stale_after_mins: i64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // First tick fires immediately; skip it so startup isn't racing migrations.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = reconcile_once(&state, stale_after_mins).await {
                tracing::error!(error = %err, "reconcile pass failed");
            }
        }
    });
}

async fn reconcile_once(
    state: &AppState,
    stale_after_mins: i64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cutoff = now_millis() - stale_after_mins * 60 * 1000;
    let stale = orders::list_stale_pending(&state.pool, cutoff).await?;
    if stale.is_empty() {
        return Ok(());
    }
    tracing::info!(count = stale.len(), "reconciling stale pending orders");

    for (order_id, pidx) in stale {
        let lookup = match state.gateway.lookup(&pidx).await {
            Ok(lookup) => lookup,
            Err(err) => {
                tracing::warn!(order_id, %pidx, error = %err, "reconcile lookup failed");
                continue;
            }
        };
        match checkout::classify_lookup(&lookup.lookup_status()) {
            GatewayVerdict::Settled => {
                let transaction_id = lookup.transaction_id.unwrap_or_default();
                match checkout::materialize_on_settlement(&state.pool, &pidx, &transaction_id)
                    .await
                {
                    Ok(outcome) => tracing::info!(order_id, ?outcome, "reconciled as settled"),
                    Err(err) => {
                        tracing::warn!(order_id, %pidx, error = %err, "reconcile settlement failed")
                    }
                }
            }
            GatewayVerdict::InFlight => {}
            GatewayVerdict::Failed(reason) => {
                if let Err(err) =
                    orders::mark_payment_failed(&state.pool, order_id, now_millis()).await
                {
                    tracing::warn!(order_id, error = %err, "reconcile mark-failed errored");
                } else {
                    tracing::info!(order_id, reason, "reconciled as failed");
                }
            }
        }
    }
    Ok(())
}
