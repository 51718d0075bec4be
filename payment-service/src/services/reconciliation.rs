//! Reconciliation sweep for missed callbacks.
//!
//! Webhook/callback delivery is at-least-once at best; a transaction whose
//! browser died mid-redirect can sit in `pending`/`processing` forever.
//! The sweep periodically re-checks such transactions against the provider
//! and applies the same guarded transitions the callback path uses.

use mongodb::bson::DateTime;
use tokio::time::{Duration, MissedTickBehavior};

use crate::AppState;
use crate::services::fulfillment::fulfill_success;
use crate::services::metrics::record_transaction;
use crate::services::providers::ProviderPaymentStatus;

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(Duration::from_secs(
        state.config.reconciliation.interval_seconds,
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match sweep(&state).await {
            Ok(0) => {}
            Ok(reconciled) => tracing::info!(reconciled, "Reconciliation sweep applied updates"),
            Err(e) => tracing::error!(error = %e, "Reconciliation sweep failed"),
        }
    }
}

/// Re-check stale non-terminal transactions against the provider. Returns
/// the number of transactions moved to a new state.
pub async fn sweep(state: &AppState) -> anyhow::Result<usize> {
    let cutoff = DateTime::from_millis(
        DateTime::now().timestamp_millis() - state.config.reconciliation.stale_after_seconds * 1000,
    );

    let stale = state.repository.find_stale_nonterminal(cutoff).await?;
    let mut reconciled = 0;

    for transaction in stale {
        if transaction.provider != state.provider.kind() {
            tracing::debug!(
                transaction_id = %transaction.id,
                "Skipping transaction from a differently configured provider"
            );
            continue;
        }

        let Some(gateway_ref) = transaction.provider_ref.as_deref() else {
            continue;
        };

        match state.provider.fetch_status(gateway_ref).await {
            Ok(ProviderPaymentStatus::Succeeded {
                gateway_transaction_id,
            }) => {
                if state
                    .repository
                    .record_success(&transaction.id, &gateway_transaction_id)
                    .await?
                {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        "Reconciled missed success"
                    );
                    fulfill_success(state, &transaction).await;
                    reconciled += 1;
                }
            }
            Ok(ProviderPaymentStatus::Failed { code, message }) => {
                if state
                    .repository
                    .record_failure(
                        &transaction.id,
                        None,
                        code.as_deref(),
                        Some(message.as_str()),
                    )
                    .await?
                {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        "Reconciled missed failure"
                    );
                    record_transaction("failed");
                    reconciled += 1;
                }
            }
            Ok(ProviderPaymentStatus::Processing) => {}
            Err(e) => {
                // Left for the next sweep.
                tracing::warn!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "Provider status check failed during reconciliation"
                );
            }
        }
    }

    Ok(reconciled)
}
