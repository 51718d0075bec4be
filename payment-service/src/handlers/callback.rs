//! Provider callback route.
//!
//! The browser redirect target after provider/mock completion, and the only
//! client-visible state-transition trigger. The transaction record is keyed
//! by transactionId carried in the URL, so the flow completes even if the
//! browser session that initiated the payment is gone.
//!
//! Trust model per provider:
//! - Mock: the callback carries an HMAC signature over the payload and is
//!   authoritative.
//! - Stripe: the redirect's claimed status is advisory; the provider is
//!   queried for the actual payment state (the webhook remains the
//!   authoritative push channel).

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::utils::signature::verify_payload;

use crate::{
    AppState,
    dtos::CallbackParams,
    models::{ProviderKind, Transaction},
    services::fulfillment::fulfill_success,
    services::metrics::record_transaction,
    services::providers::ProviderPaymentStatus,
};

enum CallbackOutcome {
    Success {
        gateway_transaction_id: String,
    },
    Failure {
        gateway_transaction_id: Option<String>,
        error_category: Option<String>,
        error_message: Option<String>,
    },
    StillProcessing,
}

pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    let transaction = state
        .repository
        .get_transaction(&params.transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    // Replay of a finished transaction: no state change, same redirect.
    if transaction.status.is_terminal() {
        tracing::info!(
            transaction_id = %transaction.id,
            status = ?transaction.status,
            "Callback for already-terminal transaction"
        );
        return Ok(redirect_to_result(
            &state,
            &transaction.id,
            transaction.status.as_str(),
        ));
    }

    let outcome = match transaction.provider {
        ProviderKind::Mock => mock_outcome(&state, &params)?,
        ProviderKind::Stripe => stripe_outcome(&state, &transaction).await,
    };

    let status_str = match outcome {
        CallbackOutcome::Success {
            gateway_transaction_id,
        } => {
            if state
                .repository
                .record_success(&transaction.id, &gateway_transaction_id)
                .await?
            {
                tracing::info!(
                    transaction_id = %transaction.id,
                    gateway_transaction_id = %gateway_transaction_id,
                    "Payment succeeded via callback"
                );
                fulfill_success(&state, &transaction).await;
            }
            "success"
        }
        CallbackOutcome::Failure {
            gateway_transaction_id,
            error_category,
            error_message,
        } => {
            if state
                .repository
                .record_failure(
                    &transaction.id,
                    gateway_transaction_id.as_deref(),
                    error_category.as_deref(),
                    error_message.as_deref(),
                )
                .await?
            {
                tracing::info!(
                    transaction_id = %transaction.id,
                    error_category = ?error_category,
                    "Payment failed via callback"
                );
                record_transaction("failed");
            }
            "failed"
        }
        CallbackOutcome::StillProcessing => {
            state.repository.mark_processing(&transaction.id).await?;
            "processing"
        }
    };

    Ok(redirect_to_result(&state, &transaction.id, status_str))
}

/// Mock callbacks are authoritative once the HMAC over
/// `transactionId|status|gatewayTransactionId|amount` checks out.
fn mock_outcome(state: &AppState, params: &CallbackParams) -> Result<CallbackOutcome, AppError> {
    let signature = params.signature.as_deref().ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing callback signature"))
    })?;

    let amount = params
        .amount
        .map(|a| format!("{:.2}", a))
        .unwrap_or_default();
    let payload = format!(
        "{}|{}|{}|{}",
        params.transaction_id,
        params.status,
        params.gateway_transaction_id.as_deref().unwrap_or(""),
        amount
    );

    let valid = verify_payload(
        state.config.mock_gateway.callback_secret.expose_secret(),
        &payload,
        signature,
    )
    .map_err(AppError::InternalError)?;

    if !valid {
        tracing::warn!(
            transaction_id = %params.transaction_id,
            "Invalid mock callback signature"
        );
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid callback signature"
        )));
    }

    match params.status.as_str() {
        "success" => Ok(CallbackOutcome::Success {
            gateway_transaction_id: params
                .gateway_transaction_id
                .clone()
                .unwrap_or_default(),
        }),
        "failed" => Ok(CallbackOutcome::Failure {
            gateway_transaction_id: params.gateway_transaction_id.clone(),
            error_category: params.error_code.clone(),
            error_message: params.error_message.clone(),
        }),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown callback status '{other}'"
        ))),
    }
}

/// For the real provider the redirect only says "the buyer came back"; ask
/// the provider what actually happened.
async fn stripe_outcome(state: &AppState, transaction: &Transaction) -> CallbackOutcome {
    let Some(gateway_ref) = transaction.provider_ref.as_deref() else {
        tracing::error!(
            transaction_id = %transaction.id,
            "Transaction has no provider reference to check"
        );
        return CallbackOutcome::StillProcessing;
    };

    match state.provider.fetch_status(gateway_ref).await {
        Ok(ProviderPaymentStatus::Succeeded {
            gateway_transaction_id,
        }) => CallbackOutcome::Success {
            gateway_transaction_id,
        },
        Ok(ProviderPaymentStatus::Failed { code, message }) => CallbackOutcome::Failure {
            gateway_transaction_id: None,
            error_category: code,
            error_message: Some(message),
        },
        Ok(ProviderPaymentStatus::Processing) => CallbackOutcome::StillProcessing,
        Err(e) => {
            // Leave resolution to the webhook or the reconciliation sweep.
            tracing::warn!(
                transaction_id = %transaction.id,
                error = %e,
                "Provider status check failed on callback"
            );
            CallbackOutcome::StillProcessing
        }
    }
}

fn redirect_to_result(state: &AppState, transaction_id: &str, status: &str) -> Redirect {
    let url = format!(
        "{}?transactionId={}&status={}",
        state.config.gateway.frontend_result_url, transaction_id, status
    );
    Redirect::to(&url)
}
