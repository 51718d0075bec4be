//! Stripe webhook processing.
//!
//! The authoritative push channel for payment outcomes. Delivery is
//! at-least-once; replays hit the guarded transitions and become no-ops.
//! Always answers 200 once the signature checks out, so the provider stops
//! retrying events we have already applied.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::{
    AppState,
    models::{RefundDetails, Transaction},
    services::fulfillment::fulfill_success,
    services::metrics::record_transaction,
    services::providers::stripe::StripeEvent,
};

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Stripe-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let valid = state
        .stripe
        .verify_webhook_signature(&body, signature)
        .map_err(AppError::InternalError)?;

    if !valid {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event = state.stripe.parse_webhook_event(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    tracing::info!(event_type = %event.event_type, "Processing Stripe webhook");

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            if let Some(transaction) = resolve_transaction(&state, &event).await? {
                let applied = state
                    .repository
                    .record_success(&transaction.id, event.payment_intent_id())
                    .await?;
                if applied {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        payment_intent = %event.payment_intent_id(),
                        "Payment succeeded via webhook"
                    );
                    fulfill_success(&state, &transaction).await;
                }
            }
        }
        "payment_intent.payment_failed" => {
            if let Some(transaction) = resolve_transaction(&state, &event).await? {
                let (code, message) = payment_error_details(&event);
                let applied = state
                    .repository
                    .record_failure(
                        &transaction.id,
                        Some(event.payment_intent_id()),
                        code.as_deref(),
                        message.as_deref(),
                    )
                    .await?;
                if applied {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        "Payment failed via webhook"
                    );
                    record_transaction("failed");
                }
            }
        }
        "charge.refunded" => {
            if let Some(transaction) = resolve_transaction(&state, &event).await? {
                let amount = event
                    .data
                    .object
                    .amount_refunded
                    .map(|minor| Decimal::new(minor, 2))
                    .unwrap_or(transaction.final_amount);

                let refund = RefundDetails {
                    refund_id: event.data.object.id.clone(),
                    amount,
                    reason: None,
                    refunded_at: DateTime::now(),
                };

                let applied = state
                    .repository
                    .record_refund(&transaction.id, &refund)
                    .await?;
                if applied {
                    tracing::info!(
                        transaction_id = %transaction.id,
                        refund_id = %refund.refund_id,
                        "Transaction refunded via webhook"
                    );
                    record_transaction("refunded");
                }
            }
        }
        other => {
            tracing::debug!(event_type = %other, "Unhandled webhook event type");
        }
    }

    Ok(StatusCode::OK)
}

/// Resolve the platform transaction an event refers to: by the
/// `transaction_id` metadata we stamp on every provider object, falling
/// back to the provider reference.
async fn resolve_transaction(
    state: &AppState,
    event: &StripeEvent,
) -> Result<Option<Transaction>, AppError> {
    if let Some(transaction_id) = event.transaction_id() {
        if let Some(transaction) = state.repository.get_transaction(transaction_id).await? {
            return Ok(Some(transaction));
        }
    }

    let transaction = state
        .repository
        .find_by_provider_ref(event.payment_intent_id())
        .await?;

    if transaction.is_none() {
        tracing::warn!(
            payment_intent = %event.payment_intent_id(),
            "Webhook event does not match any transaction"
        );
    }

    Ok(transaction)
}

fn payment_error_details(event: &StripeEvent) -> (Option<String>, Option<String>) {
    let error = event.data.object.last_payment_error.as_ref();
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .map(String::from);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .map(String::from);
    (code, message.or(Some("Payment failed".to_string())))
}
