//! Payment initiation, status tracking, receipts, and transaction listing.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use mongodb::bson::DateTime;
use service_core::error::AppError;
use service_core::middleware::auth::AuthUser;
use service_core::utils::jwt::Role;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        InitiatePaymentRequest, InitiatePaymentResponse, ListTransactionsQuery,
        ListTransactionsResponse, StatusResponse, TransactionView,
    },
    models::{PaymentMode, Transaction, TransactionStatus},
    services::metrics::record_transaction,
    services::pricing,
    services::providers::{InitiateParams, ProviderError},
    services::receipt,
};

/// Create a provider-side payment object and the platform transaction for a
/// course purchase.
///
/// The discount is re-validated server-side regardless of any client-side
/// check, and pricing is recomputed from the catalog price. A retried
/// initiation for the same (user, course) reuses the open pending
/// transaction instead of creating a second provider object.
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<InitiatePaymentResponse>), AppError> {
    payload.validate()?;

    if state.config.gateway.maintenance_mode {
        tracing::warn!("Payment initiation rejected: gateway in maintenance mode");
        return Err(AppError::MaintenanceMode);
    }

    let course = state.catalog.get_course(payload.course_id).await?;
    if !course.published {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Course is not available for purchase"
        )));
    }

    let discount_code = payload
        .discount_code
        .as_deref()
        .map(|c| c.trim().to_uppercase());
    let discount = match &discount_code {
        Some(code) => Some(state.catalog.validate_discount(code, course.id).await?),
        None => None,
    };

    let quote = pricing::compute_quote(course.price, discount.as_ref())
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

    if !acquire_initiate_lock(&state, user.user_id(), course.id).await {
        tracing::debug!(
            user_id = %user.user_id(),
            course_id = %course.id,
            "Concurrent initiation detected; falling back to pending-transaction lookup"
        );
    }

    if let Some(existing) = state
        .repository
        .find_pending_for_user_course(user.user_id(), course.id)
        .await?
    {
        if existing.final_amount == quote.total
            && existing.mode == payload.mode
            && existing.provider == state.provider.kind()
        {
            tracing::info!(
                transaction_id = %existing.id,
                "Reusing open pending transaction for retried initiation"
            );
            return Ok((StatusCode::OK, Json(checkout_material(&state, &existing)?)));
        }
    }

    let transaction_id = Transaction::new_id();
    let callback_url = format!(
        "{}/api/payment/callback?transactionId={}",
        state.config.gateway.public_base_url, transaction_id
    );

    let provider_payment = state
        .provider
        .initiate(InitiateParams {
            transaction_id: transaction_id.clone(),
            amount: quote.total,
            currency: course.currency.clone(),
            mode: payload.mode,
            description: format!("Course purchase: {}", course.title),
            callback_url,
            customer_name: Some(user.user_id().to_string()),
            customer_email: None,
        })
        .await
        .map_err(provider_error_to_app)?;

    let now = DateTime::now();
    let transaction = Transaction {
        id: transaction_id,
        course_id: course.id,
        course_title: course.title,
        user_id: user.user_id().to_string(),
        original_amount: quote.original,
        discount_code,
        discount_amount: quote.discount,
        gst_amount: quote.gst,
        final_amount: quote.total,
        currency: course.currency,
        status: TransactionStatus::Pending,
        mode: payload.mode,
        provider: state.provider.kind(),
        provider_ref: Some(provider_payment.gateway_ref),
        client_secret: provider_payment.client_secret,
        payment_url: provider_payment.redirect_url,
        gateway_transaction_id: None,
        payment_method: None,
        error_message: None,
        error_category: None,
        refund: None,
        initiated_at: now,
        callback_received_at: None,
        completed_at: None,
        updated_at: now,
    };

    state
        .repository
        .create_transaction(transaction.clone())
        .await?;
    record_transaction("pending");

    tracing::info!(
        transaction_id = %transaction.id,
        user_id = %transaction.user_id,
        course_id = %transaction.course_id,
        total = %transaction.final_amount,
        mode = ?transaction.mode,
        "Payment initiated"
    );

    Ok((
        StatusCode::CREATED,
        Json(checkout_material(&state, &transaction)?),
    ))
}

/// Build the client-facing checkout material from a stored transaction, so
/// fresh and reused initiations return identical shapes.
fn checkout_material(
    state: &AppState,
    transaction: &Transaction,
) -> Result<InitiatePaymentResponse, AppError> {
    match transaction.mode {
        PaymentMode::Elements => {
            let client_secret = transaction.client_secret.clone().ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Elements transaction is missing a client secret"
                ))
            })?;
            Ok(InitiatePaymentResponse::Elements {
                client_secret,
                transaction_id: transaction.id.clone(),
                publishable_key: state.provider.publishable_key(),
            })
        }
        PaymentMode::Checkout => {
            let payment_url = transaction.payment_url.clone().ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Checkout transaction is missing a payment URL"
                ))
            })?;
            Ok(InitiatePaymentResponse::Checkout {
                payment_url,
                transaction_id: transaction.id.clone(),
            })
        }
    }
}

fn provider_error_to_app(err: ProviderError) -> AppError {
    match err {
        ProviderError::Timeout => {
            AppError::GatewayTimeout("Payment gateway timed out".to_string())
        }
        ProviderError::Declined { code, message } => {
            tracing::warn!(code = %code, "Provider declined initiation");
            AppError::BadRequest(anyhow::anyhow!(message))
        }
        ProviderError::NotConfigured(msg) => {
            tracing::error!(error = %msg, "Payment provider not configured");
            AppError::ServiceUnavailable
        }
        ProviderError::Api(msg) => {
            tracing::error!(error = %msg, "Provider API error");
            AppError::InternalError(anyhow::anyhow!("Payment initiation failed"))
        }
    }
}

/// Best-effort short-lived lock narrowing the double-click window on
/// initiation. Redis being down degrades to the pending-transaction lookup.
async fn acquire_initiate_lock(state: &AppState, user_id: &str, course_id: Uuid) -> bool {
    let key = format!("initiate:{}:{}", user_id, course_id);

    let mut conn = match state.redis.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable; skipping initiation lock");
            return true;
        }
    };

    let result: Result<Option<String>, redis::RedisError> = redis::cmd("SET")
        .arg(&key)
        .arg("1")
        .arg("NX")
        .arg("EX")
        .arg(10)
        .query_async(&mut conn)
        .await;

    match result {
        Ok(Some(_)) => true,
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(error = %e, "Initiation lock failed; continuing without it");
            true
        }
    }
}

/// Fetch the current transaction state. Uncached and safe to poll; every
/// call reads the store.
pub async fn get_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let transaction = state
        .repository
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    authorize_transaction_access(&user, &transaction)?;

    Ok(Json(StatusResponse {
        transaction: TransactionView::from(transaction),
    }))
}

/// Download the PDF receipt for a successful transaction.
pub async fn download_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .repository
        .get_transaction(&transaction_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

    authorize_transaction_access(&user, &transaction)?;

    if transaction.status != TransactionStatus::Success {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Receipt is only available for successful transactions"
        )));
    }

    let bytes = receipt::render_receipt(&transaction).map_err(AppError::InternalError)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"receipt-{}.pdf\"", transaction.id),
            ),
        ],
        bytes,
    ))
}

/// Paginated transaction listing for finance/admin dashboards.
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, AppError> {
    user.require_role(&[Role::Admin, Role::Finance])?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0);

    let (transactions, total_count) = state
        .repository
        .list_transactions(query.status, limit, offset)
        .await?;

    Ok(Json(ListTransactionsResponse {
        transactions: transactions
            .into_iter()
            .map(TransactionView::from)
            .collect(),
        total_count,
    }))
}

fn authorize_transaction_access(user: &AuthUser, transaction: &Transaction) -> Result<(), AppError> {
    match user.role() {
        Role::Admin | Role::Finance => Ok(()),
        _ if user.user_id() == transaction.user_id => Ok(()),
        _ => Err(AppError::Forbidden(anyhow::anyhow!(
            "Not permitted to access this transaction"
        ))),
    }
}
