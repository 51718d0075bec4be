//! Discount code validation, creation, and redemption.
//!
//! Validation is read-only; the redemption budget is only consumed by the
//! atomic redeem operation once a payment actually succeeds.

use axum::{Json, extract::State, http::StatusCode};
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::middleware::auth::AuthUser;
use service_core::utils::jwt::Role;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{
        CreateDiscountRequest, DiscountResponse, RedeemDiscountRequest, ValidateDiscountRequest,
        ValidateDiscountResponse,
    },
    models::{Course, DiscountCode, DiscountType},
};

/// Look up a code and check it against a course, without consuming it.
/// The same code + course always yields the same answer until the stored
/// code changes.
pub async fn validate_discount(
    State(state): State<AppState>,
    Json(payload): Json<ValidateDiscountRequest>,
) -> Result<Json<ValidateDiscountResponse>, AppError> {
    payload.validate()?;

    let code = payload.code.trim().to_uppercase();
    let course = fetch_course(&state, payload.course_id).await?;
    let discount = fetch_redeemable_code(&state, &code).await?;

    if !discount.applies_to(&course) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount code does not apply to this course"
        )));
    }

    Ok(Json(ValidateDiscountResponse {
        discount_type: discount.discount_type,
        value: discount.value,
    }))
}

pub async fn create_discount(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<DiscountResponse>), AppError> {
    user.require_role(&[Role::Admin, Role::Partner])?;
    payload.validate()?;

    match payload.discount_type {
        DiscountType::Percentage => {
            if payload.value <= Decimal::ZERO || payload.value > Decimal::new(100, 0) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Percentage discount value must be between 0 and 100"
                )));
            }
        }
        DiscountType::Flat => {
            if payload.value <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Flat discount value must be greater than zero"
                )));
            }
        }
    }

    let discount = DiscountCode {
        id: Uuid::new_v4(),
        code: payload.code.trim().to_uppercase(),
        discount_type: payload.discount_type,
        value: payload.value,
        active: payload.active,
        scope: payload.scope,
        max_redemptions: payload.max_redemptions,
        redemption_count: 0,
        valid_from: payload.valid_from.map(DateTime::from_chrono),
        valid_until: payload.valid_until.map(DateTime::from_chrono),
        created_by: user.user_id().to_string(),
        created_at: DateTime::now(),
    };

    tracing::info!(code = %discount.code, "Creating discount code");

    let discount = state
        .repository
        .create_discount(discount)
        .await?
        .ok_or_else(|| AppError::Conflict(anyhow::anyhow!("Discount code already exists")))?;

    Ok((StatusCode::CREATED, Json(DiscountResponse::from(discount))))
}

/// Consume one redemption of a code. Called by payment-service once per
/// successful payment; two racers on a single-use code get one winner.
pub async fn redeem_discount(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RedeemDiscountRequest>,
) -> Result<Json<DiscountResponse>, AppError> {
    user.require_role(&[Role::Admin, Role::Finance])?;
    payload.validate()?;

    let code = payload.code.trim().to_uppercase();
    let course = fetch_course(&state, payload.course_id).await?;
    let discount = fetch_redeemable_code(&state, &code).await?;

    if !discount.applies_to(&course) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount code does not apply to this course"
        )));
    }

    let redeemed = state
        .repository
        .redeem_discount(&code)
        .await?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!("Discount code redemption limit reached"))
        })?;

    tracing::info!(
        code = %redeemed.code,
        redemption_count = redeemed.redemption_count,
        "Discount code redeemed"
    );

    Ok(Json(DiscountResponse::from(redeemed)))
}

async fn fetch_course(state: &AppState, course_id: Uuid) -> Result<Course, AppError> {
    state
        .repository
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Course not found")))
}

async fn fetch_redeemable_code(state: &AppState, code: &str) -> Result<DiscountCode, AppError> {
    let discount = state
        .repository
        .find_discount_by_code(code)
        .await?
        .filter(|d| d.is_redeemable(DateTime::now()))
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Discount code not found or inactive"))
        })?;
    Ok(discount)
}
