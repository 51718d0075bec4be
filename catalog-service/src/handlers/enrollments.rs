//! Enrollment handlers.
//!
//! Enrollments are created by payment-service on payment success (service
//! credentials carry the finance role) or manually by admins.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use mongodb::bson::DateTime;
use service_core::error::AppError;
use service_core::middleware::auth::AuthUser;
use service_core::utils::jwt::Role;
use uuid::Uuid;

use crate::{
    AppState,
    dtos::{CreateEnrollmentRequest, EnrollmentResponse, UpdateProgressRequest},
    models::Enrollment,
};

pub async fn create_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), AppError> {
    user.require_role(&[Role::Admin, Role::Finance])?;

    state
        .repository
        .get_course(payload.course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Course not found")))?;

    let now = DateTime::now();
    let enrollment = Enrollment {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        course_id: payload.course_id,
        source: payload.source,
        transaction_id: payload.transaction_id,
        completed_videos: vec![],
        completed_exercises: vec![],
        enrolled_at: now,
        updated_at: now,
    };

    let (enrollment, created) = state.repository.create_enrollment(enrollment).await?;

    tracing::info!(
        enrollment_id = %enrollment.id,
        user_id = %enrollment.user_id,
        course_id = %enrollment.course_id,
        created,
        "Enrollment recorded"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(EnrollmentResponse::from(enrollment))))
}

pub async fn list_user_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<EnrollmentResponse>>, AppError> {
    if user.role() == Role::Student && user.user_id() != user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Students may only read their own enrollments"
        )));
    }

    let enrollments = state.repository.list_enrollments_for_user(&user_id).await?;

    Ok(Json(
        enrollments
            .into_iter()
            .map(EnrollmentResponse::from)
            .collect(),
    ))
}

pub async fn update_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Path(enrollment_id): Path<Uuid>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    let enrollment = state
        .repository
        .get_enrollment(enrollment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Enrollment not found")))?;

    if user.role() == Role::Student && user.user_id() != enrollment.user_id {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Students may only update their own progress"
        )));
    }

    let updated = state
        .repository
        .update_progress(
            enrollment_id,
            &payload.completed_videos,
            &payload.completed_exercises,
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Enrollment not found")))?;

    Ok(Json(EnrollmentResponse::from(updated)))
}
