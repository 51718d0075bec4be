//! Course read and administration handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::middleware::auth::AuthUser;
use service_core::utils::jwt::Role;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    dtos::{CourseResponse, CreateCourseRequest, ListCoursesQuery, UpdateCourseRequest},
    models::Course,
};

pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<ListCoursesQuery>,
) -> Result<Json<Vec<CourseResponse>>, AppError> {
    let courses = state
        .repository
        .list_published_courses(query.category.as_deref())
        .await?;

    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseResponse>, AppError> {
    let course = state
        .repository
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Course not found")))?;

    Ok(Json(CourseResponse::from(course)))
}

pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), AppError> {
    user.require_role(&[Role::Admin, Role::University])?;
    payload.validate()?;

    if payload.price <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Course price must be greater than zero"
        )));
    }

    let now = DateTime::now();
    let course = Course {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        category: payload.category,
        price: payload.price,
        currency: payload.currency,
        instructor: payload.instructor.map(Into::into),
        partner_id: payload.partner_id,
        modules: payload.modules.into_iter().map(Into::into).collect(),
        published: payload.published,
        created_by: user.user_id().to_string(),
        created_at: now,
        updated_at: now,
    };

    tracing::info!(course_id = %course.id, title = %course.title, "Creating course");

    state.repository.create_course(course.clone()).await?;

    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

pub async fn update_course(
    State(state): State<AppState>,
    user: AuthUser,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    user.require_role(&[Role::Admin, Role::University])?;
    payload.validate()?;

    let mut course = state
        .repository
        .get_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Course not found")))?;

    if let Some(price) = payload.price {
        if price <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Course price must be greater than zero"
            )));
        }
        course.price = price;
    }
    if let Some(title) = payload.title {
        course.title = title;
    }
    if let Some(description) = payload.description {
        course.description = description;
    }
    if let Some(category) = payload.category {
        course.category = category;
    }
    if let Some(instructor) = payload.instructor {
        course.instructor = Some(instructor.into());
    }
    if let Some(modules) = payload.modules {
        course.modules = modules.into_iter().map(Into::into).collect();
    }
    if let Some(published) = payload.published {
        course.published = published;
    }
    course.updated_at = DateTime::now();

    state.repository.replace_course(&course).await?;

    Ok(Json(CourseResponse::from(course)))
}
