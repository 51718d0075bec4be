//! Wire DTOs for the catalog API. JSON field casing is camelCase (the SPA
//! contract); documents keep snake_case internally.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    Course, CourseModule, DiscountScope, DiscountType, Enrollment, EnrollmentSource, Instructor,
};

// Courses

#[derive(Debug, Deserialize)]
pub struct ListCoursesQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub instructor: Option<InstructorDto>,
    pub partner_id: Option<String>,
    #[serde(default)]
    pub modules: Vec<CourseModuleDto>,
    #[serde(default)]
    pub published: bool,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub instructor: Option<InstructorDto>,
    pub modules: Option<Vec<CourseModuleDto>>,
    pub published: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InstructorDto {
    pub name: String,
    pub title: Option<String>,
}

impl From<InstructorDto> for Instructor {
    fn from(dto: InstructorDto) -> Self {
        Self {
            name: dto.name,
            title: dto.title,
        }
    }
}

impl From<Instructor> for InstructorDto {
    fn from(i: Instructor) -> Self {
        Self {
            name: i.name,
            title: i.title,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseModuleDto {
    pub position: u32,
    pub title: String,
    pub video_url: Option<String>,
    pub exercise_id: Option<String>,
}

impl From<CourseModuleDto> for CourseModule {
    fn from(dto: CourseModuleDto) -> Self {
        Self {
            position: dto.position,
            title: dto.title,
            video_url: dto.video_url,
            exercise_id: dto.exercise_id,
        }
    }
}

impl From<CourseModule> for CourseModuleDto {
    fn from(m: CourseModule) -> Self {
        Self {
            position: m.position,
            title: m.title,
            video_url: m.video_url,
            exercise_id: m.exercise_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub currency: String,
    pub instructor: Option<InstructorDto>,
    pub partner_id: Option<String>,
    pub modules: Vec<CourseModuleDto>,
    pub published: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Course> for CourseResponse {
    fn from(c: Course) -> Self {
        Self {
            id: c.id,
            title: c.title,
            description: c.description,
            category: c.category,
            price: c.price,
            currency: c.currency,
            instructor: c.instructor.map(InstructorDto::from),
            partner_id: c.partner_id,
            modules: c.modules.into_iter().map(CourseModuleDto::from).collect(),
            published: c.published,
            created_at: c.created_at.try_to_rfc3339_string().unwrap_or_default(),
            updated_at: c.updated_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

// Discount codes

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub course_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ValidateDiscountResponse {
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_scope")]
    pub scope: DiscountScope,
    pub max_redemptions: Option<u32>,
    pub valid_from: Option<chrono::DateTime<chrono::Utc>>,
    pub valid_until: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_scope() -> DiscountScope {
    DiscountScope::AllCourses
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResponse {
    pub id: Uuid,
    pub code: String,
    #[serde(rename = "type")]
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub active: bool,
    pub scope: DiscountScope,
    pub max_redemptions: Option<u32>,
    pub redemption_count: u32,
}

impl From<crate::models::DiscountCode> for DiscountResponse {
    fn from(d: crate::models::DiscountCode) -> Self {
        Self {
            id: d.id,
            code: d.code,
            discount_type: d.discount_type,
            value: d.value,
            active: d.active,
            scope: d.scope,
            max_redemptions: d.max_redemptions,
            redemption_count: d.redemption_count,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemDiscountRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub course_id: Uuid,
}

// Enrollments

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    pub user_id: String,
    pub course_id: Uuid,
    pub source: EnrollmentSource,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    #[serde(default)]
    pub completed_videos: Vec<String>,
    #[serde(default)]
    pub completed_exercises: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub user_id: String,
    pub course_id: Uuid,
    pub source: EnrollmentSource,
    pub transaction_id: Option<String>,
    pub completed_videos: Vec<String>,
    pub completed_exercises: Vec<String>,
    pub enrolled_at: String,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            course_id: e.course_id,
            source: e.source,
            transaction_id: e.transaction_id,
            completed_videos: e.completed_videos,
            completed_exercises: e.completed_exercises,
            enrolled_at: e.enrolled_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
