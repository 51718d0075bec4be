use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable course in the catalog.
///
/// Created by university/admin users; read-heavy. `modules` keeps the
/// stored order (ascending `position`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub currency: String,
    pub instructor: Option<Instructor>,
    /// Set when the course is published through a partner; discount codes
    /// scoped to that partner apply to it.
    pub partner_id: Option<String>,
    pub modules: Vec<CourseModule>,
    pub published: bool,
    pub created_by: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Instructor {
    pub name: String,
    pub title: Option<String>,
}

/// One entry in a course's ordered module list: a video, an exercise, or both.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CourseModule {
    pub position: u32,
    pub title: String,
    pub video_url: Option<String>,
    pub exercise_id: Option<String>,
}
