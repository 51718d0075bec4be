use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentSource {
    Payment,
    Manual,
}

/// Links a user to a purchased (or manually granted) course and tracks
/// learning progress. One document per (user, course), enforced by a
/// unique index.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Enrollment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: String,
    pub course_id: Uuid,
    pub source: EnrollmentSource,
    pub transaction_id: Option<String>,
    pub completed_videos: Vec<String>,
    pub completed_exercises: Vec<String>,
    pub enrolled_at: DateTime,
    pub updated_at: DateTime,
}
