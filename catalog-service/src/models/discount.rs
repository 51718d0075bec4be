use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Course;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Flat,
}

/// What a discount code applies to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountScope {
    AllCourses,
    Course(Uuid),
    Partner(String),
}

/// A discount code entitling a percentage or flat reduction on a course price.
///
/// Codes are stored upper-cased; lookups normalize the incoming code the
/// same way. Validation never mutates the code; `redemption_count` is
/// incremented only through the atomic redeem operation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiscountCode {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub active: bool,
    pub scope: DiscountScope,
    pub max_redemptions: Option<u32>,
    pub redemption_count: u32,
    pub valid_from: Option<DateTime>,
    pub valid_until: Option<DateTime>,
    pub created_by: String,
    pub created_at: DateTime,
}

impl DiscountCode {
    /// Whether the code can currently be applied at all: active, inside its
    /// validity window, and not exhausted.
    pub fn is_redeemable(&self, now: DateTime) -> bool {
        if !self.active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if now > until {
                return false;
            }
        }
        if let Some(max) = self.max_redemptions {
            if self.redemption_count >= max {
                return false;
            }
        }
        true
    }

    /// Whether the code's scope covers the given course.
    pub fn applies_to(&self, course: &Course) -> bool {
        match &self.scope {
            DiscountScope::AllCourses => true,
            DiscountScope::Course(course_id) => *course_id == course.id,
            DiscountScope::Partner(partner_id) => {
                course.partner_id.as_deref() == Some(partner_id.as_str())
            }
        }
    }
}
