//! HTTP client for catalog-service.
//!
//! Course reads and discount validation are public; redemption and
//! enrollment creation use short-lived service credentials.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::utils::jwt::{Role, issue_token};
use thiserror::Error;
use uuid::Uuid;

use crate::services::pricing::AppliedDiscount;

const SERVICE_TOKEN_TTL_SECONDS: i64 = 300;

#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
    jwt_secret: Secret<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Catalog service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub currency: String,
    pub published: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| fallback.to_string())
}

impl CatalogClient {
    pub fn new(base_url: String, jwt_secret: Secret<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            jwt_secret,
        }
    }

    fn service_token(&self) -> Result<String, CatalogError> {
        issue_token(
            self.jwt_secret.expose_secret(),
            "payment-service",
            Role::Finance,
            SERVICE_TOKEN_TTL_SECONDS,
        )
        .map_err(|e| CatalogError::Unavailable(format!("Failed to issue service token: {e}")))
    }

    pub async fn get_course(&self, course_id: Uuid) -> Result<CourseSummary, CatalogError> {
        let url = format!("{}/api/courses/{}", self.base_url, course_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<CourseSummary>()
                .await
                .map_err(|e| CatalogError::Unavailable(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => {
                Err(CatalogError::NotFound("Course not found".to_string()))
            }
            status => Err(CatalogError::Unavailable(format!(
                "Unexpected catalog response: {status}"
            ))),
        }
    }

    /// Server-side discount validation. The client-side result is advisory
    /// only; this is the check that counts.
    pub async fn validate_discount(
        &self,
        code: &str,
        course_id: Uuid,
    ) -> Result<AppliedDiscount, CatalogError> {
        let url = format!("{}/api/discount/validate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "code": code, "courseId": course_id }))
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<AppliedDiscount>()
                .await
                .map_err(|e| CatalogError::Unavailable(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(CatalogError::Invalid(
                error_message(response, "Discount code not found or inactive").await,
            )),
            reqwest::StatusCode::BAD_REQUEST => Err(CatalogError::Invalid(
                error_message(response, "Discount code does not apply to this course").await,
            )),
            status => Err(CatalogError::Unavailable(format!(
                "Unexpected catalog response: {status}"
            ))),
        }
    }

    /// Consume one redemption of a code after a successful payment.
    pub async fn redeem_discount(&self, code: &str, course_id: Uuid) -> Result<(), CatalogError> {
        let url = format!("{}/api/discount/redeem", self.base_url);
        let token = self.service_token()?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "code": code, "courseId": course_id }))
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(CatalogError::Invalid(
                error_message(response, &format!("Redemption failed: {status}")).await,
            ))
        }
    }

    pub async fn create_enrollment(
        &self,
        user_id: &str,
        course_id: Uuid,
        transaction_id: &str,
    ) -> Result<(), CatalogError> {
        let url = format!("{}/api/enrollments", self.base_url);
        let token = self.service_token()?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "userId": user_id,
                "courseId": course_id,
                "source": "payment",
                "transactionId": transaction_id,
            }))
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            Err(CatalogError::Unavailable(format!(
                "Enrollment creation failed: {status}"
            )))
        }
    }
}

impl From<CatalogError> for service_core::error::AppError {
    fn from(err: CatalogError) -> Self {
        use service_core::error::AppError;
        match err {
            CatalogError::NotFound(msg) | CatalogError::Invalid(msg) => {
                AppError::BadRequest(anyhow::anyhow!(msg))
            }
            CatalogError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Catalog service call failed");
                AppError::ServiceUnavailable
            }
        }
    }
}
