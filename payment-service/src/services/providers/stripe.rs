//! Stripe payment provider.
//!
//! Implements PaymentIntents (elements mode) and Checkout Sessions
//! (checkout mode) over Stripe's form-encoded REST API, plus webhook
//! signature verification.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::signature::verify_payload;
use std::collections::HashMap;
use std::time::Duration;

use super::{
    InitiateParams, PaymentProvider, ProviderError, ProviderPayment, ProviderPaymentStatus,
};
use crate::config::StripeConfig;
use crate::models::{PaymentMode, ProviderKind};

/// Webhook timestamps older than this are rejected as replays.
const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

#[derive(Clone)]
pub struct StripeProvider {
    client: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
    last_payment_error: Option<StripeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    status: Option<String>,
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// A parsed webhook event, reduced to the fields the transaction lifecycle
/// needs.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: StripeEventObject,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub last_payment_error: Option<serde_json::Value>,
    #[serde(default)]
    pub amount_refunded: Option<i64>,
}

impl StripeEvent {
    /// The platform transaction id, when the provider object carries it.
    pub fn transaction_id(&self) -> Option<&str> {
        self.data
            .object
            .metadata
            .as_ref()
            .and_then(|m| m.get("transaction_id"))
            .map(String::as_str)
    }

    /// The PaymentIntent id this event refers to.
    pub fn payment_intent_id(&self) -> &str {
        self.data
            .object
            .payment_intent
            .as_deref()
            .unwrap_or(&self.data.object.id)
    }
}

fn to_minor_units(amount: Decimal) -> Result<i64, ProviderError> {
    (amount * Decimal::new(100, 0))
        .round()
        .to_i64()
        .ok_or_else(|| ProviderError::Api(format!("Amount out of range: {amount}")))
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.publishable_key.is_empty()
            && !self.config.secret_key.expose_secret().is_empty()
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        tracing::debug!(%status, path, "Stripe response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(map_api_error(&body))
        }
    }

    async fn get(&self, path: &str) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .client
            .get(&url)
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(map_api_error(&body))
        }
    }

    async fn create_payment_intent(
        &self,
        params: &InitiateParams,
    ) -> Result<ProviderPayment, ProviderError> {
        let amount = to_minor_units(params.amount)?;
        let form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), params.currency.to_lowercase()),
            ("description".to_string(), params.description.clone()),
            (
                "metadata[transaction_id]".to_string(),
                params.transaction_id.clone(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        let body = self.post_form("/payment_intents", &form).await?;
        let intent: PaymentIntent =
            serde_json::from_str(&body).map_err(|e| ProviderError::Api(e.to_string()))?;

        tracing::info!(
            intent_id = %intent.id,
            status = %intent.status,
            "Stripe PaymentIntent created"
        );

        Ok(ProviderPayment {
            gateway_ref: intent.id,
            client_secret: intent.client_secret,
            redirect_url: None,
        })
    }

    async fn create_checkout_session(
        &self,
        params: &InitiateParams,
    ) -> Result<ProviderPayment, ProviderError> {
        let amount = to_minor_units(params.amount)?;
        let join = if params.callback_url.contains('?') {
            '&'
        } else {
            '?'
        };
        let success_url = format!("{}{}status=success", params.callback_url, join);
        let cancel_url = format!("{}{}status=failed", params.callback_url, join);

        let form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), success_url),
            ("cancel_url".to_string(), cancel_url),
            (
                "line_items[0][price_data][currency]".to_string(),
                params.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                params.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                amount.to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "metadata[transaction_id]".to_string(),
                params.transaction_id.clone(),
            ),
        ];

        let body = self.post_form("/checkout/sessions", &form).await?;
        let session: CheckoutSession =
            serde_json::from_str(&body).map_err(|e| ProviderError::Api(e.to_string()))?;

        let redirect_url = session.url.clone().ok_or_else(|| {
            ProviderError::Api("Checkout session missing redirect URL".to_string())
        })?;

        tracing::info!(session_id = %session.id, "Stripe Checkout session created");

        Ok(ProviderPayment {
            gateway_ref: session.id,
            client_secret: None,
            redirect_url: Some(redirect_url),
        })
    }

    /// Verify a `Stripe-Signature` header against the raw webhook body.
    ///
    /// Scheme: `t=<unix ts>,v1=<hmac-sha256(ts + "." + body)>`, constant-time
    /// compare, with a replay tolerance window on the timestamp.
    pub fn verify_webhook_signature(&self, body: &str, header: &str) -> Result<bool, anyhow::Error> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let Some(timestamp) = timestamp else {
            return Ok(false);
        };
        if signatures.is_empty() {
            return Ok(false);
        }

        if (Utc::now().timestamp() - timestamp).abs() > WEBHOOK_TOLERANCE_SECONDS {
            tracing::warn!(timestamp, "Webhook timestamp outside tolerance");
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp, body);
        let secret = self.config.webhook_secret.expose_secret();

        for signature in signatures {
            if verify_payload(secret, &signed_payload, signature)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn parse_webhook_event(&self, body: &str) -> Result<StripeEvent, anyhow::Error> {
        let event: StripeEvent = serde_json::from_str(body)?;
        Ok(event)
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Api(err.to_string())
    }
}

fn map_api_error(body: &str) -> ProviderError {
    let detail = serde_json::from_str::<StripeErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or(StripeErrorDetail {
            error_type: None,
            code: None,
            message: None,
        });

    let message = detail
        .message
        .unwrap_or_else(|| "Unknown provider error".to_string());

    match detail.error_type.as_deref() {
        // Surfaced verbatim to the user; everything else is generic.
        Some("card_error") | Some("validation_error") => ProviderError::Declined {
            code: detail.code.unwrap_or_else(|| "card_declined".to_string()),
            message,
        },
        _ => ProviderError::Api(message),
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    fn publishable_key(&self) -> Option<String> {
        Some(self.config.publishable_key.clone())
    }

    async fn initiate(&self, params: InitiateParams) -> Result<ProviderPayment, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(
                "Stripe credentials not configured".to_string(),
            ));
        }

        match params.mode {
            PaymentMode::Elements => self.create_payment_intent(&params).await,
            PaymentMode::Checkout => self.create_checkout_session(&params).await,
        }
    }

    async fn fetch_status(
        &self,
        gateway_ref: &str,
    ) -> Result<ProviderPaymentStatus, ProviderError> {
        if gateway_ref.starts_with("cs_") {
            let body = self.get(&format!("/checkout/sessions/{}", gateway_ref)).await?;
            let session: CheckoutSession =
                serde_json::from_str(&body).map_err(|e| ProviderError::Api(e.to_string()))?;

            return Ok(match session.payment_status.as_deref() {
                Some("paid") => ProviderPaymentStatus::Succeeded {
                    gateway_transaction_id: session
                        .payment_intent
                        .unwrap_or(session.id),
                },
                _ if session.status.as_deref() == Some("expired") => {
                    ProviderPaymentStatus::Failed {
                        code: Some("session_expired".to_string()),
                        message: "Checkout session expired".to_string(),
                    }
                }
                _ => ProviderPaymentStatus::Processing,
            });
        }

        let body = self.get(&format!("/payment_intents/{}", gateway_ref)).await?;
        let intent: PaymentIntent =
            serde_json::from_str(&body).map_err(|e| ProviderError::Api(e.to_string()))?;

        Ok(match intent.status.as_str() {
            "succeeded" => ProviderPaymentStatus::Succeeded {
                gateway_transaction_id: intent.id,
            },
            "canceled" => ProviderPaymentStatus::Failed {
                code: Some("canceled".to_string()),
                message: "Payment was canceled".to_string(),
            },
            "requires_payment_method" if intent.last_payment_error.is_some() => {
                let error = intent.last_payment_error.unwrap();
                ProviderPaymentStatus::Failed {
                    code: error.code,
                    message: error
                        .message
                        .unwrap_or_else(|| "Payment failed".to_string()),
                }
            }
            _ => ProviderPaymentStatus::Processing,
        })
    }
}
