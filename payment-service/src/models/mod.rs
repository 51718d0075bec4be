use mongodb::bson::DateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single payment attempt, tracked from initiation to terminal outcome.
///
/// Pricing fields are fixed at initiation by the pricing calculator and
/// never recomputed: `final_amount = (original_amount - discount_amount) * 1.18`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub user_id: String,
    pub original_amount: Decimal,
    pub discount_code: Option<String>,
    pub discount_amount: Decimal,
    pub gst_amount: Decimal,
    pub final_amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub mode: PaymentMode,
    pub provider: ProviderKind,
    /// Provider-side object created at initiation (PaymentIntent/session/mock order).
    pub provider_ref: Option<String>,
    /// Secret/URL handed to the client; kept so a retried initiation can
    /// return the same checkout material.
    pub client_secret: Option<String>,
    pub payment_url: Option<String>,
    /// Final gateway transaction id reported by the callback or webhook.
    pub gateway_transaction_id: Option<String>,
    pub payment_method: Option<PaymentMethodDetails>,
    pub error_message: Option<String>,
    pub error_category: Option<String>,
    pub refund: Option<RefundDetails>,
    pub initiated_at: DateTime,
    pub callback_received_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub updated_at: DateTime,
}

impl Transaction {
    pub fn new_id() -> String {
        format!("txn_{}", Uuid::new_v4().simple())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Success | TransactionStatus::Failed | TransactionStatus::Refunded
        )
    }

    /// The lifecycle only moves forward: pending → processing → success|failed,
    /// plus the administrative success → refunded edge.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Success)
                | (Pending, Failed)
                | (Processing, Success)
                | (Processing, Failed)
                | (Success, Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// Embedded provider UI; the client confirms with a client secret.
    Elements,
    /// Full-page redirect to a provider-hosted payment page.
    Checkout,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Mock,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentMethodDetails {
    pub method: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefundDetails {
    pub refund_id: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub refunded_at: DateTime,
}
