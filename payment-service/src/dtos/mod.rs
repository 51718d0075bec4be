//! Wire DTOs for the payment API. JSON and query-string casing is camelCase
//! (the SPA contract); stored documents keep snake_case.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{PaymentMode, RefundDetails, Transaction, TransactionStatus};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub discount_code: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: PaymentMode,
}

fn default_mode() -> PaymentMode {
    PaymentMode::Elements
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InitiatePaymentResponse {
    #[serde(rename_all = "camelCase")]
    Elements {
        client_secret: String,
        transaction_id: String,
        publishable_key: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Checkout {
        payment_url: String,
        transaction_id: String,
    },
}

/// Query parameters of the provider/mock callback redirect.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    pub transaction_id: String,
    pub status: String,
    pub gateway_transaction_id: Option<String>,
    pub signature: Option<String>,
    pub amount: Option<Decimal>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub status: Option<TransactionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsResponse {
    pub transactions: Vec<TransactionView>,
    pub total_count: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub transaction: TransactionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub transaction_id: String,
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
    pub gateway_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub error_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundView>,
    pub initiated_at: String,
    pub callback_received_at: Option<String>,
    pub completed_at: Option<String>,
    pub timeline: Vec<TimelineStep>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundView {
    pub refund_id: String,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub refunded_at: String,
}

impl From<RefundDetails> for RefundView {
    fn from(r: RefundDetails) -> Self {
        Self {
            refund_id: r.refund_id,
            amount: r.amount,
            reason: r.reason,
            refunded_at: r.refunded_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

/// One checkpoint of the fixed three-step status timeline.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStep {
    pub label: &'static str,
    pub completed: bool,
    pub timestamp: Option<String>,
}

fn format_ts(ts: mongodb::bson::DateTime) -> String {
    ts.try_to_rfc3339_string().unwrap_or_default()
}

impl From<Transaction> for TransactionView {
    fn from(t: Transaction) -> Self {
        let terminal = t.status.is_terminal();
        let timeline = vec![
            TimelineStep {
                label: "Initiated",
                completed: true,
                timestamp: Some(format_ts(t.initiated_at)),
            },
            TimelineStep {
                label: "Processing",
                completed: t.status != TransactionStatus::Pending,
                timestamp: t.callback_received_at.map(format_ts),
            },
            TimelineStep {
                label: if t.status == TransactionStatus::Failed {
                    "Failed"
                } else {
                    "Completed"
                },
                completed: terminal,
                timestamp: t.completed_at.map(format_ts),
            },
        ];

        Self {
            transaction_id: t.id,
            course_id: t.course_id,
            course_title: t.course_title,
            user_id: t.user_id,
            original_amount: t.original_amount,
            discount_code: t.discount_code,
            discount_amount: t.discount_amount,
            gst_amount: t.gst_amount,
            final_amount: t.final_amount,
            currency: t.currency,
            status: t.status,
            mode: t.mode,
            gateway_transaction_id: t.gateway_transaction_id,
            error_message: t.error_message,
            error_category: t.error_category,
            refund: t.refund.map(RefundView::from),
            initiated_at: format_ts(t.initiated_at),
            callback_received_at: t.callback_received_at.map(format_ts),
            completed_at: t.completed_at.map(format_ts),
            timeline,
        }
    }
}
