//! Payment provider abstractions and implementations.
//!
//! A trait-based seam between the checkout flow and the gateway, so the
//! real provider (Stripe) and the local mock gateway are interchangeable
//! behind configuration.

pub mod mock;
pub mod stripe;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{PaymentMode, ProviderKind};

pub use mock::MockGatewayProvider;
pub use stripe::StripeProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Synchronous decline (card/validation error). The message is surfaced
    /// to the user verbatim.
    #[error("{message}")]
    Declined { code: String, message: String },

    #[error("Payment gateway timed out")]
    Timeout,

    #[error("Provider API error: {0}")]
    Api(String),
}

/// Parameters for creating a provider-side payment object.
#[derive(Debug, Clone)]
pub struct InitiateParams {
    pub transaction_id: String,
    /// Amount in major currency units, already discounted and taxed.
    pub amount: Decimal,
    pub currency: String,
    pub mode: PaymentMode,
    pub description: String,
    /// Browser redirect target carrying the transaction id.
    pub callback_url: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

/// Provider-side payment object created at initiation.
#[derive(Debug, Clone)]
pub struct ProviderPayment {
    pub gateway_ref: String,
    /// Present in elements mode.
    pub client_secret: Option<String>,
    /// Present in checkout mode.
    pub redirect_url: Option<String>,
}

/// Current provider-side view of a payment, used by callback handling and
/// the reconciliation sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    Processing,
    Succeeded {
        gateway_transaction_id: String,
    },
    Failed {
        code: Option<String>,
        message: String,
    },
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Key the client needs to initialize the embedded payment UI.
    fn publishable_key(&self) -> Option<String>;

    async fn initiate(&self, params: InitiateParams) -> Result<ProviderPayment, ProviderError>;

    async fn fetch_status(&self, gateway_ref: &str)
    -> Result<ProviderPaymentStatus, ProviderError>;
}
