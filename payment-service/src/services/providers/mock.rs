//! Local mock gateway provider.
//!
//! Stands in for the real provider in non-production environments: payment
//! objects are fabricated locally and "checkout" redirects to the built-in
//! simulator page, which signs and issues the same callback shape the real
//! gateway would. Selection in production is rejected by config validation.

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    InitiateParams, PaymentProvider, ProviderError, ProviderPayment, ProviderPaymentStatus,
};
use crate::config::MockGatewayConfig;
use crate::models::{PaymentMode, ProviderKind};

#[derive(Clone)]
pub struct MockGatewayProvider {
    config: MockGatewayConfig,
    /// Base URL of this service, where the simulator page is mounted.
    public_base_url: String,
}

impl MockGatewayProvider {
    pub fn new(config: MockGatewayConfig, public_base_url: String) -> Self {
        Self {
            config,
            public_base_url,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn simulator_url(&self, params: &InitiateParams) -> String {
        let mut query = vec![
            ("transactionId".to_string(), params.transaction_id.clone()),
            ("amount".to_string(), params.amount.to_string()),
            ("callbackUrl".to_string(), params.callback_url.clone()),
            ("merchantId".to_string(), "MOCK_MERCHANT".to_string()),
        ];
        if let Some(name) = &params.customer_name {
            query.push(("customerName".to_string(), name.clone()));
        }
        if let Some(email) = &params.customer_email {
            query.push(("customerEmail".to_string(), email.clone()));
        }

        let encoded = serde_urlencoded::to_string(&query).unwrap_or_default();
        format!("{}/mock-gateway?{}", self.public_base_url, encoded)
    }
}

#[async_trait]
impl PaymentProvider for MockGatewayProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn publishable_key(&self) -> Option<String> {
        Some("pk_mock".to_string())
    }

    async fn initiate(&self, params: InitiateParams) -> Result<ProviderPayment, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock gateway is not enabled".to_string(),
            ));
        }

        let gateway_ref = format!("mock_order_{}", Uuid::new_v4().simple());

        tracing::info!(
            transaction_id = %params.transaction_id,
            gateway_ref = %gateway_ref,
            "Mock gateway payment initiated"
        );

        let payment = match params.mode {
            PaymentMode::Elements => ProviderPayment {
                client_secret: Some(format!("{}_secret_{}", gateway_ref, Uuid::new_v4().simple())),
                redirect_url: Some(self.simulator_url(&params)),
                gateway_ref,
            },
            PaymentMode::Checkout => ProviderPayment {
                client_secret: None,
                redirect_url: Some(self.simulator_url(&params)),
                gateway_ref,
            },
        };

        Ok(payment)
    }

    /// The mock gateway keeps no server-side state; the signed callback is
    /// the only source of truth, so re-checks always report in-flight.
    async fn fetch_status(
        &self,
        _gateway_ref: &str,
    ) -> Result<ProviderPaymentStatus, ProviderError> {
        Ok(ProviderPaymentStatus::Processing)
    }
}
