use anyhow::{Result, bail};
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

use crate::models::ProviderKind;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub catalog: CatalogConfig,
    pub gateway: GatewayConfig,
    pub stripe: StripeConfig,
    pub mock_gateway: MockGatewayConfig,
    pub reconciliation: ReconciliationConfig,
    pub environment: Environment,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CatalogConfig {
    pub url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub provider: ProviderKind,
    /// When set, payment initiation is rejected with a maintenance response
    /// before any provider call is made.
    pub maintenance_mode: bool,
    /// Base URL under which the callback route is reachable from a browser.
    pub public_base_url: String,
    /// SPA page the callback redirects to once the transaction is recorded.
    pub frontend_result_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub publishable_key: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MockGatewayConfig {
    pub enabled: bool,
    pub callback_secret: Secret<String>,
    /// Artificial settlement delay before the simulator redirects back.
    pub delay_ms: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReconciliationConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Transactions stuck in a non-terminal state for longer than this are
    /// re-checked against the provider.
    pub stale_after_seconds: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("PAYMENT_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PAYMENT_SERVICE_PORT")
            .unwrap_or_else(|_| "3003".to_string())
            .parse()?;

        let db_url = env::var("PAYMENT_DATABASE_URL").expect("PAYMENT_DATABASE_URL must be set");
        let db_name =
            env::var("PAYMENT_DATABASE_NAME").unwrap_or_else(|_| "payment_db".to_string());

        let redis_url = env::var("PAYMENT_REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let jwt_secret = env::var("PLATFORM_JWT_SECRET").expect("PLATFORM_JWT_SECRET must be set");

        let catalog_url =
            env::var("CATALOG_SERVICE_URL").unwrap_or_else(|_| "http://localhost:3002".to_string());

        let environment = match env::var("APP_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        let provider = match env::var("PAYMENT_PROVIDER")
            .unwrap_or_else(|_| "stripe".to_string())
            .as_str()
        {
            "mock" => ProviderKind::Mock,
            _ => ProviderKind::Stripe,
        };

        let maintenance_mode = env::var("PAYMENT_MAINTENANCE_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let mock_enabled = env::var("MOCK_GATEWAY_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let config = Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            redis: RedisConfig {
                url: Secret::new(redis_url),
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            catalog: CatalogConfig { url: catalog_url },
            gateway: GatewayConfig {
                provider,
                maintenance_mode,
                public_base_url: env::var("PAYMENT_PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}", port)),
                frontend_result_url: env::var("PAYMENT_FRONTEND_RESULT_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/payment-result".to_string()),
            },
            stripe: StripeConfig {
                publishable_key: env::var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
                secret_key: Secret::new(env::var("STRIPE_SECRET_KEY").unwrap_or_default()),
                webhook_secret: Secret::new(env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default()),
                api_base_url: env::var("STRIPE_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
                timeout_seconds: env::var("STRIPE_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(15),
            },
            mock_gateway: MockGatewayConfig {
                enabled: mock_enabled,
                callback_secret: Secret::new(
                    env::var("MOCK_GATEWAY_CALLBACK_SECRET")
                        .unwrap_or_else(|_| "mock-callback-secret".to_string()),
                ),
                delay_ms: env::var("MOCK_GATEWAY_DELAY_MS")
                    .unwrap_or_else(|_| "800".to_string())
                    .parse()
                    .unwrap_or(800),
            },
            reconciliation: ReconciliationConfig {
                enabled: env::var("RECONCILIATION_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
                interval_seconds: env::var("RECONCILIATION_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                stale_after_seconds: env::var("RECONCILIATION_STALE_AFTER_SECONDS")
                    .unwrap_or_else(|_| "900".to_string())
                    .parse()
                    .unwrap_or(900),
            },
            environment,
            service_name: "payment-service".to_string(),
        };

        config.validate()?;
        Ok(config)
    }

    /// The mock gateway must never be reachable in production.
    pub fn validate(&self) -> Result<()> {
        if self.environment == Environment::Production {
            if self.mock_gateway.enabled {
                bail!("Mock gateway cannot be enabled in production");
            }
            if self.gateway.provider == ProviderKind::Mock {
                bail!("Mock payment provider cannot be selected in production");
            }
        }
        Ok(())
    }
}
