//! Cross-service workflow test infrastructure.
//!
//! Spawns catalog-service and payment-service in-process against throwaway
//! databases and drives the checkout flow over HTTP, end to end: course and
//! discount administration, payment initiation, the mock gateway round
//! trip, status polling, receipts, and fulfillment.

use mongodb::bson::doc;
use secrecy::Secret;
use service_core::utils::jwt::{Role, issue_token};
use std::sync::Once;

pub const JWT_SECRET: &str = "workflow-test-jwt-secret";
pub const MOCK_CALLBACK_SECRET: &str = "workflow-test-mock-secret";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct WorkflowTestContext {
    pub catalog_address: String,
    pub payment_address: String,
    pub catalog_db: mongodb::Database,
    pub payment_db: mongodb::Database,
}

impl WorkflowTestContext {
    /// Spawn both services against fresh databases. Returns `None` when
    /// MongoDB is not reachable so tests can skip instead of fail.
    pub async fn try_spawn() -> Option<Self> {
        init_tracing();

        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        if !mongo_available(&uri).await {
            eprintln!("skipping: MongoDB not reachable at {uri}");
            return None;
        }

        let run_id = uuid::Uuid::new_v4().simple().to_string();

        // Catalog first; payment needs its address.
        let catalog_config = catalog_service::config::Config {
            server: catalog_service::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: catalog_service::config::DatabaseConfig {
                url: Secret::new(uri.clone()),
                db_name: format!("workflow_catalog_{run_id}"),
            },
            auth: catalog_service::config::AuthConfig {
                jwt_secret: Secret::new(JWT_SECRET.to_string()),
            },
            service_name: "catalog-service-test".to_string(),
        };

        let catalog_app = catalog_service::Application::build(catalog_config)
            .await
            .expect("Failed to build catalog-service");
        let catalog_address = format!("http://127.0.0.1:{}", catalog_app.port());
        let catalog_db = catalog_app.db().clone();
        tokio::spawn(async move {
            catalog_app.run_until_stopped().await.ok();
        });

        let payment_config = payment_service::config::Config {
            server: payment_service::config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: payment_service::config::DatabaseConfig {
                url: Secret::new(uri),
                db_name: format!("workflow_payment_{run_id}"),
            },
            redis: payment_service::config::RedisConfig {
                url: Secret::new(
                    std::env::var("TEST_REDIS_URL")
                        .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                ),
            },
            auth: payment_service::config::AuthConfig {
                jwt_secret: Secret::new(JWT_SECRET.to_string()),
            },
            catalog: payment_service::config::CatalogConfig {
                url: catalog_address.clone(),
            },
            gateway: payment_service::config::GatewayConfig {
                provider: payment_service::models::ProviderKind::Mock,
                maintenance_mode: false,
                public_base_url: "http://127.0.0.1:0".to_string(),
                frontend_result_url: "http://localhost:3000/payment-result".to_string(),
            },
            stripe: payment_service::config::StripeConfig {
                publishable_key: "pk_test_123".to_string(),
                secret_key: Secret::new("sk_test_123".to_string()),
                webhook_secret: Secret::new("whsec_test".to_string()),
                api_base_url: "https://api.stripe.com/v1".to_string(),
                timeout_seconds: 5,
            },
            mock_gateway: payment_service::config::MockGatewayConfig {
                enabled: true,
                callback_secret: Secret::new(MOCK_CALLBACK_SECRET.to_string()),
                delay_ms: 0,
            },
            reconciliation: payment_service::config::ReconciliationConfig {
                enabled: false,
                interval_seconds: 300,
                stale_after_seconds: 900,
            },
            environment: payment_service::config::Environment::Development,
            service_name: "payment-service-test".to_string(),
        };

        let payment_app = payment_service::Application::build(payment_config)
            .await
            .expect("Failed to build payment-service");
        let payment_address = format!("http://127.0.0.1:{}", payment_app.port());
        let payment_db = payment_app.db().clone();
        tokio::spawn(async move {
            payment_app.run_until_stopped().await.ok();
        });

        let context = Self {
            catalog_address,
            payment_address,
            catalog_db,
            payment_db,
        };
        context.wait_until_healthy().await;
        Some(context)
    }

    async fn wait_until_healthy(&self) {
        let client = reqwest::Client::new();
        for address in [&self.catalog_address, &self.payment_address] {
            let url = format!("{address}/health");
            let mut healthy = false;
            for _ in 0..50 {
                if client.get(&url).send().await.is_ok() {
                    healthy = true;
                    break;
                }
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            assert!(healthy, "service at {address} did not become healthy");
        }
    }

    pub fn token_for(user_id: &str, role: Role) -> String {
        issue_token(JWT_SECRET, user_id, role, 3600).expect("Failed to issue test token")
    }

    pub async fn cleanup(&self) {
        self.catalog_db.drop(None).await.ok();
        self.payment_db.drop(None).await.ok();
    }
}

async fn mongo_available(uri: &str) -> bool {
    let mut options = match mongodb::options::ClientOptions::parse(uri).await {
        Ok(options) => options,
        Err(_) => return false,
    };
    options.server_selection_timeout = Some(std::time::Duration::from_secs(2));

    let Ok(client) = mongodb::Client::with_options(options) else {
        return false;
    };

    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await
        .is_ok()
}
