#![allow(dead_code)]

use mongodb::bson::doc;
use payment_service::Application;
use payment_service::config::{
    AuthConfig, CatalogConfig, Config, DatabaseConfig, Environment, GatewayConfig,
    MockGatewayConfig, ReconciliationConfig, RedisConfig, ServerConfig, StripeConfig,
};
use payment_service::models::ProviderKind;
use secrecy::Secret;
use service_core::utils::jwt::{Role, issue_token};
use service_core::utils::signature::sign_payload;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const MOCK_CALLBACK_SECRET: &str = "test-mock-secret";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test";

pub struct TestAppOptions {
    pub provider: ProviderKind,
    pub maintenance_mode: bool,
    pub catalog_url: String,
    pub stripe_api_base_url: String,
    pub stripe_timeout_seconds: u64,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Mock,
            maintenance_mode: false,
            catalog_url: "http://localhost:3002".to_string(),
            stripe_api_base_url: "https://api.stripe.com/v1".to_string(),
            stripe_timeout_seconds: 5,
        }
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
}

impl TestApp {
    pub async fn try_spawn(options: TestAppOptions) -> Option<Self> {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        if !mongo_available(&uri).await {
            eprintln!("skipping: MongoDB not reachable at {uri}");
            return None;
        }

        let db_name = format!("payment_test_{}", uuid::Uuid::new_v4().simple());

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(uri),
                db_name: db_name.clone(),
            },
            redis: RedisConfig {
                url: Secret::new(
                    std::env::var("TEST_REDIS_URL")
                        .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                ),
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(JWT_SECRET.to_string()),
            },
            catalog: CatalogConfig {
                url: options.catalog_url,
            },
            gateway: GatewayConfig {
                provider: options.provider,
                maintenance_mode: options.maintenance_mode,
                public_base_url: "http://127.0.0.1:0".to_string(),
                frontend_result_url: "http://localhost:3000/payment-result".to_string(),
            },
            stripe: StripeConfig {
                publishable_key: "pk_test_123".to_string(),
                secret_key: Secret::new("sk_test_123".to_string()),
                webhook_secret: Secret::new(STRIPE_WEBHOOK_SECRET.to_string()),
                api_base_url: options.stripe_api_base_url,
                timeout_seconds: options.stripe_timeout_seconds,
            },
            mock_gateway: MockGatewayConfig {
                enabled: true,
                callback_secret: Secret::new(MOCK_CALLBACK_SECRET.to_string()),
                delay_ms: 0,
            },
            reconciliation: ReconciliationConfig {
                enabled: false,
                interval_seconds: 300,
                stale_after_seconds: 900,
            },
            environment: Environment::Development,
            service_name: "payment-service-test".to_string(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let test_app = TestApp {
            address: format!("http://127.0.0.1:{}", port),
            port,
            db,
        };

        test_app.wait_until_healthy().await;
        Some(test_app)
    }

    async fn wait_until_healthy(&self) {
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", self.address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                return;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }
        panic!("payment-service did not become healthy");
    }

    pub fn token_for(user_id: &str, role: Role) -> String {
        issue_token(JWT_SECRET, user_id, role, 3600).expect("Failed to issue test token")
    }

    pub async fn cleanup(&self) {
        self.db
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }

    pub async fn transaction_count(&self) -> u64 {
        self.db
            .collection::<mongodb::bson::Document>("transactions")
            .count_documents(doc! {}, None)
            .await
            .expect("Failed to count transactions")
    }

    /// Fetch `/api/payment/status/:id` as the given user and return the
    /// transaction object.
    pub async fn fetch_status(&self, transaction_id: &str, user_id: &str) -> serde_json::Value {
        let response = reqwest::Client::new()
            .get(format!(
                "{}/api/payment/status/{}",
                self.address, transaction_id
            ))
            .bearer_auth(Self::token_for(user_id, Role::Student))
            .send()
            .await
            .expect("Failed to fetch status");
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        body["transaction"].clone()
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

/// Stub catalog-service endpoints on a wiremock server: one published
/// course plus enrollment and redemption sinks.
pub async fn stub_catalog_course(server: &MockServer, course_id: &str, price: f64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/courses/{}", course_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": course_id,
            "title": "Practical Systems Programming",
            "description": "",
            "category": "programming",
            "price": price,
            "currency": "INR",
            "instructor": null,
            "partnerId": null,
            "modules": [],
            "published": true,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z",
        })))
        .mount(server)
        .await;
}

pub async fn stub_catalog_discount(server: &MockServer, discount_type: &str, value: f64) {
    Mock::given(method("POST"))
        .and(path("/api/discount/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": discount_type,
            "value": value,
        })))
        .mount(server)
        .await;
}

pub async fn stub_catalog_fulfillment(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/enrollments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": uuid::Uuid::new_v4(),
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/discount/redeem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": "ANY",
        })))
        .mount(server)
        .await;
}

/// Initiate a payment against a mock-provider TestApp and return the
/// transaction id.
pub async fn initiate_mock_payment(
    app: &TestApp,
    user_id: &str,
    course_id: &str,
    discount_code: Option<&str>,
) -> String {
    let mut body = serde_json::json!({ "courseId": course_id, "mode": "elements" });
    if let Some(code) = discount_code {
        body["discountCode"] = serde_json::json!(code);
    }

    let response = reqwest::Client::new()
        .post(format!("{}/api/payment/initiate", app.address))
        .bearer_auth(TestApp::token_for(user_id, Role::Student))
        .json(&body)
        .send()
        .await
        .expect("Failed to initiate payment");

    assert_eq!(response.status(), 201, "initiation failed");
    let body: serde_json::Value = response.json().await.unwrap();
    body["transactionId"].as_str().unwrap().to_string()
}

/// Build a signed mock-gateway callback URL for a transaction.
pub fn signed_callback_url(
    app: &TestApp,
    transaction_id: &str,
    status: &str,
    gateway_transaction_id: &str,
    amount: &str,
    error: Option<(&str, &str)>,
) -> String {
    let payload = format!(
        "{}|{}|{}|{}",
        transaction_id, status, gateway_transaction_id, amount
    );
    let signature = sign_payload(MOCK_CALLBACK_SECRET, &payload).unwrap();

    let mut query = vec![
        ("transactionId", transaction_id.to_string()),
        ("status", status.to_string()),
        ("gatewayTransactionId", gateway_transaction_id.to_string()),
        ("amount", amount.to_string()),
        ("signature", signature),
    ];
    if let Some((code, message)) = error {
        query.push(("errorCode", code.to_string()));
        query.push(("errorMessage", message.to_string()));
    }

    format!(
        "{}/api/payment/callback?{}",
        app.address,
        serde_urlencoded::to_string(&query).unwrap()
    )
}

/// A reqwest client that does not follow redirects, so tests can inspect
/// callback/redirect targets.
pub fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
