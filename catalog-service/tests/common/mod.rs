#![allow(dead_code)]

use catalog_service::Application;
use catalog_service::config::{AuthConfig, Config, DatabaseConfig, ServerConfig};
use mongodb::bson::doc;
use secrecy::Secret;
use service_core::utils::jwt::{Role, issue_token};

pub const JWT_SECRET: &str = "test-jwt-secret";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
}

impl TestApp {
    /// Spawn the service against a throwaway database. Returns `None` when
    /// MongoDB is not reachable so tests can skip instead of fail.
    pub async fn try_spawn() -> Option<Self> {
        let uri = std::env::var("TEST_MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        if !mongo_available(&uri).await {
            eprintln!("skipping: MongoDB not reachable at {uri}");
            return None;
        }

        let db_name = format!("catalog_test_{}", uuid::Uuid::new_v4().simple());

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(uri),
                db_name: db_name.clone(),
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(JWT_SECRET.to_string()),
            },
            service_name: "catalog-service-test".to_string(),
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
        panic!("catalog-service did not become healthy");
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

/// Create a published course through the API, returning its id.
pub async fn seed_course(app: &TestApp, price: f64, partner_id: Option<&str>) -> String {
    let client = reqwest::Client::new();
    let token = TestApp::token_for("uni_1", Role::University);

    let response = client
        .post(format!("{}/api/courses", app.address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "title": "Distributed Systems in Practice",
            "description": "Consensus, replication, and failure handling",
            "category": "programming",
            "price": price,
            "partnerId": partner_id,
            "published": true,
        }))
        .send()
        .await
        .expect("Failed to create course");

    assert_eq!(response.status(), 201, "course seed failed");
    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}
