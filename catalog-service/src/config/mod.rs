use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub service_name: String,
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
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CATALOG_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CATALOG_SERVICE_PORT")
            .unwrap_or_else(|_| "3002".to_string())
            .parse()?;

        let db_url = env::var("CATALOG_DATABASE_URL").expect("CATALOG_DATABASE_URL must be set");
        let db_name =
            env::var("CATALOG_DATABASE_NAME").unwrap_or_else(|_| "catalog_db".to_string());

        let jwt_secret = env::var("PLATFORM_JWT_SECRET").expect("PLATFORM_JWT_SECRET must be set");

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            service_name: "catalog-service".to_string(),
        })
    }
}
