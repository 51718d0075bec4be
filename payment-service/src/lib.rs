pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    Router,
    routing::{get, post},
};
use mongodb::{Client, options::ClientOptions};
use secrecy::ExposeSecret;
use service_core::middleware::{
    auth::{JwtConfig, jwt_auth_middleware},
    metrics::metrics_middleware,
    tracing::request_id_middleware,
};
use tower_http::trace::TraceLayer;

use config::Config;
use models::ProviderKind;
use services::providers::{MockGatewayProvider, PaymentProvider, StripeProvider};
use services::{CatalogClient, PaymentRepository};

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub redis: redis::Client,
    pub config: Config,
    pub jwt_config: JwtConfig,
    pub repository: PaymentRepository,
    pub catalog: CatalogClient,
    /// Provider behind the checkout flow, selected by configuration.
    pub provider: Arc<dyn PaymentProvider>,
    /// Always-constructed Stripe client; the webhook route needs its
    /// signature scheme regardless of which provider runs checkout.
    pub stripe: StripeProvider,
}

impl AsRef<JwtConfig> for AppState {
    fn as_ref(&self) -> &JwtConfig {
        &self.jwt_config
    }
}

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
    db: mongodb::Database,
    state: AppState,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("payment-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let redis = redis::Client::open(config.redis.url.expose_secret().as_str())?;

        let repository = PaymentRepository::new(&db);
        repository.init_indexes().await?;

        let catalog = CatalogClient::new(
            config.catalog.url.clone(),
            config.auth.jwt_secret.clone(),
        );

        let stripe = StripeProvider::new(config.stripe.clone());
        let provider: Arc<dyn PaymentProvider> = match config.gateway.provider {
            ProviderKind::Stripe => {
                if stripe.is_configured() {
                    tracing::info!("Stripe payment provider initialized");
                } else {
                    tracing::warn!(
                        "Stripe credentials not configured - payment features will be limited"
                    );
                }
                Arc::new(stripe.clone())
            }
            ProviderKind::Mock => {
                tracing::warn!("Mock gateway selected as the payment provider");
                Arc::new(MockGatewayProvider::new(
                    config.mock_gateway.clone(),
                    config.gateway.public_base_url.clone(),
                ))
            }
        };

        let jwt_config = JwtConfig {
            secret: config.auth.jwt_secret.clone(),
        };

        let state = AppState {
            db: db.clone(),
            redis,
            config: config.clone(),
            jwt_config,
            repository,
            catalog,
            provider,
            stripe,
        };

        let authed_routes = Router::new()
            .route(
                "/api/payment/initiate",
                post(handlers::payments::initiate_payment),
            )
            .route(
                "/api/payment/status/:transaction_id",
                get(handlers::payments::get_status),
            )
            .route(
                "/api/payment/receipt/:transaction_id",
                get(handlers::payments::download_receipt),
            )
            .route(
                "/api/payment/transactions",
                get(handlers::payments::list_transactions),
            )
            .route_layer(from_fn_with_state(
                state.clone(),
                jwt_auth_middleware::<AppState>,
            ));

        let mut router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // Browser redirect target; provider signatures stand in for auth
            .route(
                "/api/payment/callback",
                get(handlers::callback::payment_callback),
            )
            .route("/api/payment/webhook", post(handlers::webhook::stripe_webhook))
            .merge(authed_routes);

        if config.mock_gateway.enabled {
            router = router
                .route("/mock-gateway", get(handlers::mock_gateway::gateway_page))
                .route(
                    "/mock-gateway/simulate",
                    get(handlers::mock_gateway::simulate),
                );
        }

        let router = router
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .with_state(state.clone());

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            db,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        if self.state.config.reconciliation.enabled {
            tokio::spawn(services::reconciliation::run(self.state.clone()));
        }

        tracing::info!("payment-service listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
