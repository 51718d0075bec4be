pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    Router,
    routing::{get, post, put},
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
use services::CatalogRepository;

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub config: Config,
    pub jwt_config: JwtConfig,
    pub repository: CatalogRepository,
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
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("catalog-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = CatalogRepository::new(&db);
        repository.init_indexes().await?;

        let jwt_config = JwtConfig {
            secret: config.auth.jwt_secret.clone(),
        };

        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            jwt_config,
            repository,
        };

        let admin_routes = Router::new()
            .route("/api/courses", post(handlers::courses::create_course))
            .route("/api/courses/:id", put(handlers::courses::update_course))
            .route("/api/discount", post(handlers::discounts::create_discount))
            .route(
                "/api/discount/redeem",
                post(handlers::discounts::redeem_discount),
            )
            .route(
                "/api/enrollments",
                post(handlers::enrollments::create_enrollment),
            )
            .route(
                "/api/enrollments/user/:user_id",
                get(handlers::enrollments::list_user_enrollments),
            )
            .route(
                "/api/enrollments/:id/progress",
                put(handlers::enrollments::update_progress),
            )
            .route_layer(from_fn_with_state(
                state.clone(),
                jwt_auth_middleware::<AppState>,
            ));

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            .route("/api/courses", get(handlers::courses::list_courses))
            .route("/api/courses/:id", get(handlers::courses::get_course))
            .route(
                "/api/discount/validate",
                post(handlers::discounts::validate_discount),
            )
            .merge(admin_routes)
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
            .with_state(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            db,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("catalog-service listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
