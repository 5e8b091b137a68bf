pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use auth::{AuthService, RateLimiter, RateLimitConfig, TokenConfig, TokenService};
pub use db::{MemoryUserStore, PgUserStore, User, UserStore};

use crate::config::StoreBackend;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers every route plus the JSON payload error mapping.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::ValidationError(format!("invalid request body: {}", err)).into()
    }))
    .route("/health", web::get().to(health_check))
    .service(
        web::scope("/api/v1")
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth::handlers::login))
                    .route("/register", web::post().to(auth::handlers::register))
                    .route("/refresh", web::post().to(auth::handlers::refresh))
                    .route("/logout", web::post().to(auth::handlers::logout)),
            )
            .service(
                web::scope("/users")
                    .route("/me", web::get().to(api::users::current_user))
                    .route("/{id}", web::get().to(api::users::get_user)),
            ),
    );
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub users: Arc<dyn UserStore>,
    pub auth_service: Arc<AuthService>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let users: Arc<dyn UserStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let store = PgUserStore::new_with_options(
                    &config.database.url,
                    config.database.max_connections,
                    Duration::from_secs(config.database.acquire_timeout_secs),
                )
                .await
                .map_err(|e| match e {
                    AppError::DatabaseError(inner) => {
                        AppError::DatabaseError(error::DatabaseError::ConnectionError(inner.to_string()))
                    }
                    other => other,
                })?;
                store.migrate().await?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("using the in-memory user store; accounts are lost on restart");
                Arc::new(MemoryUserStore::new())
            }
        };

        Self::with_store(config, users)
    }

    pub fn with_store(config: Settings, users: Arc<dyn UserStore>) -> Result<Self> {
        let tokens = TokenService::new(TokenConfig::from(&config.auth))?;
        let limiter = RateLimiter::new(RateLimitConfig::from(&config.auth));

        Ok(Self {
            auth_service: Arc::new(AuthService::new(users.clone(), tokens)?),
            login_limiter: Arc::new(limiter),
            users,
            config: Arc::new(config),
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.users.close().await;
        Ok(())
    }
}
