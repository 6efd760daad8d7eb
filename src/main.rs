//! Portfolio Backend
//! Mission: Serve the portfolio API behind session auth and RBAC

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use portfolio_backend::{
    auth::{api as auth_api, AuthState, JwtHandler, UserStore},
    config::Config,
    middleware::request_logging,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let user_store = Arc::new(UserStore::new(&config.auth_db_path)?);
    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone()));
    let auth_state = AuthState::new(user_store, jwt_handler);

    info!("🔐 Authentication initialized at: {}", config.auth_db_path);

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(auth_api::router(auth_state))
        .layer(axum::middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
