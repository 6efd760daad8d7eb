//! Server configuration from environment variables.

use tracing::warn;

/// Fallback secret for local development only.
const DEV_JWT_SECRET: &str = "portfolio_secret_key";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub auth_db_path: String,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5000);

        let auth_db_path =
            std::env::var("AUTH_DB_PATH").unwrap_or_else(|_| "./portfolio_auth.db".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("⚠️  JWT_SECRET not set, using development default");
            DEV_JWT_SECRET.to_string()
        });

        Self {
            port,
            auth_db_path,
            jwt_secret,
        }
    }
}
