use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base URL for provider callbacks (e.g. https://api.example.com)
    pub base_url: String,
    /// Payment-provider API access token (bearer)
    pub provider_access_token: String,
    /// Shared secret used to verify webhook signatures
    pub webhook_secret: String,
    /// Where reservation-confirmation notifications are POSTed.
    /// None disables delivery (log only).
    pub confirmation_webhook_url: Option<String>,
    /// Timeout applied to provider API calls
    pub provider_timeout: Duration,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("RENTORA_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let provider_timeout_secs: u64 = env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "rentora.db".to_string()),
            base_url,
            provider_access_token: env::var("MP_ACCESS_TOKEN").unwrap_or_default(),
            webhook_secret: env::var("MP_WEBHOOK_SECRET").unwrap_or_default(),
            confirmation_webhook_url: env::var("CONFIRMATION_WEBHOOK_URL").ok(),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
