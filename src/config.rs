//! Application configuration management with security considerations.
//!
//! This module handles all configuration values required for the webhook
//! ingestion service. It includes secure storage indicators for sensitive
//! configuration fields and validation mechanisms to ensure proper security
//! practices.
//!
//! # Security Notes
//! - Sensitive fields are clearly marked and should never be logged
//! - Production environments should use secure secret management systems
//! - The HMAC app secret is mandatory in production; startup fails without it

use envconfig::Envconfig;
use std::sync::OnceLock;

/// Application configuration with security-aware field management.
///
/// This struct contains all environment variables used to configure the
/// application. Sensitive fields are clearly marked and include security
/// guidance.
#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Database host value (NON-SENSITIVE)
    /// Example: "sqlite:data/app.db"
    pub db_host: String,

    /// 🔒 SENSITIVE: Database password to encrypt SQLite data
    pub db_pass_encrypt: String,

    /// Host address for web server binding (NON-SENSITIVE)
    /// Example: "0.0.0.0", "localhost", "crm.example.com"
    pub web_server_host: String,

    /// Port for web server binding (NON-SENSITIVE)
    /// Common values: 80 (HTTP), 443 (HTTPS), 8080 (dev)
    pub web_server_port: u64,

    /// Path to SSL private key file (SENSITIVE PATH)
    /// Security: File should have 600 permissions, store path securely
    #[envconfig(default = "server.key")]
    pub private_key_path: String,

    /// Path to SSL certificate file (NON-SENSITIVE)
    #[envconfig(default = "server.crt")]
    pub certificate_path: String,

    /// 🔒 SENSITIVE: Logfire write token for logs and metrics
    pub logfire_token: String,

    /// 🔒 SENSITIVE: Subscription-handshake secret compared against
    /// `hub.verify_token` on the webhook verification GET
    pub whatsapp_webhook_verify_token: String,

    /// 🔒 SENSITIVE: Meta app secret used as the HMAC-SHA256 key for
    /// X-Hub-Signature-256 validation. Required in production.
    #[envconfig(from = "WHATSAPP_APP_SECRET")]
    pub whatsapp_app_secret: Option<String>,

    /// 🔒 SENSITIVE: Alternate variable name for the same HMAC key,
    /// recognized for deployments configured with META_APP_SECRET
    #[envconfig(from = "META_APP_SECRET")]
    pub meta_app_secret: Option<String>,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    /// The HMAC key for webhook signature verification.
    ///
    /// `WHATSAPP_APP_SECRET` wins over `META_APP_SECRET` when both are set.
    pub fn app_secret(&self) -> Option<&str> {
        self.whatsapp_app_secret
            .as_deref()
            .or(self.meta_app_secret.as_deref())
    }
}

/// Global application configuration instance, set once from `main`
pub static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Loads the configuration from the environment and validates security
/// requirements before the server starts accepting traffic.
pub fn init_config() -> anyhow::Result<()> {
    let app_config = AppConfig::init_from_env()?;

    // Fail closed: a production deployment without an HMAC key would accept
    // unauthenticated webhook traffic.
    if app_config.is_prod() && app_config.app_secret().is_none() {
        anyhow::bail!(
            "WHATSAPP_APP_SECRET or META_APP_SECRET must be configured in production"
        );
    }

    APP_CONFIG
        .set(app_config)
        .map_err(|_| anyhow::anyhow!("app config was already initialized"))
}
