//! # Happy CRM Webhook Ingestion Service
//!
//! Entry point for the WhatsApp Business Cloud API ingestion edge of the
//! CRM. Configures logging, the database pool, TLS, and the webhook routes.

#![recursion_limit = "256"]

pub mod api;
pub mod config;
pub mod consts;
pub mod metric;
pub mod models;
pub mod repo;
pub mod server;
pub mod utils;
pub mod webhook;

use anyhow::Context;
use logfire::config::MetricsOptions;
use ntex::web;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    config::init_config()?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Initialize logging and metrics
    let shutdown_handler = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(logfire::config::SendToLogfire::Yes)
        .with_token(&app_config.logfire_token)
        .finish()?;

    // Initialize database connection pool and apply the schema
    let db_pool = utils::setup_sqlite_db_pool(app_config.is_prod()).await?;
    utils::run_migrations(&db_pool).await?;

    let sqlite_repo = repo::sqlite::SqlxSqliteRepo { db_pool };

    // Configure and start the web server
    configure_and_run_server(sqlite_repo).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures SSL acceptor for production environments
fn setup_ssl_acceptor() -> anyhow::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut ssl_acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls_server())
        .map_err(|e| anyhow::anyhow!("Failed to create SSL acceptor: {}", e))?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    ssl_acceptor
        .set_private_key_file(&app_config.private_key_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load private key from {}: {}",
                app_config.private_key_path,
                e
            )
        })?;

    ssl_acceptor
        .set_certificate_file(&app_config.certificate_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load certificate from {}: {}",
                app_config.certificate_path,
                e
            )
        })?;

    Ok(ssl_acceptor)
}

/// Configures and starts the web server with appropriate SSL settings
async fn configure_and_run_server(sqlite_repo: repo::sqlite::SqlxSqliteRepo) -> anyhow::Result<()> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let server_addr = (
        "0.0.0.0",
        u16::try_from(app_config.web_server_port).unwrap_or(443),
    );

    let server = web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(server::AppState {
                repo: Box::new(sqlite_repo.clone()),
            })
            .configure(webhook::routes::whatsapp)
            .service(server::serve_health)
            .default_service(web::route().to(server::serve_not_found))
    });

    let bound_server = if app_config.is_prod() {
        let ssl_acceptor = setup_ssl_acceptor()?;
        server.bind_openssl(server_addr, ssl_acceptor)?
    } else {
        server.bind(server_addr)?
    };

    bound_server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
