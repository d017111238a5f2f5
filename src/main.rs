use anyhow::Result;
use churnguard::api::HttpServer;
use churnguard::db::{migrate, Db};
use churnguard::email::build_transport;
use churnguard::Config;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    log::info!("Starting ChurnGuard API v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());

    // Initialize database
    let db = Db::new(config.db_path());

    // Run migrations
    let migrations_dir = config.migrations_dir().to_path_buf();
    db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
        .await?;

    log::info!("Database initialized successfully");

    // Outbound mail transport (HTTP provider, or log-only when disabled)
    let mailer = Arc::from(build_transport(&config.email)?);

    // Serve the API
    let server = HttpServer::new(&config, db, mailer)?;
    server.run().await?;

    Ok(())
}
