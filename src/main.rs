//! Usersync service entry point.
//!
//! Boots the HTTP server, connects the user store, and wires the
//! monitoring sink. Coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use usersync_api::{AppState, Config, Monitor, WebhookVerifier};
use usersync_core::{PgUserStore, RealClock};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting usersync service");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        "Configuration loaded"
    );

    // The monitoring sink comes up before anything that can fail, so
    // startup and request errors alike have somewhere to go.
    let monitor = match config.monitor_url.as_deref() {
        Some(url) => Monitor::new(url).context("Failed to initialize monitoring sink")?,
        None => Monitor::disabled(),
    };
    if !monitor.is_enabled() {
        info!("Monitoring sink disabled (MONITOR_URL not set)");
    }

    let pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&pool).await?;
    info!("Database migrations completed");

    let clock = Arc::new(RealClock::new());
    let verifier =
        WebhookVerifier::new(&config.webhook_secret, config.webhook_tolerance(), clock.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook secret: {e}"))?;

    let store = Arc::new(PgUserStore::new(pool.clone(), config.store_timeout()));

    let state = AppState { store, verifier, monitor, clock };

    let addr = config.parse_server_addr()?;
    let request_timeout = config.request_timeout();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = usersync_api::start_server(state, addr, request_timeout).await {
            error!(error = %e, "Server failed");
        }
    });

    info!(%addr, "Usersync is ready to receive webhooks");

    shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown");

    // Give in-flight requests time to complete
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(30)) => {
            info!("Shutdown grace period expired");
        }
        _ = server_handle => {
            info!("Server stopped");
        }
    }

    pool.close().await;
    info!("Database connections closed");

    info!("Usersync shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,usersync=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    let mut retries = 0;
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                // Verify connection works
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Runs database migrations.
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            image TEXT NOT NULL DEFAULT '',
            resume TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
