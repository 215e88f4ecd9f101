//! Account Portal
//!
//! Server-rendered account management over HTTP.
//! Reads configuration from a TOML file (~/.config/account-portal/config.toml).

use account_portal::application::identity::bootstrap_admin;
use account_portal::infrastructure::database::migrator::Migrator;
use account_portal::infrastructure::storage::AvatarStore;
use account_portal::interfaces::http::middleware::CookieSettings;
use account_portal::support::shutdown::ShutdownCoordinator;
use account_portal::{create_router, init_database, resolve_config_path, AppConfig, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = resolve_config_path();
    let (app_cfg, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_logging(&app_cfg.logging.level, app_cfg.logging.json);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => warn!("Failed to load config: {}. Using defaults.", e),
    }

    info!("Starting Account Portal...");

    // ── Prometheus recorder (before any metrics calls) ─────────
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    info!("Prometheus metrics recorder installed");

    // ── Database ───────────────────────────────────────────────
    let db = match init_database(&app_cfg.database_config()).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e.into());
        }
    };

    info!("Running database migrations...");
    if let Err(e) = Migrator::up(&db, None).await {
        error!("Failed to run migrations: {}", e);
        return Err(e.into());
    }
    info!("Migrations completed");

    // ── Avatar storage ─────────────────────────────────────────
    let avatars = AvatarStore::new(app_cfg.avatar_store_config());
    tokio::fs::create_dir_all(&avatars.config().directory).await?;
    info!(
        directory = %avatars.config().directory.display(),
        max_bytes = avatars.max_bytes(),
        "Avatar storage ready"
    );

    let state = AppState::new(
        db.clone(),
        app_cfg.jwt_config(),
        avatars,
        app_cfg.security.bcrypt_cost,
        CookieSettings {
            secure: app_cfg.security.secure_cookies,
        },
        prometheus_handle,
    )?;

    // Create default admin user if the table is empty
    match bootstrap_admin(state.users.as_ref(), &app_cfg.admin, app_cfg.security.bcrypt_cost).await {
        Ok(Some(id)) => {
            info!(user_id = id, "Default admin created: {}", app_cfg.admin.email);
            warn!("Please change the admin password immediately!");
        }
        Ok(None) => {}
        Err(e) => error!("Failed to create admin user: {}", e),
    }

    // ── HTTP server with graceful shutdown ─────────────────────
    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    shutdown.start_signal_listener();
    let server_shutdown = shutdown.signal();
    let server_stopped = shutdown.signal();

    let router = create_router(state);
    let addr = app_cfg.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Account Portal listening on http://{}", addr);

    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                server_shutdown.wait().await;
                info!("HTTP server received shutdown signal");
            })
            .await;
        // Lets the coordinator proceed when the server exits on its own.
        server_stopped.trigger();
        result
    });

    let drained = shutdown
        .shutdown_with_cleanup(move || async move {
            match server.await {
                Ok(Ok(())) => info!("HTTP server stopped"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("HTTP server task panicked: {}", e),
            }
        })
        .await;
    if !drained {
        warn!("In-flight requests did not finish before the shutdown timeout");
    }

    if let Err(e) = db.close().await {
        warn!("Error closing database connection: {}", e);
    } else {
        info!("Database connection closed");
    }

    info!("Account Portal shutdown complete");
    Ok(())
}
