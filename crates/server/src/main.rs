use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinevibes_core::{
    load_config, load_config_from_env, schema, validate_config, AvatarStorage, Config, Database,
    LocalAvatarStorage, Mailer, MetadataProvider, OmdbClient, SmtpMailer, SupabaseStorage,
    UnconfiguredProvider,
};
use cinevibes_server::api::create_router;
use cinevibes_server::metrics::REGISTRY;
use cinevibes_server::state::AppState;

/// Default config file, read only when present.
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env is fine
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {:?}", path);
    }

    let config = load_configuration()?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");

    // Database
    let db = Database::from_config(&config.database);
    info!("Database backend: {}", db.backend().as_str());
    schema::bootstrap(&db)
        .await
        .context("Failed to bootstrap database schema")?;

    // Metadata provider
    let metadata: Arc<dyn MetadataProvider> = match OmdbClient::new(&config.metadata) {
        Ok(client) => {
            info!("Using OMDb metadata provider");
            Arc::new(client)
        }
        Err(e) => {
            warn!("Metadata provider disabled: {}", e);
            Arc::new(UnconfiguredProvider)
        }
    };

    // Outbound mail
    let mailer: Option<Arc<dyn Mailer>> = match &config.mail {
        Some(mail_config) => {
            info!(
                "Using SMTP relay {}:{}",
                mail_config.smtp_host, mail_config.smtp_port
            );
            Some(Arc::new(
                SmtpMailer::new(mail_config).context("Failed to create SMTP mailer")?,
            ))
        }
        None => {
            warn!("Mail not configured, emails will not be sent");
            None
        }
    };

    // Avatar storage
    let avatars: Arc<dyn AvatarStorage> = match &config.storage {
        Some(storage_config) if storage_config.is_complete() => {
            info!("Storing avatars in bucket {}", storage_config.bucket);
            Arc::new(
                SupabaseStorage::new(storage_config)
                    .context("Failed to create object storage client")?,
            )
        }
        _ => {
            let local = LocalAvatarStorage::new(&config.uploads.dir);
            info!("Storing avatars in {:?}", local.dir());
            Arc::new(local)
        }
    };

    // Register metrics before the first request
    once_cell::sync::Lazy::force(&REGISTRY);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(
        AppState::new(config, db, metadata, mailer, avatars)
            .context("Failed to create session layer")?,
    );
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Read `CINEVIBES_CONFIG` (must exist), else `config.toml` when present,
/// else defaults plus environment.
fn load_configuration() -> Result<Config> {
    match std::env::var("CINEVIBES_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
        }
        Err(_) => {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if path.exists() {
                info!("Loading configuration from {:?}", path);
                load_config(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))
            } else {
                info!("No config file, using defaults and environment");
                load_config_from_env().context("Failed to load config from environment")
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
