//! Bracket engine HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use bracket_engine::db::Database;
use bracket_engine::store::{InMemoryStore, PgBracketStore};
use bracket_engine::BracketManager;
use bracket_server::api::{self, AppState};
use bracket_server::config::{ServerConfig, StorageBackend};
use bracket_server::logging;
use bracket_server::seed::SeedFile;
use pico_args::Arguments;
use std::path::PathBuf;
use tracing::{info, warn};

const HELP: &str = "\
Run the single-elimination bracket server

USAGE:
  bracket_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --storage    BACKEND     postgres or memory          [default: env STORAGE or postgres]
  --seed       FILE        JSON tournament fixture for the memory backend [default: env SEED_FILE]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  STORAGE                  Storage backend (postgres, memory)
  SEED_FILE                Tournament fixture loaded with STORAGE=memory
  DATABASE_URL             PostgreSQL connection string
  PROPAGATION_RETRIES      Retries after a transient propagation failure
  PROPAGATION_BACKOFF_MS   Base backoff between propagation retries
  NEXT_ROUND_DELAY_HOURS   Offset from a match's end to the next round's start
  RUST_LOG                 Log filter (default: info,sqlx=warn)
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let storage: Option<StorageBackend> = pargs.opt_value_from_str("--storage")?;
    let seed: Option<PathBuf> = pargs.opt_value_from_str("--seed")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url, storage, seed)?;
    config.validate()?;

    info!(
        "Starting bracket server at {} with {} storage",
        config.bind, config.storage
    );

    let (manager, db) = match config.storage {
        StorageBackend::Postgres => {
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            info!("Database connected and migrated");

            let store = Arc::new(PgBracketStore::new(db.pool().clone()));
            (BracketManager::from_store(store, config.engine.clone()), Some(db))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; tournaments and results are lost on exit");
            let store = Arc::new(InMemoryStore::new());
            match &config.seed_file {
                Some(path) => {
                    let seeded = SeedFile::load(path)
                        .context("Failed to load seed file")?
                        .apply(&store);
                    info!("Seeded {seeded} tournament(s) from {}", path.display());
                }
                None => warn!("No seed file given; memory storage starts without tournaments"),
            }
            (BracketManager::from_store(store, config.engine.clone()), None)
        }
    };

    let state = AppState {
        manager: Arc::new(manager),
        db: db.clone(),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    if let Some(db) = db {
        db.close().await;
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
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
