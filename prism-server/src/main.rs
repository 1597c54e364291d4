use std::sync::Arc;

use clap::Parser;
use prism_core::config::StorageBackend;
use prism_core::{MemoryStore, PgStore, PrismConfig, Store};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use prism_server::server;
use prism_server::subsystems::preferences;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "prism.toml")]
    config: String,

    /// Check storage connectivity and exit
    #[arg(long)]
    health: bool,

    /// Rebuild preference patterns from the feedback log and exit
    #[arg(long)]
    replay: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match PrismConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let store: Arc<dyn Store> = match config.database.backend {
        StorageBackend::Postgres => match PgStore::connect(&config.database).await {
            Ok(s) => Arc::new(s),
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        },
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; feedback and preferences are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if args.health {
        match store.health_check().await {
            Ok(v) => println!("✅ Storage connected: {}", v),
            Err(e) => {
                println!("❌ Storage check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Prism health check passed");
        return Ok(());
    }

    if args.replay {
        let report = preferences::replay(store.as_ref(), &config).await?;
        println!(
            "✅ Replayed {} events ({} skipped), {} pattern updates",
            report.events_replayed, report.events_skipped, report.patterns_updated
        );
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.http.enabled {
        let http_store = store.clone();
        let http_config = config.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) =
                prism_server::http::start_http_server(http_store, http_config, http_shutdown).await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, store, config, tx.subscribe()).await?;

    Ok(())
}
