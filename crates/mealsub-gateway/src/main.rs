use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use mealsub_core::config::MealsubConfig;
use mealsub_gateway::app;
use mealsub_scheduler::SchedulerHandle;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mealsub-gateway", about = "Meal subscription scheduling service")]
struct Cli {
    /// Config file (defaults to ~/.mealsub/mealsub.toml)
    #[arg(long, env = "MEALSUB_CONFIG")]
    config: Option<String>,

    /// Listen port, overrides the config value
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mealsub_gateway=info,mealsub_scheduler=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = MealsubConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        MealsubConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // runs all schema migrations (idempotent)
    let scheduler = SchedulerHandle::new(db, config.policy)?;
    info!("database migrations complete");

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(
        config,
        scheduler,
        Arc::new(mockable::DefaultClock),
    ));
    let router = app::build_router(state);

    info!("mealsub gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
