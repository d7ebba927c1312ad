use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempmail_core::{AppConfig, ProviderClientFactory};
use tempmail_server::http_server::{self, AppState};
use tempmail_server::identity::ForwardedIdentityResolver;
use tempmail_server::mailbox::MailboxCache;
use tempmail_server::session::{spawn_sweeper, InMemorySessionStore, SessionStore, SessionStoreRef};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tempmail-daemon", about = "HTTP proxy for disposable tempmail.so mailboxes")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Provider base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Parse command line args
    let args = Args::parse();

    // Load config from file or use defaults
    let config_result = match &args.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_from_default(),
    };
    let mut config = match config_result {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    // Update config from CLI args
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen.to_string();
    }
    if let Some(base_url) = args.base_url {
        config.provider.base_url = base_url;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = Some(log_level);
    }

    // Initialize logging
    let level = config
        .log_level
        .as_deref()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    info!("Starting tempmail daemon");

    let addr: SocketAddr = config.server.listen_addr.parse().map_err(|e| {
        error!(addr = %config.server.listen_addr, "Invalid listen address");
        anyhow::anyhow!("Invalid listen address {}: {}", config.server.listen_addr, e)
    })?;

    let factory = Arc::new(ProviderClientFactory::new(config.provider.clone()));
    let store: SessionStoreRef = Arc::new(InMemorySessionStore::new(factory));
    let sweeper = spawn_sweeper(
        store.clone(),
        config.sessions.sweep_interval(),
        config.sessions.ttl(),
    );

    let state = AppState::new(
        store.clone(),
        MailboxCache::from_config(&config),
        Arc::new(ForwardedIdentityResolver),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let result = http_server::run_server(state, addr, shutdown).await;
    if let Err(e) = &result {
        error!(error = %e, "HTTP server failed");
    }

    // Teardown
    sweeper.shutdown();
    match store.clear().await {
        Ok(count) => info!(count, "Dropped sessions"),
        Err(e) => warn!(error = %e, "Failed to clear session store"),
    }

    info!("Tempmail daemon shutting down");
    result
}
