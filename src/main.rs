use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use nntp_gateway::adapter::Adapter;
use nntp_gateway::config::{create_default_config, load_config};
use nntp_gateway::extension::ExtensionRegistry;
use nntp_gateway::identity::MemoryIdentityProvider;
use nntp_gateway::index::MemoryStore;
use nntp_gateway::jobs::{RetentionJob, spawn_retention};
use nntp_gateway::service::ServiceManager;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "gateway.toml")]
    config: String,

    /// Default locale for rendered article bodies
    #[arg(long, default_value = "en-US")]
    locale: String,
}

fn main() -> Result<()> {
    nntp_gateway::logging::init_dual_logging();

    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_gateway(args))
}

async fn run_gateway(args: Args) -> Result<()> {
    // Load configuration, creating a default file on first run
    let config = if std::path::Path::new(&args.config).exists() {
        match load_config(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load config file '{}': {}", args.config, e);
                return Err(e);
            }
        }
    } else {
        warn!("Config file '{}' not found, creating default config", args.config);
        let default_config = create_default_config();
        let config_toml = toml::to_string_pretty(&default_config)?;
        std::fs::write(&args.config, &config_toml)?;
        info!("Created default config file: {}", args.config);
        default_config
    };

    info!(
        "Gateway hostname '{}', listening on {}",
        config.hostname, config.listen
    );

    // Dependency-ordered startup: store, extensions, identity, adapter,
    // retention, listeners. Content-type extensions are registered here;
    // a standalone build ships none, so every group denies until the
    // embedding platform plugs its types in.
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(ExtensionRegistry::new());
    let identity = Arc::new(MemoryIdentityProvider::new());

    let adapter = Arc::new(Adapter::new(
        store.clone(),
        registry.clone(),
        identity,
        config.hostname.clone(),
        args.locale,
    ));

    let retention = spawn_retention(RetentionJob::new(store, config.retention.clone()));

    let manager = ServiceManager::start(&config, adapter).await?;

    // SIGHUP reloads, ctrl-c / SIGTERM shut down gracefully
    wait_for_shutdown(&manager).await;

    manager.shutdown().await;
    retention.abort();
    info!("Graceful shutdown complete");
    Ok(())
}

/// Block until a termination signal arrives, servicing reloads meanwhile
async fn wait_for_shutdown(manager: &ServiceManager) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler");
        let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect("failed to install signal handler");

        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => return,
                _ = terminate.recv() => return,
                _ = hangup.recv() => manager.reload(),
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
