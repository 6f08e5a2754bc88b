//! Listener lifecycle management
//!
//! The [`ServiceManager`] owns every listener the gateway runs: it
//! extracts bindings from the configuration, brings them up in order
//! (the first bind failure aborts the remaining ones), fans each binding
//! out to a worker pool or a single in-process accept loop, watches TLS
//! material for hot reload, and propagates graceful shutdown and reload.

mod engine;
mod tls;
mod worker;

pub use engine::CommandEngine;
pub use tls::{TlsContext, spawn_cert_watcher};
pub use worker::{WorkerEvent, WorkerPool};

use crate::adapter::Adapter;
use crate::config::{Config, SslConfig};
use crate::error::GatewayError;
use anyhow::Result;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// One listener to establish: address, port, optional TLS files
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSpec {
    pub address: String,
    pub port: u16,
    pub ssl: Option<SslConfig>,
}

/// Collect the configured bindings, plain listener first
///
/// If the SSL binding names the same address:port as the plain one, the
/// plain binding wins and the SSL one is dropped.
pub fn extract_bindings(config: &Config) -> Result<Vec<BindingSpec>> {
    let mut result = Vec::new();

    let (address, port) = Config::split_binding(&config.listen)?;
    result.push(BindingSpec {
        address,
        port,
        ssl: None,
    });

    if let Some(ssl) = &config.ssl {
        if ssl.listen != config.listen {
            let (address, port) = Config::split_binding(&ssl.listen)?;
            result.push(BindingSpec {
                address,
                port,
                ssl: Some(ssl.clone()),
            });
        }
    }

    Ok(result)
}

fn resolve_binding(spec: &BindingSpec) -> Result<SocketAddr, GatewayError> {
    let mut addrs = (spec.address.as_str(), spec.port)
        .to_socket_addrs()
        .map_err(|source| GatewayError::Resolution {
            address: spec.address.clone(),
            port: spec.port,
            source,
        })?;

    addrs.next().ok_or_else(|| GatewayError::Resolution {
        address: spec.address.clone(),
        port: spec.port,
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
    })
}

/// Owns all running listeners and their workers
pub struct ServiceManager {
    pools: Vec<WorkerPool>,
    inline_loops: Vec<tokio::task::JoinHandle<()>>,
    watchers: Vec<tokio::task::JoinHandle<()>>,
    event_logger: tokio::task::JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    reload_tx: watch::Sender<u64>,
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("pools", &self.pools)
            .field("inline_loops", &self.inline_loops.len())
            .finish_non_exhaustive()
    }
}

impl ServiceManager {
    /// Bring up every configured binding, in order
    ///
    /// A bind failure (address in use, address unavailable, resolution
    /// failure) aborts startup of this and all remaining bindings. An
    /// unreadable or unparseable TLS file only skips its own binding.
    pub async fn start(config: &Config, adapter: Arc<Adapter>) -> Result<Self> {
        let workers = config.fork.resolve();
        let bindings = extract_bindings(config)?;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<WorkerEvent>();
        let event_logger = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    WorkerEvent::Spawned(id) => info!("Worker {} spawned", id),
                    WorkerEvent::Online(id) => info!("Worker {} is running", id),
                    WorkerEvent::Error(id, message) => error!("Worker {} error: {}", id, message),
                    WorkerEvent::Exited(id) => info!("Worker {} exited", id),
                }
            }
        });

        let (shutdown_tx, _) = watch::channel(false);
        let (reload_tx, _) = watch::channel(0u64);

        let mut manager = Self {
            pools: Vec::new(),
            inline_loops: Vec::new(),
            watchers: Vec::new(),
            event_logger,
            shutdown_tx,
            reload_tx,
        };

        for spec in &bindings {
            let tls_ctx = match &spec.ssl {
                Some(ssl) => {
                    // Config errors on TLS material skip this binding but
                    // do not abort the others
                    let Some(ctx) = tls::load_for_binding(&ssl.key, &ssl.cert) else {
                        continue;
                    };
                    Some(ctx)
                }
                None => None,
            };

            let addr = resolve_binding(spec)?;
            let listener = worker::bind_listener(addr, workers > 1)
                .map_err(|e| GatewayError::classify_bind(&spec.address, spec.port, e))?;

            info!(
                "Listening on {}:{} NNTP {}",
                spec.address,
                spec.port,
                if tls_ctx.is_some() { "SSL" } else { "NON-SSL" }
            );

            if workers >= 1 {
                let pool = WorkerPool::spawn(
                    &format!("nntp-{}", spec.port),
                    listener,
                    addr,
                    workers,
                    Arc::clone(&adapter),
                    tls_ctx.clone(),
                    events_tx.clone(),
                );
                manager.pools.push(pool);
            } else {
                // Single-process mode: serve on the shared runtime
                let listener = tokio::net::TcpListener::from_std(listener)
                    .map_err(|e| GatewayError::classify_bind(&spec.address, spec.port, e))?;
                let adapter = Arc::clone(&adapter);
                let tls_for_loop = tls_ctx.clone();
                let shutdown_rx = manager.shutdown_tx.subscribe();
                let reload_rx = manager.reload_tx.subscribe();
                let events = events_tx.clone();
                manager.inline_loops.push(tokio::spawn(async move {
                    worker::accept_loop(
                        0,
                        listener,
                        adapter,
                        tls_for_loop,
                        shutdown_rx,
                        reload_rx,
                        events,
                    )
                    .await;
                }));
            }

            if let Some(ctx) = tls_ctx {
                manager
                    .watchers
                    .push(spawn_cert_watcher(ctx, manager.shutdown_tx.subscribe()));
            }
        }

        if manager.pools.is_empty() && manager.inline_loops.is_empty() {
            warn!("no listeners established");
        }

        Ok(manager)
    }

    /// Propagate a graceful reload to every pool and inline loop
    pub fn reload(&self) {
        info!("reload signal received");
        for pool in &self.pools {
            pool.reload();
        }
        self.reload_tx.send_modify(|generation| *generation += 1);
    }

    /// Graceful shutdown: stop accepting everywhere, drain in-flight
    /// sessions, stop the watchers
    pub async fn shutdown(self) {
        info!("shutting down listeners");
        let _ = self.shutdown_tx.send(true);

        for handle in self.inline_loops {
            if handle.await.is_err() {
                error!("inline accept loop panicked during shutdown");
            }
        }

        for pool in self.pools {
            let joined = tokio::task::spawn_blocking(move || pool.shutdown()).await;
            if joined.is_err() {
                error!("worker pool join failed during shutdown");
            }
        }

        for watcher in self.watchers {
            watcher.abort();
        }
        self.event_logger.abort();

        info!("shutdown complete");
    }
}
