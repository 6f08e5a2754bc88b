//! Listener worker pool
//!
//! Horizontal scaling across cores: each worker is an independent OS
//! thread running its own single-threaded tokio runtime and its own
//! accept loop. Workers share the listen port through `SO_REUSEPORT`, so
//! the kernel spreads incoming connections across them; there is no
//! shared mutable state between workers beyond the store handle and the
//! pool-management channels.
//!
//! Per worker the lifecycle is spawned -> online -> running -> exited;
//! the pool reports spawn/online/error/exit events and leaves any restart
//! policy to its owner.

use crate::adapter::Adapter;
use crate::service::engine::CommandEngine;
use crate::service::tls::TlsContext;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Worker lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Worker thread started
    Spawned(usize),
    /// Worker is listening and serving
    Online(usize),
    /// Worker hit a non-fatal or fatal problem
    Error(usize, String),
    /// Worker finished (drained and stopped)
    Exited(usize),
}

/// Bind a listener socket, optionally sharing the port
///
/// `SO_REUSEADDR` is always set for quick restarts; `SO_REUSEPORT` only
/// when several workers share one binding.
pub(crate) fn bind_listener(
    addr: SocketAddr,
    reuse_port: bool,
) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if reuse_port {
        socket.set_reuse_port(true)?;
    }

    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// One binding's accept loop; shared by pooled workers and
/// single-process mode
pub(crate) async fn accept_loop(
    id: usize,
    listener: tokio::net::TcpListener,
    adapter: Arc<Adapter>,
    tls: Option<Arc<TlsContext>>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut reload_rx: watch::Receiver<u64>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let engine = Arc::new(CommandEngine::new(adapter));
    let mut sessions: JoinSet<()> = JoinSet::new();

    let _ = events.send(WorkerEvent::Online(id));

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            changed = reload_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // Graceful reload: let in-flight sessions finish, then
                // resume accepting
                info!(worker = id, "reload: draining sessions");
                while sessions.join_next().await.is_some() {}
                info!(worker = id, "reload complete");
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(worker = id, peer = %peer, "connection accepted");
                        let engine = Arc::clone(&engine);
                        let tls = tls.clone();
                        sessions.spawn(async move {
                            serve_connection(engine, tls, stream, peer).await;
                        });
                    }
                    Err(e) => {
                        let _ = events.send(WorkerEvent::Error(id, e.to_string()));
                    }
                }
            }
        }
    }

    // Graceful shutdown: stop accepting, let in-flight sessions finish
    drop(listener);
    while sessions.join_next().await.is_some() {}
}

async fn serve_connection(
    engine: Arc<CommandEngine>,
    tls: Option<Arc<TlsContext>>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
) {
    let served = match tls {
        Some(ctx) => match ctx.acceptor().accept(stream).await {
            Ok(tls_stream) => engine.serve(tls_stream).await,
            Err(e) => {
                warn!(peer = %peer, error = %e, "TLS handshake failed");
                return;
            }
        },
        None => engine.serve(stream).await,
    };

    if let Err(e) = served {
        warn!(peer = %peer, error = %e, "session ended with error");
    }
}

/// A pool of accept-loop workers for one binding
pub struct WorkerPool {
    label: String,
    threads: Vec<std::thread::JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    reload_tx: watch::Sender<u64>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("label", &self.label)
            .field("workers", &self.threads.len())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `workers` threads for a binding
    ///
    /// The pre-bound listener goes to worker 0; the remaining workers
    /// bind their own `SO_REUSEPORT` listeners to the same address. A
    /// worker that fails to set up reports an error event and exits;
    /// whether it is replaced is the owner's call.
    pub fn spawn(
        label: &str,
        listener: std::net::TcpListener,
        addr: SocketAddr,
        workers: usize,
        adapter: Arc<Adapter>,
        tls: Option<Arc<TlsContext>>,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (reload_tx, _) = watch::channel(0u64);

        let mut threads = Vec::with_capacity(workers);
        let mut first_listener = Some(listener);

        for id in 0..workers {
            let listener = first_listener.take();
            let adapter = Arc::clone(&adapter);
            let tls = tls.clone();
            let events = events.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            let reload_rx = reload_tx.subscribe();
            let thread_label = format!("{}-worker-{}", label, id);

            let handle = std::thread::Builder::new()
                .name(thread_label.clone())
                .spawn(move || {
                    worker_main(id, listener, addr, adapter, tls, events, shutdown_rx, reload_rx);
                });

            match handle {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    error!(worker = thread_label, error = %e, "failed to spawn worker thread");
                }
            }
        }

        Self {
            label: label.to_string(),
            threads,
            shutdown_tx,
            reload_tx,
        }
    }

    /// Number of live worker threads
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.threads.len()
    }

    /// Signal a graceful reload to every worker
    pub fn reload(&self) {
        self.reload_tx.send_modify(|generation| *generation += 1);
    }

    /// Signal a graceful shutdown and wait for every worker to drain
    ///
    /// Blocking: joins the worker threads. Call from a blocking context.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.threads {
            if handle.join().is_err() {
                error!(pool = %self.label, "worker thread panicked during shutdown");
            }
        }
        info!(pool = %self.label, "worker pool stopped");
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_main(
    id: usize,
    listener: Option<std::net::TcpListener>,
    addr: SocketAddr,
    adapter: Arc<Adapter>,
    tls: Option<Arc<TlsContext>>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    shutdown_rx: watch::Receiver<bool>,
    reload_rx: watch::Receiver<u64>,
) {
    let _ = events.send(WorkerEvent::Spawned(id));

    // Workers after the first bind their own shared-port listener
    let listener = match listener {
        Some(listener) => Ok(listener),
        None => bind_listener(addr, true),
    };
    let listener = match listener {
        Ok(listener) => listener,
        Err(e) => {
            let _ = events.send(WorkerEvent::Error(id, e.to_string()));
            let _ = events.send(WorkerEvent::Exited(id));
            return;
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = events.send(WorkerEvent::Error(id, e.to_string()));
            let _ = events.send(WorkerEvent::Exited(id));
            return;
        }
    };

    runtime.block_on(async {
        match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => {
                accept_loop(id, listener, adapter, tls, shutdown_rx, reload_rx, events.clone())
                    .await;
            }
            Err(e) => {
                let _ = events.send(WorkerEvent::Error(id, e.to_string()));
            }
        }
    });

    let _ = events.send(WorkerEvent::Exited(id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_listener_plain() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = bind_listener(addr, false).unwrap();
        assert_eq!(listener.local_addr().unwrap().ip(), addr.ip());
    }

    #[cfg(unix)]
    #[test]
    fn test_bind_listener_shared_port() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = bind_listener(addr, true).unwrap();
        let bound = first.local_addr().unwrap();

        // Same port binds again with SO_REUSEPORT, refuses without
        assert!(bind_listener(bound, true).is_ok());
        assert!(bind_listener(bound, false).is_err());
    }

    #[test]
    fn test_bind_listener_rejects_taken_port() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = bind_listener(addr, false).unwrap();
        let bound = first.local_addr().unwrap();

        let err = bind_listener(bound, false).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AddrInUse);
    }
}
