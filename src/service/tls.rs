//! Server TLS context with hot reload
//!
//! Key and certificate are loaded once at startup and cached in an
//! acceptor; the source files are polled for modification-time changes
//! and the acceptor is swapped in place when they change. Existing
//! connections keep the handshake context they started with. A read or
//! parse failure during reload logs and keeps the previous context
//! serving.

use crate::error::GatewayError;
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

/// How often the key/cert files are polled for changes
const WATCH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Shared, swappable server TLS context
pub struct TlsContext {
    key_path: PathBuf,
    cert_path: PathBuf,
    acceptor: RwLock<TlsAcceptor>,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("key_path", &self.key_path)
            .field("cert_path", &self.cert_path)
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Load key and certificate files and build the initial acceptor
    pub fn load(key_path: &str, cert_path: &str) -> Result<Arc<Self>, GatewayError> {
        let acceptor = build_acceptor(Path::new(key_path), Path::new(cert_path))?;
        Ok(Arc::new(Self {
            key_path: PathBuf::from(key_path),
            cert_path: PathBuf::from(cert_path),
            acceptor: RwLock::new(acceptor),
        }))
    }

    /// The currently active acceptor
    ///
    /// Cloning is cheap (Arc internally); a connection keeps using the
    /// acceptor it grabbed even if a reload swaps the context afterwards.
    #[must_use]
    pub fn acceptor(&self) -> TlsAcceptor {
        match self.acceptor.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-read the files and swap the active context
    ///
    /// On failure the previous context stays active and the error is
    /// returned for the caller to log.
    pub fn reload(&self) -> Result<(), GatewayError> {
        let acceptor = build_acceptor(&self.key_path, &self.cert_path)?;
        match self.acceptor.write() {
            Ok(mut guard) => *guard = acceptor,
            Err(poisoned) => *poisoned.into_inner() = acceptor,
        }
        info!(
            key = %self.key_path.display(),
            cert = %self.cert_path.display(),
            "TLS context reloaded"
        );
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, GatewayError> {
    std::fs::read(path).map_err(|source| GatewayError::CertificateRead {
        path: path.display().to_string(),
        source,
    })
}

fn build_acceptor(key_path: &Path, cert_path: &Path) -> Result<TlsAcceptor, GatewayError> {
    let cert_data = read_file(cert_path)?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_data.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::CertificateParse {
            path: cert_path.display().to_string(),
            detail: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(GatewayError::CertificateParse {
            path: cert_path.display().to_string(),
            detail: "no certificates found".to_string(),
        });
    }

    let key_data = read_file(key_path)?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_data.as_slice())
        .map_err(|e| GatewayError::CertificateParse {
            path: key_path.display().to_string(),
            detail: e.to_string(),
        })?
        .ok_or_else(|| GatewayError::CertificateParse {
            path: key_path.display().to_string(),
            detail: "no private key found".to_string(),
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| GatewayError::CertificateParse {
            path: cert_path.display().to_string(),
            detail: e.to_string(),
        })?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watch the key/cert files and reload the context when either changes
///
/// Polls modification times once a second; runs until the shutdown
/// signal flips.
pub fn spawn_cert_watcher(
    ctx: Arc<TlsContext>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(WATCH_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut last = (modified_at(&ctx.key_path), modified_at(&ctx.cert_path));

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender means the manager is gone; stop too
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = interval.tick() => {}
            }

            let current = (modified_at(&ctx.key_path), modified_at(&ctx.cert_path));
            if current == last {
                continue;
            }
            last = current;

            info!("Reloading NNTP certificates");
            if let Err(e) = ctx.reload() {
                // Keep serving with the previous context
                error!(error = %e, "certificate reload failed, keeping previous context");
            }
        }
    })
}

/// Load a TLS context for a binding, treating failure as a skippable
/// configuration problem rather than a fatal startup error
pub fn load_for_binding(key: &str, cert: &str) -> Option<Arc<TlsContext>> {
    match TlsContext::load(key, cert) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            warn!(error = %e, "SSL binding skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_files_are_read_errors() {
        let err = TlsContext::load("/nonexistent/server.key", "/nonexistent/server.crt")
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::CertificateRead { .. }));
    }

    #[test]
    fn test_garbage_pem_is_a_parse_error() {
        let mut cert = NamedTempFile::new().unwrap();
        write!(cert, "not a certificate at all").unwrap();
        let mut key = NamedTempFile::new().unwrap();
        write!(key, "not a key either").unwrap();

        let err = TlsContext::load(
            key.path().to_str().unwrap(),
            cert.path().to_str().unwrap(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GatewayError::CertificateParse { .. }));
    }

    #[test]
    fn test_load_for_binding_swallows_failures() {
        assert!(load_for_binding("/nonexistent/k", "/nonexistent/c").is_none());
    }
}
