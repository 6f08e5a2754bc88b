//! Gateway error types
//!
//! This module provides detailed error types for startup and request
//! handling, making it easier to diagnose different failure scenarios.
//! Not-found and access-denied conditions are NOT errors anywhere in this
//! crate; they are normal negative results.

use std::fmt;

/// Errors that can occur while starting or running the gateway
#[derive(Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The configured address is already in use
    AddrInUse { address: String, port: u16 },

    /// The configured address is not available on this host
    AddrNotAvailable { address: String, port: u16 },

    /// The configured address could not be resolved
    Resolution {
        address: String,
        port: u16,
        source: std::io::Error,
    },

    /// Any other listener setup failure
    Bind {
        address: String,
        port: u16,
        source: std::io::Error,
    },

    /// TLS key or certificate file could not be read
    CertificateRead { path: String, source: std::io::Error },

    /// TLS key or certificate material could not be parsed
    CertificateParse { path: String, detail: String },

    /// Index store failure while serving a command
    Store {
        operation: &'static str,
        source: anyhow::Error,
    },

    /// Article rendering failed for a registered content type
    Render {
        content_type: String,
        source: anyhow::Error,
    },

    /// I/O error on a client connection
    Io(std::io::Error),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddrInUse { address, port } => {
                write!(
                    f,
                    "Can't bind to <{}> with port <{}>: Address in use...",
                    address, port
                )
            }
            Self::AddrNotAvailable { address, port } => {
                write!(
                    f,
                    "Can't bind to <{}> with port <{}>: Address is not available...",
                    address, port
                )
            }
            Self::Resolution { address, port, source } => {
                write!(
                    f,
                    "Can't bind to <{}> with port <{}>: Failed to resolve IP address ({})",
                    address, port, source
                )
            }
            Self::Bind { address, port, source } => {
                write!(
                    f,
                    "Can't bind to <{}> with port <{}>: {}",
                    address, port, source
                )
            }
            Self::CertificateRead { path, source } => {
                write!(f, "Can't read TLS file {}: {}", path, source)
            }
            Self::CertificateParse { path, detail } => {
                write!(f, "Can't parse TLS material from {}: {}", path, detail)
            }
            Self::Store { operation, source } => {
                write!(f, "Index store failure during {}: {}", operation, source)
            }
            Self::Render { content_type, source } => {
                write!(f, "Render failure for content type '{}': {}", content_type, source)
            }
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resolution { source, .. } => Some(source),
            Self::Bind { source, .. } => Some(source),
            Self::CertificateRead { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl GatewayError {
    /// Classify a listener setup failure into a descriptive bind error
    #[must_use]
    pub fn classify_bind(address: &str, port: u16, err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::AddrInUse => Self::AddrInUse {
                address: address.to_string(),
                port,
            },
            ErrorKind::AddrNotAvailable => Self::AddrNotAvailable {
                address: address.to_string(),
                port,
            },
            ErrorKind::NotFound => Self::Resolution {
                address: address.to_string(),
                port,
                source: err,
            },
            _ => Self::Bind {
                address: address.to_string(),
                port,
                source: err,
            },
        }
    }

    /// Check if this error is fatal to binding startup
    #[must_use]
    pub const fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Self::AddrInUse { .. }
                | Self::AddrNotAvailable { .. }
                | Self::Resolution { .. }
                | Self::Bind { .. }
        )
    }

    /// Check if this is a client disconnection (broken pipe)
    #[must_use]
    pub fn is_client_disconnect(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }

    /// Get the appropriate log level for this error
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        match self {
            Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe => tracing::Level::DEBUG,
            Self::Io(_) => tracing::Level::WARN,
            Self::CertificateRead { .. } | Self::CertificateParse { .. } => tracing::Level::ERROR,
            Self::Store { .. } | Self::Render { .. } => tracing::Level::ERROR,
            _ => tracing::Level::ERROR,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
