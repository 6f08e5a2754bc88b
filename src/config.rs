//! Gateway configuration
//!
//! TOML-backed configuration for listeners, TLS material, worker forking
//! and the retention job. Defaults are provided as free functions so serde
//! and tests share them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default hostname used in synthesized message-ids
fn default_hostname() -> String {
    "localhost".to_string()
}

/// Default plain listener binding
fn default_listen() -> String {
    "0.0.0.0:119".to_string()
}

/// Default retention schedule (seconds between runs)
fn default_schedule() -> Duration {
    Duration::from_secs(3600)
}

/// Default cap on the number of indexed articles per group
pub fn default_index_max_posts() -> u64 {
    2000
}

/// Default cap on article age in the index, in days
pub fn default_index_max_days() -> i64 {
    60
}

/// Helper for serializing Duration as whole seconds in TOML
pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Worker fork setting: a fixed count or "auto" (CPU count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForkSetting {
    /// Explicit worker count; 0 disables forking
    Count(u32),
    /// String form, only "auto" is accepted
    Auto(ForkAuto),
}

/// Marker for the "auto" string value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkAuto {
    Auto,
}

impl Default for ForkSetting {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl ForkSetting {
    /// Resolve to a concrete worker count; 0 means single-process mode
    #[must_use]
    pub fn resolve(&self) -> usize {
        match self {
            Self::Count(n) => *n as usize,
            Self::Auto(_) => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        }
    }
}

/// TLS binding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SslConfig {
    /// Address:port for the TLS listener
    pub listen: String,
    /// Path to the PEM private key file
    pub key: String,
    /// Path to the PEM certificate chain file
    pub cert: String,
}

/// Retention job configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Seconds between retention runs
    #[serde(with = "duration_serde")]
    pub schedule: Duration,
    /// Keep at most this many articles per group
    pub index_max_posts: u64,
    /// Keep articles for at most this many days
    pub index_max_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            schedule: default_schedule(),
            index_max_posts: default_index_max_posts(),
            index_max_days: default_index_max_days(),
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Hostname used in Message-ID/Xref synthesis
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Plain listener binding ("address:port")
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Optional TLS binding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,

    /// Worker count, or "auto" for CPU count; 0 disables the pool
    #[serde(default)]
    pub fork: ForkSetting,

    /// Retention job settings
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            listen: default_listen(),
            ssl: None,
            fork: ForkSetting::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Config {
    /// Split an "address:port" binding into its parts
    ///
    /// The port is the last colon-separated token so IPv6 addresses with
    /// an explicit port still split correctly.
    pub fn split_binding(binding: &str) -> Result<(String, u16)> {
        let (address, port) = binding
            .rsplit_once(':')
            .with_context(|| format!("Binding '{}' is missing a port", binding))?;

        let port: u16 = port
            .parse()
            .with_context(|| format!("Binding '{}' has an invalid port", binding))?;

        Ok((address.to_string(), port))
    }

    /// Validate the configuration, rejecting values that would only fail
    /// later at bind time with a less useful message
    pub fn validate(&self) -> Result<()> {
        Self::split_binding(&self.listen)?;

        if let Some(ssl) = &self.ssl {
            Self::split_binding(&ssl.listen)?;
            if ssl.key.trim().is_empty() {
                anyhow::bail!("key-file is not specified in SSL config");
            }
            if ssl.cert.trim().is_empty() {
                anyhow::bail!("cert-file is not specified in SSL config");
            }
        }

        if self.hostname.trim().is_empty() {
            anyhow::bail!("hostname must not be empty");
        }

        if self.retention.index_max_posts == 0 {
            anyhow::bail!("retention.index_max_posts must be at least 1");
        }

        if self.retention.index_max_days <= 0 {
            anyhow::bail!("retention.index_max_days must be positive");
        }

        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(config_path: &str) -> Result<Config> {
    let config_content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file '{}'", config_path))?;

    let config: Config = toml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config file '{}'", config_path))?;

    config.validate()?;

    Ok(config)
}

/// Create the default configuration used when no file exists yet
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}
