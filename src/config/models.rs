// src/config/models.rs
use crate::probe::Target;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("checkRate must be greater than zero")]
    ZeroCheckRate,

    #[error("server {0}: host must not be empty")]
    EmptyHost(String),

    #[error("server {0}: port must be greater than zero")]
    ZeroPort(String),

    #[error("server {0}: timeout must be greater than zero")]
    ZeroTimeout(String),

    #[error("email: at least one receiver is required")]
    NoReceivers,

    #[error("email: invalid address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("email: smtp host must not be empty")]
    EmptySmtpHost,

    #[error("metrics: path must start with '/'")]
    InvalidMetricsPath,
}

/// Top-level monitor configuration. Built once at startup and shared by
/// reference; nothing mutates it afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Seconds between the start of two consecutive rounds.
    pub check_rate: u64,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
    pub email: EmailConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    /// Connect timeout in seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub sender: SenderConfig,
    #[serde(default)]
    pub receivers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    pub auth: AuthConfig,
    pub addr: String,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Unset means implicit TLS on port 465, opportunistic STARTTLS elsewhere.
    #[serde(default)]
    pub tls: Option<SmtpTls>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// TLS from the first byte (SMTPS).
    Implicit,
    /// STARTTLS, failing if the server does not offer it.
    Required,
    /// STARTTLS when offered, plaintext otherwise.
    Opportunistic,
}

impl AuthConfig {
    pub fn tls_mode(&self) -> SmtpTls {
        match self.tls {
            Some(mode) => mode,
            None if self.port == 465 => SmtpTls::Implicit,
            None => SmtpTls::Opportunistic,
        }
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Ports are accepted both as YAML numbers and as quoted strings.
fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {text:?}"))),
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_rate)
    }

    /// Monitored targets, ordered by key.
    pub fn targets(&self) -> Vec<Target> {
        self.servers
            .iter()
            .map(|(key, server)| Target {
                key: key.clone(),
                host: server.host.clone(),
                port: server.port,
                timeout: server.timeout(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_rate == 0 {
            return Err(ConfigError::ZeroCheckRate);
        }

        for (key, server) in &self.servers {
            if server.host.trim().is_empty() {
                return Err(ConfigError::EmptyHost(key.clone()));
            }
            if server.port == 0 {
                return Err(ConfigError::ZeroPort(key.clone()));
            }
            if server.timeout == 0 {
                return Err(ConfigError::ZeroTimeout(key.clone()));
            }
        }

        self.email.validate()?;

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath);
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl EmailConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sender.auth.host.trim().is_empty() {
            return Err(ConfigError::EmptySmtpHost);
        }
        if self.receivers.is_empty() {
            return Err(ConfigError::NoReceivers);
        }

        for addr in std::iter::once(&self.sender.addr).chain(&self.receivers) {
            addr.parse::<lettre::message::Mailbox>()
                .map_err(|e| ConfigError::InvalidAddress {
                    addr: addr.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(())
    }
}
