use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminClientConfig;
use crate::backend::{CliConfig, ReplicaConfig};
use crate::poller::PollConfig;

/// Default values for configuration
pub mod defaults {
    pub const NODE_HOST: &str = "localhost";
    pub const NODE_PORT: u16 = 8888;
    pub const CLIENT_PROGRAM: &str = "cleos";

    pub const REPLICA_SHELL: &str = "mongo";
    pub const REPLICA_HOST: &str = "localhost";
    pub const REPLICA_PORT: u16 = 27017;
    pub const REPLICA_DATABASE: &str = "EOStest";

    pub const POLL_INTERVAL_SECS: u64 = 3;
    pub const POLL_TIMEOUT_SECS: u64 = 60;
    pub const BLOCK_WAIT_TIMEOUT_SECS: u64 = 60;
    pub const COMMAND_TIMEOUT_SECS: u64 = 30;
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
    pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

    // Validation limits
    pub const MIN_POLL_INTERVAL_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 3600;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {field}: '{value}' must not be empty")]
    EmptyField { field: &'static str, value: String },

    #[error("Invalid port for {field}: 0")]
    InvalidPort { field: &'static str },

    #[error("Invalid {field}: {value}s (allowed range: {min}s-{max}s)")]
    InvalidTimeout {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Poll interval {interval}s is longer than poll timeout {timeout}s")]
    IntervalExceedsTimeout { interval: u64, timeout: u64 },
}

/// Where the read replica lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSection {
    #[serde(default = "default_replica_shell")]
    pub shell: String,

    #[serde(default = "default_replica_host")]
    pub host: String,

    #[serde(default = "default_replica_port")]
    pub port: u16,

    #[serde(default = "default_replica_database")]
    pub database: String,
}

impl Default for ReplicaSection {
    fn default() -> Self {
        Self {
            shell: default_replica_shell(),
            host: default_replica_host(),
            port: default_replica_port(),
            database: default_replica_database(),
        }
    }
}

/// Everything needed to build a client against one node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node connection settings
    #[serde(default = "default_node_host")]
    pub host: String,

    #[serde(default = "default_node_port")]
    pub port: u16,

    /// Command-line client settings
    #[serde(default = "default_client_program")]
    pub client_program: String,

    #[serde(default)]
    pub wallet_url: Option<String>,

    #[serde(default)]
    pub extra_client_args: Vec<String>,

    /// Query the read replica instead of the live node
    #[serde(default)]
    pub replica: Option<ReplicaSection>,

    /// Poll loop pacing
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_block_wait_timeout_secs")]
    pub block_wait_timeout_secs: u64,

    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_node_host() -> String {
    defaults::NODE_HOST.to_string()
}
fn default_node_port() -> u16 {
    defaults::NODE_PORT
}
fn default_client_program() -> String {
    defaults::CLIENT_PROGRAM.to_string()
}
fn default_replica_shell() -> String {
    defaults::REPLICA_SHELL.to_string()
}
fn default_replica_host() -> String {
    defaults::REPLICA_HOST.to_string()
}
fn default_replica_port() -> u16 {
    defaults::REPLICA_PORT
}
fn default_replica_database() -> String {
    defaults::REPLICA_DATABASE.to_string()
}
fn default_poll_interval_secs() -> u64 {
    defaults::POLL_INTERVAL_SECS
}
fn default_poll_timeout_secs() -> u64 {
    defaults::POLL_TIMEOUT_SECS
}
fn default_block_wait_timeout_secs() -> u64 {
    defaults::BLOCK_WAIT_TIMEOUT_SECS
}
fn default_command_timeout_secs() -> u64 {
    defaults::COMMAND_TIMEOUT_SECS
}
fn default_http_timeout_secs() -> u64 {
    defaults::HTTP_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_node_host(),
            port: default_node_port(),
            client_program: default_client_program(),
            wallet_url: None,
            extra_client_args: Vec::new(),
            replica: None,
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            block_wait_timeout_secs: default_block_wait_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_non_empty("host", &self.host)?;
        check_port("port", self.port)?;
        check_non_empty("client_program", &self.client_program)?;

        if let Some(replica) = &self.replica {
            check_non_empty("replica.shell", &replica.shell)?;
            check_non_empty("replica.host", &replica.host)?;
            check_non_empty("replica.database", &replica.database)?;
            check_port("replica.port", replica.port)?;
        }

        check_timeout(
            "poll_interval_secs",
            self.poll_interval_secs,
            defaults::MIN_POLL_INTERVAL_SECS,
        )?;
        check_timeout("poll_timeout_secs", self.poll_timeout_secs, 0)?;
        check_timeout("block_wait_timeout_secs", self.block_wait_timeout_secs, 0)?;
        check_timeout("command_timeout_secs", self.command_timeout_secs, 0)?;
        check_timeout("http_timeout_secs", self.http_timeout_secs, 1)?;

        if self.poll_interval_secs > self.poll_timeout_secs {
            return Err(ConfigError::IntervalExceedsTimeout {
                interval: self.poll_interval_secs,
                timeout: self.poll_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn node_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn cli_config(&self) -> CliConfig {
        CliConfig {
            program: self.client_program.clone(),
            node_url: self.node_url(),
            wallet_url: self.wallet_url.clone(),
            extra_args: self.extra_client_args.clone(),
        }
    }

    pub fn replica_config(&self) -> Option<ReplicaConfig> {
        self.replica.as_ref().map(|replica| ReplicaConfig {
            shell: replica.shell.clone(),
            host: replica.host.clone(),
            port: replica.port,
            database: replica.database.clone(),
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.poll_timeout_secs),
        )
    }

    /// Pacing for waiting on a single block while walking the chain.
    pub fn block_wait_config(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.block_wait_timeout_secs),
        )
    }

    /// `None` when commands may run unbounded (`command_timeout_secs = 0`).
    pub fn command_timeout(&self) -> Option<Duration> {
        match self.command_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn admin_config(&self) -> AdminClientConfig {
        AdminClientConfig {
            request_timeout: Duration::from_secs(self.http_timeout_secs),
            connection_timeout: Duration::from_secs(
                defaults::HTTP_CONNECT_TIMEOUT_SECS.min(self.http_timeout_secs),
            ),
        }
    }
}

fn check_non_empty(field: &'static str, value: &str) -> std::result::Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_port(field: &'static str, port: u16) -> std::result::Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidPort { field });
    }
    Ok(())
}

fn check_timeout(field: &'static str, value: u64, min: u64) -> std::result::Result<(), ConfigError> {
    if value < min || value > defaults::MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidTimeout {
            field,
            value,
            min,
            max: defaults::MAX_TIMEOUT_SECS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_config(), PollConfig::default());
        assert_eq!(config.node_url(), "http://localhost:8888");
        assert!(config.replica_config().is_none());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"port": 9999, "replica": {"database": "chain"}}"#).unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.host, defaults::NODE_HOST);

        let replica = config.replica_config().unwrap();
        assert_eq!(replica.database, "chain");
        assert_eq!(replica.port, defaults::REPLICA_PORT);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ClientConfig::default();
        config.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout { field: "poll_interval_secs", .. })
        ));

        let mut config = ClientConfig::default();
        config.poll_interval_secs = 10;
        config.poll_timeout_secs = 5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::IntervalExceedsTimeout { interval: 10, timeout: 5 })
        );

        let mut config = ClientConfig::default();
        config.replica = Some(ReplicaSection {
            port: 0,
            ..ReplicaSection::default()
        });
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidPort { field: "replica.port" })
        );
    }

    #[test]
    fn test_command_timeout_zero_disables() {
        let mut config = ClientConfig::default();
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));
        config.command_timeout_secs = 0;
        assert_eq!(config.command_timeout(), None);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!(
            "node-observer-config-{}.json",
            std::process::id()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"host": "10.0.0.5", "wallet_url": "http://10.0.0.5:9899"}}"#).unwrap();
        drop(file);

        let config = ClientConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(
            config.cli_config().wallet_url.as_deref(),
            Some("http://10.0.0.5:9899")
        );
        assert!(ClientConfig::from_file(&path).is_err());
    }
}
