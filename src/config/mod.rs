//! Client configuration (Module P).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration for one client instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub topology: TopologyConfig,
    pub lock: LockConfig,
    pub logging: LoggingConfig,
}

/// Per-socket behavior shared by every topology (Modules B/C/D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub command_timeout_ms: u64,
    pub ping_period_ms: u64,
    pub slow_threshold_ms: u64,
    pub max_pool_workers: usize,
}

/// Which client topology to build and its host list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum TopologyConfig {
    #[serde(rename = "direct")]
    Direct { host: String },
    #[serde(rename = "client_list")]
    ClientList { hosts: Vec<String> },
    #[serde(rename = "hash_pool")]
    HashPool { hosts: Vec<String>, virtual_nodes_per_host: u32 },
    #[serde(rename = "master_slave")]
    MasterSlave { hosts: Vec<String> },
    #[serde(rename = "cluster")]
    Cluster {
        seed_nodes: Vec<String>,
        /// How often the background topology reload re-runs `CLUSTER
        /// SLOTS` against the live host set, independent of any
        /// `MOVED`-triggered reload.
        reload_period_ms: u64,
    },
}

/// Distributed lock configuration (Module N).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub mode: LockMode,
    pub default_validity_ms: u64,
    pub wait_deadline_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    Single,
    Redlock,
}

/// Logging configuration, mirrored into `tracing-subscriber`'s
/// `EnvFilter`/formatter setup at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                command_timeout_ms: 1000,
                ping_period_ms: 0,
                slow_threshold_ms: 100,
                max_pool_workers: 200,
            },
            topology: TopologyConfig::Direct { host: "127.0.0.1:6379".to_string() },
            lock: LockConfig {
                mode: LockMode::Single,
                default_validity_ms: 30_000,
                wait_deadline_ms: 5_000,
            },
            logging: LoggingConfig { level: "info".to_string(), format: "text".to_string() },
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.command_timeout_ms == 0 {
            return Err(ConfigError::Validation("command_timeout_ms must be greater than 0".into()));
        }
        if self.connection.max_pool_workers == 0 {
            return Err(ConfigError::Validation("max_pool_workers must be greater than 0".into()));
        }

        match &self.topology {
            TopologyConfig::Direct { host } => validate_host(host)?,
            TopologyConfig::ClientList { hosts } | TopologyConfig::MasterSlave { hosts } => {
                if hosts.is_empty() {
                    return Err(ConfigError::Validation("hosts cannot be empty".into()));
                }
                for host in hosts {
                    validate_host(host)?;
                }
            }
            TopologyConfig::HashPool { hosts, virtual_nodes_per_host } => {
                if hosts.is_empty() {
                    return Err(ConfigError::Validation("hosts cannot be empty".into()));
                }
                if *virtual_nodes_per_host == 0 {
                    return Err(ConfigError::Validation("virtual_nodes_per_host must be greater than 0".into()));
                }
                for host in hosts {
                    validate_host(host)?;
                }
            }
            TopologyConfig::Cluster { seed_nodes, reload_period_ms } => {
                if seed_nodes.is_empty() {
                    return Err(ConfigError::Validation("seed_nodes cannot be empty".into()));
                }
                for host in seed_nodes {
                    validate_host(host)?;
                }
                if *reload_period_ms == 0 {
                    return Err(ConfigError::Validation("reload_period_ms must be greater than 0".into()));
                }
            }
        }

        if matches!(self.lock.mode, LockMode::Redlock) && self.lock.default_validity_ms < 1000 {
            return Err(ConfigError::Validation("redlock default_validity_ms should be at least 1000".into()));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => return Err(ConfigError::Validation(format!("invalid log level: {other}"))),
        }
        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => return Err(ConfigError::Validation(format!("invalid log format: {other}"))),
        }

        Ok(())
    }
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    host.parse::<std::net::SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::Validation(format!("invalid host address: {host}")))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("validation error: {0}")]
    Validation(String),
}
