//! Broker configuration.
//!
//! # Environment Variables
//!
//! | variable | default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `9092` |
//! | `HOSTNAME` | `127.0.0.1` |
//! | `PARTITION_CHUNK_SIZE` | `65536` |
//! | `DATA_PATH` | unset (in-memory object store) |
//! | `INITIAL_CLUSTER_METADATA` | no topics |
//! | `MAX_MESSAGE_SIZE` | 100 MiB |
//! | `MAX_CONNECTIONS` | `10000`, 0 disables the cap |
//! | `FLUSH_INTERVAL_MS` | `10` |

use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_CONNECTIONS,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, MIN_FRAME_SIZE,
};
use crate::error::{Error, Result};
use crate::metadata::ClusterMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Address the listener binds to.
    pub host: String,
    pub port: u16,
    /// Host advertised to clients in Metadata responses.
    pub hostname: String,
    /// Byte capacity of each log chunk.
    pub chunk_size: usize,
    /// Directory for the local object store holding partition databases.
    /// `None` keeps partitions in memory.
    pub data_path: Option<PathBuf>,
    /// SlateDB write-ahead log flush interval.
    pub flush_interval_ms: u64,
    pub cluster: ClusterMetadata,
    /// Largest client request frame accepted.
    pub max_message_size: usize,
    /// Global connection cap, 0 for unlimited.
    pub max_connections: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            hostname: "127.0.0.1".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            data_path: None,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            cluster: ClusterMetadata::default(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl BrokerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup. Unset variables take their
    /// defaults; set but unparseable ones are an error.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cluster = match var("INITIAL_CLUSTER_METADATA") {
            Some(json) if !json.trim().is_empty() => ClusterMetadata::from_json(&json)
                .map_err(|e| Error::Config(format!("Invalid INITIAL_CLUSTER_METADATA: {}", e)))?,
            _ => defaults.cluster,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(&var, "PORT", defaults.port)?,
            hostname: var("HOSTNAME").unwrap_or(defaults.hostname),
            chunk_size: parse_var(&var, "PARTITION_CHUNK_SIZE", defaults.chunk_size)?,
            data_path: var("DATA_PATH")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            flush_interval_ms: parse_var(&var, "FLUSH_INTERVAL_MS", defaults.flush_interval_ms)?,
            cluster,
            max_message_size: parse_var(&var, "MAX_MESSAGE_SIZE", defaults.max_message_size)?,
            max_connections: parse_var(&var, "MAX_CONNECTIONS", defaults.max_connections)?,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check every setting, returning all problems found.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chunk_size < MIN_FRAME_SIZE {
            errors.push(format!(
                "chunk_size ({}) must be at least {} to hold one message",
                self.chunk_size, MIN_FRAME_SIZE
            ));
        }

        if self.chunk_size > i32::MAX as usize {
            errors.push(format!(
                "chunk_size ({}) must fit in a signed 32-bit integer",
                self.chunk_size
            ));
        }

        if self.port == 0 {
            errors.push("port must be between 1 and 65535".to_string());
        }

        if self.hostname.is_empty() {
            errors.push("hostname must not be empty".to_string());
        }

        if self.max_message_size == 0 {
            errors.push("max_message_size must be greater than 0".to_string());
        }

        if self.flush_interval_ms == 0 {
            errors.push("flush_interval_ms must be greater than 0".to_string());
        }

        errors.extend(self.cluster.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_var<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BrokerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BrokerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, BrokerConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:9092");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "19092"),
            ("HOSTNAME", "kafka.internal"),
            ("PARTITION_CHUNK_SIZE", "1024"),
            ("DATA_PATH", "/var/lib/chunklog"),
            (
                "INITIAL_CLUSTER_METADATA",
                r#"{"topics":[{"name":"t","partitions":[{"index":0}]}]}"#,
            ),
            ("MAX_MESSAGE_SIZE", "4096"),
            ("MAX_CONNECTIONS", "0"),
            ("FLUSH_INTERVAL_MS", "50"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:19092");
        assert_eq!(config.hostname, "kafka.internal");
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.data_path, Some(PathBuf::from("/var/lib/chunklog")));
        assert_eq!(config.cluster.topics[0].name, "t");
        assert_eq!(config.max_message_size, 4096);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.flush_interval_ms, 50);
    }

    #[test]
    fn test_unparseable_values() {
        let err = load(&[("PORT", "not-a-port")]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("PORT")));

        let err = load(&[("INITIAL_CLUSTER_METADATA", "{")]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("INITIAL_CLUSTER_METADATA")));
    }

    #[test]
    fn test_empty_data_path_means_memory() {
        assert_eq!(load(&[("DATA_PATH", "")]).unwrap().data_path, None);
    }

    #[test]
    fn test_zero_flush_interval_is_invalid() {
        let config = load(&[("FLUSH_INTERVAL_MS", "0")]).unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("flush_interval_ms"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = BrokerConfig {
            port: 0,
            chunk_size: 4,
            cluster: ClusterMetadata::from_json(
                r#"{"topics":[{"name":"t","partitions":[{"index":-1}]}]}"#,
            )
            .unwrap(),
            ..Default::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("chunk_size")));
        assert!(errors.iter().any(|e| e.contains("port")));
        assert!(errors.iter().any(|e| e.contains("negative")));
    }
}
