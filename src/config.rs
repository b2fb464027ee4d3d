//! Configuration Module
//!
//! Describes where the remote REST server lives and how the pooled HTTP transport
//! talks to it. Values come from code, from serde-readable documents, or from
//! environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// == Connection Pool Config ==
/// Parameters for the pooled HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPoolConfig {
    /// Connection establishment timeout in milliseconds
    pub connection_timeout_ms: u64,
    /// Maximum concurrent connections to the remote host
    pub max_connections_per_host: usize,
    /// Maximum concurrent connections overall
    pub max_total_connections: usize,
    /// Socket receive buffer size in bytes, 0 = OS default
    pub receive_buffer_size: usize,
    /// Socket send buffer size in bytes, 0 = OS default
    pub send_buffer_size: usize,
    /// Read timeout in milliseconds
    pub socket_timeout_ms: u64,
    /// Disable Nagle's algorithm
    pub tcp_no_delay: bool,
}

impl ConnectionPoolConfig {
    /// Number of requests the transport lets through at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_total_connections.min(self.max_connections_per_host)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections_per_host == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_connections_per_host",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_total_connections == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_total_connections",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 60_000,
            max_connections_per_host: 4,
            max_total_connections: 20,
            receive_buffer_size: 0,
            send_buffer_size: 0,
            socket_timeout_ms: 60_000,
            tcp_no_delay: true,
        }
    }
}

// == Rest Store Config ==
/// Remote endpoint configuration for a [`RestStore`](crate::RestStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestStoreConfig {
    /// Remote server host name; required
    pub host: Option<String>,
    /// Remote server port
    pub port: u16,
    /// Base path of the REST resource, normalized to end with `/`
    pub path: String,
    /// Whether the cache name is appended to `path` as an extra segment
    pub append_cache_name_to_path: bool,
    /// Transport parameters
    pub connection_pool: ConnectionPoolConfig,
}

impl RestStoreConfig {
    /// Creates a configuration for the given host with every other option defaulted.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Creates a configuration by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REST_STORE_HOST` - Remote host (no default, required by `validate`)
    /// - `REST_STORE_PORT` - Remote port (default: 80)
    /// - `REST_STORE_PATH` - Base path (default: `/`)
    /// - `REST_STORE_APPEND_CACHE_NAME` - Append the cache name to the path (default: false)
    /// - `REST_STORE_CONNECTION_TIMEOUT_MS` - Connect timeout (default: 60000)
    /// - `REST_STORE_MAX_CONNECTIONS_PER_HOST` - (default: 4)
    /// - `REST_STORE_MAX_TOTAL_CONNECTIONS` - (default: 20)
    /// - `REST_STORE_RECEIVE_BUFFER_SIZE` - (default: 0)
    /// - `REST_STORE_SEND_BUFFER_SIZE` - (default: 0)
    /// - `REST_STORE_SOCKET_TIMEOUT_MS` - Read timeout (default: 60000)
    /// - `REST_STORE_TCP_NO_DELAY` - (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pool = defaults.connection_pool;
        Self {
            host: env::var("REST_STORE_HOST").ok().filter(|h| !h.is_empty()),
            port: env_or("REST_STORE_PORT", defaults.port),
            path: env::var("REST_STORE_PATH").unwrap_or(defaults.path),
            append_cache_name_to_path: env_or(
                "REST_STORE_APPEND_CACHE_NAME",
                defaults.append_cache_name_to_path,
            ),
            connection_pool: ConnectionPoolConfig {
                connection_timeout_ms: env_or(
                    "REST_STORE_CONNECTION_TIMEOUT_MS",
                    pool.connection_timeout_ms,
                ),
                max_connections_per_host: env_or(
                    "REST_STORE_MAX_CONNECTIONS_PER_HOST",
                    pool.max_connections_per_host,
                ),
                max_total_connections: env_or(
                    "REST_STORE_MAX_TOTAL_CONNECTIONS",
                    pool.max_total_connections,
                ),
                receive_buffer_size: env_or(
                    "REST_STORE_RECEIVE_BUFFER_SIZE",
                    pool.receive_buffer_size,
                ),
                send_buffer_size: env_or("REST_STORE_SEND_BUFFER_SIZE", pool.send_buffer_size),
                socket_timeout_ms: env_or("REST_STORE_SOCKET_TIMEOUT_MS", pool.socket_timeout_ms),
                tcp_no_delay: env_or("REST_STORE_TCP_NO_DELAY", pool.tcp_no_delay),
            },
        }
    }

    // == Validate ==
    /// Checks the configuration and returns it with the path normalized.
    ///
    /// Fails fast when no host is set. The returned path always starts and ends
    /// with `/`.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.connection_pool.validate()?;
        match self.host.as_deref() {
            None | Some("") => return Err(ConfigError::HostNotSpecified),
            Some(_) => {}
        }
        if !self.path.starts_with('/') {
            self.path.insert(0, '/');
        }
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
        Ok(self)
    }

    /// Returns `http://host:port` for the configured server.
    pub fn base_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.host.as_deref().unwrap_or_default(),
            self.port
        )
    }
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 80,
            path: "/".to_string(),
            append_cache_name_to_path: false,
            connection_pool: ConnectionPoolConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RestStoreConfig::default();
        assert_eq!(config.host, None);
        assert_eq!(config.port, 80);
        assert_eq!(config.path, "/");
        assert!(!config.append_cache_name_to_path);
        assert_eq!(config.connection_pool.max_connections_per_host, 4);
        assert_eq!(config.connection_pool.max_total_connections, 20);
        assert!(config.connection_pool.tcp_no_delay);
    }

    #[test]
    fn test_validate_requires_host() {
        let result = RestStoreConfig::default().validate();
        assert_eq!(result, Err(ConfigError::HostNotSpecified));

        let mut config = RestStoreConfig::default();
        config.host = Some(String::new());
        assert_eq!(config.validate(), Err(ConfigError::HostNotSpecified));
    }

    #[test]
    fn test_validate_normalizes_path() {
        let mut config = RestStoreConfig::new("localhost");
        config.path = "/rest/default".to_string();
        let config = config.validate().unwrap();
        assert_eq!(config.path, "/rest/default/");

        let config = config.validate().unwrap();
        assert_eq!(config.path, "/rest/default/");
    }

    #[test]
    fn test_validate_roots_relative_path() {
        let mut config = RestStoreConfig::new("localhost");
        config.path = "rest".to_string();
        assert_eq!(config.validate().unwrap().path, "/rest/");

        let mut config = RestStoreConfig::new("localhost");
        config.path = String::new();
        assert_eq!(config.validate().unwrap().path, "/");
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let mut config = RestStoreConfig::new("localhost");
        config.connection_pool.max_total_connections = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { name: "max_total_connections", .. })
        ));
    }

    #[test]
    fn test_max_in_flight_is_tightest_bound() {
        let mut pool = ConnectionPoolConfig::default();
        pool.max_connections_per_host = 10;
        pool.max_total_connections = 3;
        assert_eq!(pool.max_in_flight(), 3);
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let json = r#"{"host": "cache.local", "port": 8080, "connection_pool": {"tcp_no_delay": false}}"#;
        let config: RestStoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.host.as_deref(), Some("cache.local"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/");
        assert!(!config.connection_pool.tcp_no_delay);
        assert_eq!(config.connection_pool.max_total_connections, 20);
        assert_eq!(config.base_url(), "http://cache.local:8080");
    }

    #[test]
    fn test_config_from_env_defaults() {
        env::remove_var("REST_STORE_HOST");
        env::remove_var("REST_STORE_PORT");
        env::remove_var("REST_STORE_PATH");
        env::remove_var("REST_STORE_MAX_TOTAL_CONNECTIONS");

        let config = RestStoreConfig::from_env();
        assert_eq!(config.host, None);
        assert_eq!(config.port, 80);
        assert_eq!(config.path, "/");
        assert_eq!(config.connection_pool.max_total_connections, 20);
    }
}
