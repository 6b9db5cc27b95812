//! Configuration loading and management

use crate::core::ConfigError;
use crate::execution::ExecutionOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable naming an optional YAML config file
pub const CONFIG_ENV: &str = "SWAPI_CONFIG";

/// Environment variable overriding the listening port
pub const PORT_ENV: &str = "PORT";

/// Server configuration
///
/// Every field has a default, so an empty YAML document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0")
    pub host: String,

    /// Port to bind, overridden by `PORT`
    pub port: u16,

    /// Route of the GraphQL endpoint
    pub query_path: String,

    /// Route of the playground page
    pub playground_path: String,

    /// Route serving the schema SDL
    pub schema_path: String,

    /// Title of the playground page
    pub playground_title: String,

    /// Deadline of a whole request in milliseconds, none when null
    pub request_timeout_ms: Option<u64>,

    /// Sibling fields and list items resolved at once
    pub max_concurrency: usize,

    /// Answer `__schema` and `__type` queries
    pub introspection: bool,

    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            query_path: "/query".to_string(),
            playground_path: "/".to_string(),
            schema_path: "/schema".to_string(),
            playground_title: "GraphQL playground".to_string(),
            request_timeout_ms: Some(30_000),
            max_concurrency: 16,
            introspection: true,
            cors: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load the configuration of the server process
    ///
    /// Reads the file named by `SWAPI_CONFIG` when set, then applies the
    /// `PORT` override and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => {
                tracing::info!(path = %path, "loading configuration file");
                Self::from_yaml_file(&path)?
            }
            _ => Self::default(),
        };

        let config = config.apply_port_override(std::env::var(PORT_ENV).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the port with the value of `PORT`, if any
    pub fn apply_port_override(mut self, port: Option<String>) -> Result<Self, ConfigError> {
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    field: PORT_ENV.to_string(),
                    message: format!("'{}' is not a valid port number", port),
                })?;
        }
        Ok(self)
    }

    /// Check that routes and limits make sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        let routes = [
            ("query_path", &self.query_path),
            ("playground_path", &self.playground_path),
            ("schema_path", &self.schema_path),
        ];
        for (field, route) in routes {
            if !route.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("route '{}' must start with '/'", route),
                });
            }
        }

        for (i, (field, route)) in routes.iter().enumerate() {
            if routes[i + 1..].iter().any(|(_, other)| other == route) || *route == "/health" {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("route '{}' is used twice", route),
                });
            }
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrency".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                message: "must be positive, or null to disable the deadline".to_string(),
            });
        }

        Ok(())
    }

    /// Socket address to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Executor settings derived from this configuration
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            timeout: self.request_timeout_ms.map(Duration::from_millis),
            max_concurrency: self.max_concurrency,
            introspection: self.introspection,
        }
    }
}
