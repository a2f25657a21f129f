// rust/fleet-core/src/config.rs

//! Configuration for the orchestrator server and for connecting workers.
//!
//! Values come from a TOML file, then `FLEET_*` environment variables, then
//! command-line flags applied by the binaries.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::criterion::CriterionConfig;
use crate::error::{FleetError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub sampling: SamplingConfig,
    pub worker: WorkerConfig,
}

// Orchestrator gRPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    // Largest encoded message accepted or sent, in bytes.
    pub max_message_length: usize,
    // Instructions buffered per worker stream before backpressure.
    pub outbound_buffer: usize,
}

/// How the orchestrator screens and samples workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub criterion: CriterionConfig,
    pub threshold: f64,
    /// Workers to wait for before the first probe.
    pub min_workers: usize,
    pub wait_timeout_ms: u64,
    pub properties_timeout_ms: u64,
    /// Property refresh period; 0 disables probing.
    pub probe_interval_ms: u64,
}

// Worker side of the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub server_address: String,
    pub connect_timeout_ms: u64,
    pub max_message_length: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "[::]".to_string(),
            port: 8080,
            max_message_length: 512 * 1024 * 1024, // 512 MB
            outbound_buffer: 16,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            criterion: CriterionConfig::default(),
            threshold: 0.0,
            min_workers: 1,
            wait_timeout_ms: 60_000,
            properties_timeout_ms: 10_000,
            probe_interval_ms: 0,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            connect_timeout_ms: 5_000,
            max_message_length: 512 * 1024 * 1024,
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 500,
        }
    }
}

impl ServerConfig {
    /// `address:port`, bracketing is left to the address itself.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl SamplingConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn properties_timeout(&self) -> Duration {
        Duration::from_millis(self.properties_timeout_ms)
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        (self.probe_interval_ms > 0).then(|| Duration::from_millis(self.probe_interval_ms))
    }
}

impl WorkerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl FromStr for FleetConfig {
    type Err = FleetError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| FleetError::config_with_source("failed to parse TOML config", e))
    }
}

impl FleetConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::config_with_source(
                format!("failed to read config file {}", path.display()),
                e,
            )
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `FLEET_` followed by section and field:
    // - `FLEET_SERVER_PORT` overrides `server.port`
    // - `FLEET_SAMPLING_THRESHOLD` overrides `sampling.threshold`
    // - `FLEET_SAMPLING_KEY` points the criterion at another property
    // - `FLEET_WORKER_SERVER_ADDRESS` overrides `worker.server_address`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(val) = std::env::var("FLEET_SERVER_ADDRESS") {
            self.server.address = val;
        }
        if let Ok(val) = std::env::var("FLEET_SERVER_PORT") {
            if let Ok(v) = val.parse() {
                self.server.port = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SERVER_MAX_MESSAGE_LENGTH") {
            if let Ok(v) = val.parse() {
                self.server.max_message_length = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SERVER_OUTBOUND_BUFFER") {
            if let Ok(v) = val.parse() {
                self.server.outbound_buffer = v;
            }
        }

        // Sampling overrides
        if let Ok(val) = std::env::var("FLEET_SAMPLING_KEY") {
            if !val.is_empty() {
                self.sampling.criterion.set_score_key(&val);
            }
        }
        if let Ok(val) = std::env::var("FLEET_SAMPLING_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.sampling.threshold = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SAMPLING_MIN_WORKERS") {
            if let Ok(v) = val.parse() {
                self.sampling.min_workers = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SAMPLING_WAIT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.sampling.wait_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SAMPLING_PROPERTIES_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.sampling.properties_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_SAMPLING_PROBE_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.sampling.probe_interval_ms = v;
            }
        }

        // Worker overrides
        if let Ok(val) = std::env::var("FLEET_WORKER_SERVER_ADDRESS") {
            self.worker.server_address = val;
        }
        if let Ok(val) = std::env::var("FLEET_WORKER_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.worker.connect_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_WORKER_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(v) = val.parse() {
                self.worker.max_reconnect_attempts = v;
            }
        }
        if let Ok(val) = std::env::var("FLEET_WORKER_RECONNECT_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.worker.reconnect_delay_ms = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.server.address.is_empty() {
            return Err(FleetError::config("server.address must not be empty"));
        }
        if self.server.max_message_length == 0 {
            return Err(FleetError::config(
                "server.max_message_length must be greater than 0",
            ));
        }
        if self.server.outbound_buffer == 0 {
            return Err(FleetError::config(
                "server.outbound_buffer must be greater than 0",
            ));
        }

        self.sampling.criterion.validate()?;
        if !self.sampling.threshold.is_finite() {
            return Err(FleetError::config("sampling.threshold must be finite"));
        }
        if self.sampling.properties_timeout_ms == 0 {
            return Err(FleetError::config(
                "sampling.properties_timeout_ms must be greater than 0",
            ));
        }

        if self.worker.server_address.is_empty() {
            return Err(FleetError::config(
                "worker.server_address must not be empty",
            ));
        }
        if self.worker.connect_timeout_ms == 0 {
            return Err(FleetError::config(
                "worker.connect_timeout_ms must be greater than 0",
            ));
        }
        if self.worker.max_message_length == 0 {
            return Err(FleetError::config(
                "worker.max_message_length must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FleetConfig::default();

        assert_eq!(config.server.address, "[::]");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_message_length, 536_870_912);
        assert_eq!(config.server.outbound_buffer, 16);

        assert_eq!(config.sampling.criterion, CriterionConfig::default());
        assert_eq!(config.sampling.threshold, 0.0);
        assert_eq!(config.sampling.min_workers, 1);
        assert!(config.sampling.probe_interval().is_none());

        assert_eq!(config.worker.server_address, "127.0.0.1:8080");
        assert_eq!(config.worker.max_reconnect_attempts, 5);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: FleetConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_partial() {
        let toml = r#"
            [sampling]
            threshold = 0.75
            probe_interval_ms = 2000

            [sampling.criterion]
            strategy = "score_above"
            key = "score"
        "#;
        let config: FleetConfig = toml.parse().unwrap();

        assert_eq!(config.sampling.threshold, 0.75);
        assert_eq!(
            config.sampling.probe_interval(),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(
            config.sampling.criterion,
            CriterionConfig::ScoreAbove {
                key: "score".to_string()
            }
        );
        // Untouched sections keep defaults
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sampling.min_workers, 1);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<FleetConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result: Result<FleetConfig> = r#"
            [sampling.criterion]
            strategy = "coin_flip"
        "#
        .parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 9091

            [worker]
            server_address = "orchestrator:9091"
            "#
        )
        .unwrap();

        let config = FleetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9091);
        assert_eq!(config.server.bind_address(), "[::]:9091");
        assert_eq!(config.worker.server_address, "orchestrator:9091");
    }

    #[test]
    fn test_from_file_not_found() {
        let result = FleetConfig::from_file("/nonexistent/fleet.toml");
        assert!(matches!(result, Err(FleetError::Config { .. })));
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\noutbound_buffer = 0").unwrap();
        assert!(FleetConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = FleetConfig::default();
        config.sampling.threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = FleetConfig::default();
        config.sampling.properties_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = FleetConfig::default();
        config.worker.server_address.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker.server_address"));

        let mut config = FleetConfig::default();
        config.sampling.criterion = CriterionConfig::AllOf { criteria: vec![] };
        assert!(config.validate().is_err());
    }

    // Helper to clear all FLEET_ environment variables for test isolation
    fn clear_fleet_env_vars() {
        for (key, _) in std::env::vars() {
            if key.starts_with("FLEET_") {
                std::env::remove_var(&key);
            }
        }
    }

    // Environment variables are process-global, so every override case
    // lives in this one test.
    #[test]
    fn test_env_overrides() {
        clear_fleet_env_vars();

        std::env::set_var("FLEET_SERVER_PORT", "7000");
        std::env::set_var("FLEET_SAMPLING_THRESHOLD", "0.5");
        std::env::set_var("FLEET_SAMPLING_KEY", "battery");
        std::env::set_var("FLEET_SAMPLING_PROBE_INTERVAL_MS", "250");
        std::env::set_var("FLEET_WORKER_SERVER_ADDRESS", "10.0.0.1:7000");

        let config = FleetConfig::default().with_env_overrides();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.sampling.threshold, 0.5);
        assert_eq!(
            config.sampling.criterion,
            CriterionConfig::ScoreAbove {
                key: "battery".to_string()
            }
        );
        assert_eq!(config.sampling.probe_interval_ms, 250);
        assert_eq!(config.worker.server_address, "10.0.0.1:7000");

        clear_fleet_env_vars();

        // Unparseable values keep the previous setting
        std::env::set_var("FLEET_SERVER_PORT", "eighty");
        std::env::set_var("FLEET_SAMPLING_THRESHOLD", "high");

        let config = FleetConfig::default().with_env_overrides();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sampling.threshold, 0.0);

        clear_fleet_env_vars();
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut original = FleetConfig::default();
        original.sampling.criterion = CriterionConfig::AnyOf {
            criteria: vec![
                CriterionConfig::AcceptAll,
                CriterionConfig::ScoreBelow {
                    key: "latency".to_string(),
                },
            ],
        };
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: FleetConfig = toml_str.parse().unwrap();

        assert_eq!(original.sampling.criterion, parsed.sampling.criterion);
        assert_eq!(original.server.port, parsed.server.port);
    }
}
