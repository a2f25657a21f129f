// rust/fleet-core/src/error.rs

use std::time::Duration;
use thiserror::Error;

use crate::protocol::WorkerId;

#[derive(Error, Debug)]
pub enum FleetError {

    #[error("Worker '{worker_id}' did not answer within {timeout:?}")]
    Timeout {
        worker_id: WorkerId,
        timeout: Duration,
    },

    #[error("Worker '{worker_id}' disconnected before answering")]
    Disconnected {
        worker_id: WorkerId,
    },

    #[error("Worker '{worker_id}' answered a '{expected}' instruction with '{actual}'")]
    MalformedResult {
        worker_id: WorkerId,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Worker '{worker_id}' broke the stream protocol: {message}")]
    ProtocolViolation {
        worker_id: WorkerId,
        message: String,
    },

    #[error("Only {available} of {requested} requested workers available")]
    InsufficientWorkers {
        requested: usize,
        available: usize,
    },

    #[error("Property '{key}' missing from worker properties")]
    MissingProperty {
        key: String,
    },

    #[error("Property '{key}' holds a {found} value, expected a number")]
    InvalidProperty {
        key: String,
        found: &'static str,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, FleetError>;

// Convenience constructors
impl FleetError {

    pub fn timeout(worker_id: WorkerId, timeout: Duration) -> Self {
        Self::Timeout { worker_id, timeout }
    }

    pub fn disconnected(worker_id: WorkerId) -> Self {
        Self::Disconnected { worker_id }
    }

    pub fn malformed_result(
        worker_id: WorkerId,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::MalformedResult {
            worker_id,
            expected,
            actual,
        }
    }

    pub fn protocol_violation(worker_id: WorkerId, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            worker_id,
            message: message.into(),
        }
    }

    pub fn insufficient_workers(requested: usize, available: usize) -> Self {
        Self::InsufficientWorkers {
            requested,
            available,
        }
    }

    pub fn missing_property(key: impl Into<String>) -> Self {
        Self::MissingProperty { key: key.into() }
    }

    pub fn invalid_property(key: impl Into<String>, found: &'static str) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            found,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the orchestrator can recover by skipping or retrying the worker.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Disconnected { .. })
    }
}
