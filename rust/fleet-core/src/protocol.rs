//! Typed records exchanged between the orchestrator and its workers.
//!
//! These are the Rust-friendly counterparts of the wire messages in
//! [`crate::transport::proto`]; conversions live in
//! [`crate::transport::codec`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::properties::Properties;

/// Identifier of one worker connection, stable for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(Arc<str>);

impl WorkerId {
    /// Allocate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for WorkerId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// A single typed value in a property, config or metrics map.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Bytes(Vec<u8>),
    Float(f64),
    Int(i64),
    Str(String),
}

impl Scalar {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Bytes(_) => "bytes",
            Self::Float(_) => "float",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

/// Instruction-specific settings sent to a worker.
pub type Config = HashMap<String, Scalar>;

/// Metrics reported back by a worker.
pub type Metrics = HashMap<String, Scalar>;

/// Serialized model parameters. The tensor encoding is opaque here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub tensors: Vec<Bytes>,
    pub tensor_type: String,
}

impl Parameters {
    pub fn new(tensors: Vec<Bytes>, tensor_type: impl Into<String>) -> Self {
        Self {
            tensors,
            tensor_type: tensor_type.into(),
        }
    }

    /// Total payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.tensors.iter().map(Bytes::len).sum()
    }
}

/// Outcome code attached to every worker reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Code {
    #[default]
    Ok,
    GetPropertiesNotImplemented,
    GetParametersNotImplemented,
    FitNotImplemented,
    EvaluateNotImplemented,
    QueryNotImplemented,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: Code::Ok,
            message: "Success".to_string(),
        }
    }

    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetPropertiesIns {
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetPropertiesRes {
    pub status: Status,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetParametersIns {
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetParametersRes {
    pub status: Status,
    pub parameters: Parameters,
}

/// Local update request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitIns {
    pub parameters: Parameters,
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitRes {
    pub status: Status,
    pub parameters: Parameters,
    pub num_examples: u64,
    pub metrics: Metrics,
}

/// Local evaluation request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluateIns {
    pub parameters: Parameters,
    pub config: Config,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluateRes {
    pub status: Status,
    pub loss: f64,
    pub num_examples: u64,
    pub metrics: Metrics,
}

/// Ask the worker to end the session, optionally coming back after `seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconnectIns {
    pub seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectReason {
    #[default]
    Unknown,
    Reconnect,
    PowerDisconnected,
    WifiUnavailable,
    Ack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisconnectRes {
    pub reason: DisconnectReason,
}

/// Free-form question answered by the worker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryIns {
    pub question: String,
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryRes {
    pub status: Status,
    pub response: String,
    pub answer: i64,
}
