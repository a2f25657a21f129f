// rust/fleet-core/src/lib.rs

//! Fleet - Core Library
//!
//! Lets an orchestrator treat remote workers as local objects. Each
//! connected worker is reached through a [`WorkerProxy`] whose calls travel
//! over a per-worker [`Bridge`] onto the worker's stream. A [`Criterion`]
//! decides which workers are eligible for sampling based on the properties
//! they report.

pub mod config;
pub mod error;

// Re-export commonly used types for convenience
pub use config::{FleetConfig, SamplingConfig, ServerConfig, WorkerConfig};
pub use error::{FleetError, Result};

pub mod protocol;
pub use protocol::{
    Code, Config, DisconnectReason, DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes,
    GetParametersIns, GetParametersRes, GetPropertiesIns, GetPropertiesRes, Metrics, Parameters,
    QueryIns, QueryRes, ReconnectIns, Scalar, Status, WorkerId,
};

pub mod properties;
pub use properties::{Properties, PropertyCache, PropertySnapshot};

pub mod envelope;
pub use envelope::{Envelope, Instruction, Payload, Reply};

pub mod bridge;
pub use bridge::{Bridge, BridgeState, Delivery};

pub mod worker;
pub use worker::{handle_instruction, Worker};

pub mod proxy;
pub use proxy::{InProcessWorkerProxy, StreamWorkerProxy, WorkerProxy};

pub mod criterion;
pub use criterion::{
    AcceptAll, AllOf, AnyOf, Criterion, CriterionConfig, ScoreAbove, ScoreBelow,
    DEFAULT_SCORE_KEY,
};

pub mod registry;
pub use registry::{Refresh, Screening, WorkerRegistry};

pub mod transport;
