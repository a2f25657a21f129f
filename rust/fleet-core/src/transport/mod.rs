//! gRPC transport between the orchestrator and its workers.
//!
//! Each worker opens one bidirectional `Join` stream. The orchestrator
//! drives it with [`drive_worker_stream`]; the worker side runs a
//! [`WorkerClient`].

pub mod client;
pub mod codec;
pub mod proto;
pub mod stream;

pub use client::{run_worker, SessionEnd, WorkerClient};
pub use proto::fleet_service_client::FleetServiceClient;
pub use proto::fleet_service_server::{FleetService, FleetServiceServer};
pub use stream::{drive_worker_stream, StreamEnd};
