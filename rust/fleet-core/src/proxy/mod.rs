//! Orchestrator-side handles to workers.
//!
//! A [`WorkerProxy`] makes a remote worker look like a local object with
//! typed async operations. Two implementations are provided:
//!
//! - [`StreamWorkerProxy`]: talks to a connected worker through its
//!   [`crate::bridge::Bridge`]
//! - [`InProcessWorkerProxy`]: calls a local [`crate::worker::Worker`]
//!   directly, for simulations and tests

mod in_process;
mod stream;

pub use in_process::InProcessWorkerProxy;
pub use stream::StreamWorkerProxy;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::envelope::{Envelope, Payload, Reply};
use crate::error::{FleetError, Result};
use crate::properties::{PropertyCache, PropertySnapshot};
use crate::protocol::{
    DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes, GetParametersIns, GetParametersRes,
    GetPropertiesIns, GetPropertiesRes, QueryIns, QueryRes, ReconnectIns, WorkerId,
};

/// Typed operations on one worker.
///
/// Every operation takes an optional timeout and forwards `Timeout` and
/// `Disconnected` unchanged. A reply of the wrong kind fails the call with
/// `MalformedResult`.
#[async_trait]
pub trait WorkerProxy: Send + Sync {
    fn id(&self) -> &WorkerId;

    /// Properties from the most recent successful `get_properties`.
    fn properties(&self) -> Arc<PropertySnapshot>;

    /// Fetch the worker's properties. A reply with OK status replaces the
    /// cached properties; anything else leaves them untouched.
    async fn get_properties(
        &self,
        ins: GetPropertiesIns,
        timeout: Option<Duration>,
    ) -> Result<GetPropertiesRes>;

    async fn get_parameters(
        &self,
        ins: GetParametersIns,
        timeout: Option<Duration>,
    ) -> Result<GetParametersRes>;

    /// Run a local update step on the worker.
    async fn fit(&self, ins: FitIns, timeout: Option<Duration>) -> Result<FitRes>;

    /// Run a local evaluation on the worker.
    async fn evaluate(&self, ins: EvaluateIns, timeout: Option<Duration>) -> Result<EvaluateRes>;

    /// Ask the worker to end the session. The proxy should not be used
    /// afterwards.
    async fn reconnect(
        &self,
        ins: ReconnectIns,
        timeout: Option<Duration>,
    ) -> Result<DisconnectRes>;

    async fn query(&self, ins: QueryIns, timeout: Option<Duration>) -> Result<QueryRes>;
}

/// Extract the reply variant expected for `instruction`.
pub(crate) fn decode_reply<T>(
    worker_id: &WorkerId,
    instruction: &'static str,
    envelope: Envelope,
) -> Result<T>
where
    T: TryFrom<Reply, Error = Reply>,
{
    let actual = match envelope.payload {
        Payload::Reply(reply) => match T::try_from(reply) {
            Ok(res) => return Ok(res),
            Err(other) => other.kind(),
        },
        Payload::Instruction(ins) => ins.kind(),
    };

    tracing::error!(
        worker_id = %worker_id,
        instruction,
        actual,
        "protocol violation: reply does not match instruction"
    );
    Err(FleetError::malformed_result(
        worker_id.clone(),
        instruction,
        actual,
    ))
}

pub(crate) fn record_properties(
    cache: &PropertyCache,
    worker_id: &WorkerId,
    res: &GetPropertiesRes,
) {
    if res.status.is_ok() {
        let version = cache.replace(res.properties.clone());
        tracing::debug!(
            worker_id = %worker_id,
            version,
            count = res.properties.len(),
            "properties updated"
        );
    } else {
        tracing::warn!(
            worker_id = %worker_id,
            code = ?res.status.code,
            message = %res.status.message,
            "properties not updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Instruction;
    use crate::protocol::{Code, Scalar, Status};

    #[test]
    fn test_decode_reply_mismatch() {
        let id = WorkerId::from("w0");
        let env = Envelope::reply(EvaluateRes::default());

        let err = decode_reply::<FitRes>(&id, "fit", env).unwrap_err();
        match err {
            FleetError::MalformedResult {
                expected, actual, ..
            } => {
                assert_eq!(expected, "fit");
                assert_eq!(actual, "evaluate_res");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_reply_instruction_payload() {
        let id = WorkerId::from("w0");
        let env = Envelope::instruction(Instruction::Fit(FitIns::default()), None);
        let err = decode_reply::<FitRes>(&id, "fit", env).unwrap_err();
        assert!(matches!(err, FleetError::MalformedResult { actual: "fit", .. }));
    }

    #[test]
    fn test_record_properties_only_on_ok() {
        let cache = PropertyCache::new();
        let id = WorkerId::from("w0");

        let mut res = GetPropertiesRes {
            status: Status::ok(),
            ..Default::default()
        };
        res.properties.insert("IE".to_string(), Scalar::Float(0.4));
        record_properties(&cache, &id, &res);
        assert_eq!(cache.version(), 1);

        let refused = GetPropertiesRes {
            status: Status::new(Code::GetPropertiesNotImplemented, "nope"),
            ..Default::default()
        };
        record_properties(&cache, &id, &refused);
        assert_eq!(cache.version(), 1);
        assert_eq!(cache.snapshot().get("IE"), Some(&Scalar::Float(0.4)));
    }
}
