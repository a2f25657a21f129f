//! Worker-side capability.
//!
//! A [`Worker`] is the local logic a remote participant runs. The
//! orchestrator never calls it directly; it is driven either by the
//! worker-side stream client ([`crate::transport::client`]) or by an
//! [`crate::proxy::InProcessWorkerProxy`] in simulations and tests.

use async_trait::async_trait;

use crate::envelope::{Instruction, Reply};
use crate::protocol::{
    Code, DisconnectReason, DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes,
    GetParametersIns, GetParametersRes, GetPropertiesIns, GetPropertiesRes, QueryIns, QueryRes,
    ReconnectIns, Status,
};

/// Local operations a worker can perform on request.
///
/// Every method has a default that answers with the matching
/// "not implemented" status, so implementors only override what they support.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
        GetPropertiesRes {
            status: Status::new(
                Code::GetPropertiesNotImplemented,
                "worker does not implement get_properties",
            ),
            ..Default::default()
        }
    }

    async fn get_parameters(&self, _ins: GetParametersIns) -> GetParametersRes {
        GetParametersRes {
            status: Status::new(
                Code::GetParametersNotImplemented,
                "worker does not implement get_parameters",
            ),
            ..Default::default()
        }
    }

    async fn fit(&self, _ins: FitIns) -> FitRes {
        FitRes {
            status: Status::new(Code::FitNotImplemented, "worker does not implement fit"),
            ..Default::default()
        }
    }

    async fn evaluate(&self, _ins: EvaluateIns) -> EvaluateRes {
        EvaluateRes {
            status: Status::new(
                Code::EvaluateNotImplemented,
                "worker does not implement evaluate",
            ),
            ..Default::default()
        }
    }

    async fn query(&self, _ins: QueryIns) -> QueryRes {
        QueryRes {
            status: Status::new(Code::QueryNotImplemented, "worker does not implement query"),
            ..Default::default()
        }
    }
}

/// Reply a worker sends when asked to reconnect.
pub fn disconnect_reply(ins: ReconnectIns) -> DisconnectRes {
    let reason = if ins.seconds.is_some() {
        DisconnectReason::Reconnect
    } else {
        DisconnectReason::PowerDisconnected
    };
    DisconnectRes { reason }
}

/// Run one instruction against a worker and wrap its answer.
pub async fn handle_instruction<W>(worker: &W, instruction: Instruction) -> Reply
where
    W: Worker + ?Sized,
{
    match instruction {
        Instruction::GetProperties(ins) => Reply::GetProperties(worker.get_properties(ins).await),
        Instruction::GetParameters(ins) => Reply::GetParameters(worker.get_parameters(ins).await),
        Instruction::Fit(ins) => Reply::Fit(worker.fit(ins).await),
        Instruction::Evaluate(ins) => Reply::Evaluate(worker.evaluate(ins).await),
        Instruction::Reconnect(ins) => Reply::Disconnect(disconnect_reply(ins)),
        Instruction::Query(ins) => Reply::Query(worker.query(ins).await),
    }
}
