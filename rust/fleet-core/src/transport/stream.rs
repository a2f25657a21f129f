//! Orchestrator side of one worker's `Join` stream.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::proto::{ClientMessage, ServerMessage};
use crate::bridge::{Bridge, Delivery};
use crate::envelope::{Envelope, Reply};
use crate::error::FleetError;

/// Why a worker stream stopped being serviced.
#[derive(Debug)]
pub enum StreamEnd {
    /// The worker finished its side of the stream.
    WorkerClosed,
    /// The inbound stream failed.
    InboundError(tonic::Status),
    /// The worker sent a frame that does not decode to a reply.
    ProtocolViolation(String),
    /// Nobody reads the outbound half any more.
    OutboundClosed,
    /// The bridge was closed from the orchestrator side.
    BridgeClosed,
}

/// Service one worker connection until either side goes away.
///
/// Instructions published on `bridge` are written to `outbound`; replies
/// read from `inbound` are delivered to the bridge. The bridge is closed on
/// return, which fails any call still waiting with `Disconnected`. A frame
/// that does not decode fails the waiting call with `ProtocolViolation`.
pub async fn drive_worker_stream<S>(
    bridge: &Bridge,
    mut inbound: S,
    outbound: mpsc::Sender<Result<ServerMessage, tonic::Status>>,
) -> StreamEnd
where
    S: Stream<Item = Result<ClientMessage, tonic::Status>> + Unpin,
{
    let worker_id = bridge.worker_id().clone();

    let end = loop {
        tokio::select! {
            next = bridge.next_instruction() => {
                let Some(envelope) = next else {
                    break StreamEnd::BridgeClosed;
                };
                let instruction = match envelope.into_instruction() {
                    Ok(instruction) => instruction,
                    Err(other) => {
                        tracing::error!(
                            worker_id = %worker_id,
                            kind = other.kind(),
                            "reply published as an instruction, dropped"
                        );
                        continue;
                    }
                };
                tracing::debug!(worker_id = %worker_id, instruction = instruction.kind(), "sending instruction");
                if outbound.send(Ok(instruction.into())).await.is_err() {
                    break StreamEnd::OutboundClosed;
                }
            }
            message = inbound.next() => match message {
                None => break StreamEnd::WorkerClosed,
                Some(Err(status)) => break StreamEnd::InboundError(status),
                Some(Ok(message)) => match Reply::try_from(message) {
                    Ok(reply) => {
                        if bridge.deliver(Envelope::reply(reply)) == Delivery::Delivered {
                            tracing::debug!(worker_id = %worker_id, "reply delivered");
                        }
                    }
                    Err(e) => {
                        tracing::error!(worker_id = %worker_id, error = %e, "undecodable message from worker");
                        let reason = e.to_string();
                        bridge.fail(FleetError::protocol_violation(
                            worker_id.clone(),
                            reason.clone(),
                        ));
                        let _ = outbound
                            .send(Err(tonic::Status::invalid_argument(reason.clone())))
                            .await;
                        break StreamEnd::ProtocolViolation(reason);
                    }
                },
            },
            _ = outbound.closed() => break StreamEnd::OutboundClosed,
        }
    };

    bridge.close();
    tracing::info!(worker_id = %worker_id, reason = ?end, "worker stream ended");
    end
}
