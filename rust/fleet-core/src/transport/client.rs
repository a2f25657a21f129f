//! Worker side of the `Join` stream.
//!
//! A [`WorkerClient`] connects to the orchestrator, opens the bidirectional
//! stream and answers every instruction through a local [`Worker`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};

use super::proto::fleet_service_client::FleetServiceClient;
use super::proto::ClientMessage;
use crate::config::WorkerConfig;
use crate::envelope::Instruction;
use crate::error::{FleetError, Result};
use crate::worker::{handle_instruction, Worker};

const MAX_BACKOFF: Duration = Duration::from_secs(30);
const REPLY_BUFFER: usize = 4;

/// How a session with the orchestrator ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The orchestrator asked the worker to leave, optionally coming back
    /// after the given delay.
    Reconnect { after: Option<Duration> },
    /// The orchestrator closed the stream.
    ServerClosed,
}

pub struct WorkerClient {
    config: WorkerConfig,
    client: Option<FleetServiceClient<Channel>>,
}

impl WorkerClient {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            client: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Connect to the orchestrator.
    pub async fn connect(&mut self) -> Result<()> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.config.server_address))
            .map_err(|e| FleetError::transport_with_source("invalid server address", e))?
            .connect_timeout(self.config.connect_timeout());

        let channel = endpoint.connect().await.map_err(|e| {
            FleetError::transport_with_source(
                format!("failed to connect to {}", self.config.server_address),
                e,
            )
        })?;

        let limit = self.config.max_message_length;
        self.client = Some(
            FleetServiceClient::new(channel)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit),
        );
        tracing::info!(server = %self.config.server_address, "connected to orchestrator");
        Ok(())
    }

    /// Connect, retrying with exponential backoff.
    pub async fn connect_with_retry(&mut self) -> Result<()> {
        let mut attempts = 0;
        let mut delay = self.config.reconnect_delay();

        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.max_reconnect_attempts {
                        return Err(FleetError::transport(format!(
                            "failed to connect after {} attempts: {}",
                            attempts, e
                        )));
                    }

                    tracing::warn!(attempt = attempts, retry_in_ms = delay.as_millis() as u64, error = %e, "connect failed");
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_BACKOFF);
                }
            }
        }
    }

    /// Join the orchestrator and answer instructions until the session ends.
    ///
    /// # Errors
    ///
    /// `Transport` if not connected or the stream fails, `Serialization` if
    /// the orchestrator sends a frame that does not decode.
    pub async fn run<W>(&mut self, worker: &W) -> Result<SessionEnd>
    where
        W: Worker + ?Sized,
    {
        let mut client = self
            .client
            .as_ref()
            .ok_or_else(|| FleetError::transport("not connected to orchestrator"))?
            .clone();

        let (replies, outbound) = mpsc::channel::<ClientMessage>(REPLY_BUFFER);
        let mut inbound = client
            .join(ReceiverStream::new(outbound))
            .await
            .map_err(|e| FleetError::transport_with_source("join failed", e))?
            .into_inner();

        while let Some(message) = inbound
            .message()
            .await
            .map_err(|e| FleetError::transport_with_source("instruction stream failed", e))?
        {
            let instruction = Instruction::try_from(message)?;
            tracing::debug!(instruction = instruction.kind(), "instruction received");

            let reconnect = match &instruction {
                Instruction::Reconnect(ins) => Some(*ins),
                _ => None,
            };

            let reply = handle_instruction(worker, instruction).await;
            replies
                .send(reply.into())
                .await
                .map_err(|_| FleetError::transport("reply stream closed"))?;

            if let Some(ins) = reconnect {
                // Finish our half and let the orchestrator read the reply
                // before the stream goes away.
                drop(replies);
                while let Ok(Some(_)) = inbound.message().await {}

                let after = ins.seconds.map(Duration::from_secs);
                tracing::info!(after_s = ?ins.seconds, "orchestrator requested disconnect");
                return Ok(SessionEnd::Reconnect { after });
            }
        }

        tracing::info!("orchestrator closed the stream");
        Ok(SessionEnd::ServerClosed)
    }
}

/// Serve `worker` until the orchestrator lets it go.
///
/// Reconnects after the delay the orchestrator asks for; stops when it asks
/// for a disconnect without a delay or closes the stream.
pub async fn run_worker<W>(config: WorkerConfig, worker: &W) -> Result<()>
where
    W: Worker + ?Sized,
{
    let mut client = WorkerClient::new(config);
    loop {
        client.connect_with_retry().await?;
        match client.run(worker).await? {
            SessionEnd::Reconnect {
                after: Some(delay),
            } if !delay.is_zero() => {
                tracing::info!(delay_s = delay.as_secs(), "reconnecting later");
                tokio::time::sleep(delay).await;
            }
            _ => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_requires_connection() {
        struct Idle;

        #[async_trait::async_trait]
        impl Worker for Idle {}

        let mut client = WorkerClient::new(WorkerConfig::default());
        assert!(!client.is_connected());
        let err = client.run(&Idle).await.unwrap_err();
        assert!(matches!(err, FleetError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let mut client = WorkerClient::new(WorkerConfig {
            server_address: "not a uri".to_string(),
            ..Default::default()
        });
        assert!(client.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let mut client = WorkerClient::new(WorkerConfig {
            // Reserved port, nothing listens there.
            server_address: "127.0.0.1:1".to_string(),
            connect_timeout_ms: 100,
            max_reconnect_attempts: 2,
            reconnect_delay_ms: 10,
            ..Default::default()
        });
        let err = client.connect_with_retry().await.unwrap_err();
        assert!(err.to_string().contains("2 attempts"));
    }
}
