//! gRPC service accepting worker connections.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tonic::{Request, Response, Status, Streaming};

use fleet_core::transport::proto::{ClientMessage, ServerMessage};
use fleet_core::transport::{drive_worker_stream, FleetService};
use fleet_core::{Bridge, StreamWorkerProxy, WorkerId, WorkerRegistry};

pub struct FleetServiceImpl {
    registry: Arc<WorkerRegistry>,
    outbound_buffer: usize,
}

impl FleetServiceImpl {
    pub fn new(registry: Arc<WorkerRegistry>, outbound_buffer: usize) -> Self {
        Self {
            registry,
            outbound_buffer,
        }
    }
}

#[tonic::async_trait]
impl FleetService for FleetServiceImpl {
    type JoinStream = Pin<Box<dyn Stream<Item = Result<ServerMessage, Status>> + Send + 'static>>;

    async fn join(
        &self,
        request: Request<Streaming<ClientMessage>>,
    ) -> Result<Response<Self::JoinStream>, Status> {
        let peer = request.remote_addr();
        let inbound = request.into_inner();

        let worker_id = WorkerId::generate();
        let bridge = Arc::new(Bridge::new(worker_id.clone()));
        self.registry
            .register(Arc::new(StreamWorkerProxy::new(bridge.clone())))
            .await;
        tracing::info!(worker_id = %worker_id, peer = ?peer, "worker joined");

        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        let registry = self.registry.clone();

        tokio::spawn(async move {
            drive_worker_stream(&bridge, inbound, tx).await;
            registry.unregister(&worker_id).await;
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
