//! Proxy that runs a worker in the orchestrator's own process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{decode_reply, record_properties, WorkerProxy};
use crate::envelope::{Envelope, Instruction, Reply};
use crate::error::{FleetError, Result};
use crate::properties::{PropertyCache, PropertySnapshot};
use crate::protocol::{
    DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes, GetParametersIns, GetParametersRes,
    GetPropertiesIns, GetPropertiesRes, QueryIns, QueryRes, ReconnectIns, WorkerId,
};
use crate::worker::{handle_instruction, Worker};

/// Calls a local [`Worker`] directly, with the same one-call-at-a-time and
/// timeout behaviour as a connected worker.
pub struct InProcessWorkerProxy {
    id: WorkerId,
    worker: Arc<dyn Worker>,
    turn: Mutex<()>,
    properties: PropertyCache,
}

impl InProcessWorkerProxy {
    pub fn new(id: WorkerId, worker: Arc<dyn Worker>) -> Self {
        Self {
            id,
            worker,
            turn: Mutex::new(()),
            properties: PropertyCache::new(),
        }
    }

    async fn call<T>(&self, instruction: Instruction, timeout: Option<Duration>) -> Result<T>
    where
        T: TryFrom<Reply, Error = Reply>,
    {
        let _turn = self.turn.lock().await;
        self.run(instruction, timeout).await
    }

    // Runs one instruction; the caller holds `turn`.
    async fn run<T>(&self, instruction: Instruction, timeout: Option<Duration>) -> Result<T>
    where
        T: TryFrom<Reply, Error = Reply>,
    {
        let kind = instruction.kind();

        let work = handle_instruction(self.worker.as_ref(), instruction);
        let reply = match timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| FleetError::timeout(self.id.clone(), limit))?,
            None => work.await,
        };

        decode_reply(&self.id, kind, Envelope::reply(reply))
    }
}

#[async_trait]
impl WorkerProxy for InProcessWorkerProxy {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn properties(&self) -> Arc<PropertySnapshot> {
        self.properties.snapshot()
    }

    async fn get_properties(
        &self,
        ins: GetPropertiesIns,
        timeout: Option<Duration>,
    ) -> Result<GetPropertiesRes> {
        let _turn = self.turn.lock().await;
        let res: GetPropertiesRes = self.run(Instruction::GetProperties(ins), timeout).await?;
        record_properties(&self.properties, &self.id, &res);
        Ok(res)
    }

    async fn get_parameters(
        &self,
        ins: GetParametersIns,
        timeout: Option<Duration>,
    ) -> Result<GetParametersRes> {
        self.call(Instruction::GetParameters(ins), timeout).await
    }

    async fn fit(&self, ins: FitIns, timeout: Option<Duration>) -> Result<FitRes> {
        self.call(Instruction::Fit(ins), timeout).await
    }

    async fn evaluate(&self, ins: EvaluateIns, timeout: Option<Duration>) -> Result<EvaluateRes> {
        self.call(Instruction::Evaluate(ins), timeout).await
    }

    async fn reconnect(
        &self,
        ins: ReconnectIns,
        timeout: Option<Duration>,
    ) -> Result<DisconnectRes> {
        self.call(Instruction::Reconnect(ins), timeout).await
    }

    async fn query(&self, ins: QueryIns, timeout: Option<Duration>) -> Result<QueryRes> {
        self.call(Instruction::Query(ins), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Scalar, Status};

    struct Trainer;

    #[async_trait]
    impl Worker for Trainer {
        async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
            let mut res = GetPropertiesRes {
                status: Status::ok(),
                ..Default::default()
            };
            res.properties.insert("IE".to_string(), Scalar::Float(0.9));
            res
        }

        async fn evaluate(&self, _ins: EvaluateIns) -> EvaluateRes {
            tokio::time::sleep(Duration::from_secs(3)).await;
            EvaluateRes {
                status: Status::ok(),
                loss: 0.25,
                num_examples: 100,
                ..Default::default()
            }
        }
    }

    fn proxy() -> InProcessWorkerProxy {
        InProcessWorkerProxy::new(WorkerId::from("local"), Arc::new(Trainer))
    }

    #[tokio::test]
    async fn test_properties_cached() {
        let proxy = proxy();
        proxy
            .get_properties(GetPropertiesIns::default(), None)
            .await
            .unwrap();
        assert_eq!(proxy.properties().get("IE"), Some(&Scalar::Float(0.9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_applies_locally() {
        let proxy = proxy();

        let err = proxy
            .evaluate(EvaluateIns::default(), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Timeout { .. }));

        let res = proxy
            .evaluate(EvaluateIns::default(), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(res.num_examples, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_record_in_order() {
        use std::sync::atomic::{AtomicI64, Ordering};

        struct Counting(AtomicI64);

        #[async_trait]
        impl Worker for Counting {
            async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
                let mut res = GetPropertiesRes {
                    status: Status::ok(),
                    ..Default::default()
                };
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                res.properties.insert("seq".to_string(), Scalar::Int(n));
                res
            }
        }

        for _ in 0..50 {
            let proxy = Arc::new(InProcessWorkerProxy::new(
                WorkerId::from("local"),
                Arc::new(Counting(AtomicI64::new(0))),
            ));
            let fetches: Vec<_> = (0..4)
                .map(|_| {
                    let proxy = proxy.clone();
                    tokio::spawn(async move {
                        proxy
                            .get_properties(GetPropertiesIns::default(), None)
                            .await
                            .unwrap()
                    })
                })
                .collect();
            for fetch in fetches {
                fetch.await.unwrap();
            }

            let cached = proxy.properties();
            assert_eq!(cached.version, 4);
            assert_eq!(cached.get("seq"), Some(&Scalar::Int(3)));
        }
    }

    #[tokio::test]
    async fn test_unimplemented_operation_reports_status() {
        let res = proxy().fit(FitIns::default(), None).await.unwrap();
        assert!(!res.status.is_ok());
    }
}
