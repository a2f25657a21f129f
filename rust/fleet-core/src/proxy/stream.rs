//! Bridge-backed worker proxy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{decode_reply, record_properties, WorkerProxy};
use crate::bridge::Bridge;
use crate::envelope::{Envelope, Instruction, Reply};
use crate::error::Result;
use crate::properties::{PropertyCache, PropertySnapshot};
use crate::protocol::{
    DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes, GetParametersIns, GetParametersRes,
    GetPropertiesIns, GetPropertiesRes, QueryIns, QueryRes, ReconnectIns, WorkerId,
};

/// Proxy for a worker connected over a stream.
pub struct StreamWorkerProxy {
    id: WorkerId,
    bridge: Arc<Bridge>,
    properties: PropertyCache,
    // Held across a property fetch and its cache write, so writes land in
    // reply order.
    fetching: Mutex<()>,
}

impl StreamWorkerProxy {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            id: bridge.worker_id().clone(),
            bridge,
            properties: PropertyCache::new(),
            fetching: Mutex::new(()),
        }
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    async fn call<T>(&self, instruction: Instruction, timeout: Option<Duration>) -> Result<T>
    where
        T: TryFrom<Reply, Error = Reply>,
    {
        let kind = instruction.kind();
        let reply = self
            .bridge
            .request(Envelope::instruction(instruction, timeout))
            .await?;
        decode_reply(&self.id, kind, reply)
    }
}

#[async_trait]
impl WorkerProxy for StreamWorkerProxy {
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
        let _fetching = self.fetching.lock().await;
        let res: GetPropertiesRes = self.call(Instruction::GetProperties(ins), timeout).await?;
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::error::FleetError;
    use crate::protocol::{Code, DisconnectReason, Parameters, Scalar, Status};
    use crate::worker::{handle_instruction, Worker};

    /// Worker whose second and later property fetches hang for `stall`.
    struct ScoredWorker {
        score: f64,
        stall: Duration,
        fetches: AtomicUsize,
    }

    impl ScoredWorker {
        fn new(score: f64, stall: Duration) -> Self {
            Self {
                score,
                stall,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Worker for ScoredWorker {
        async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
            if self.fetches.fetch_add(1, Ordering::SeqCst) > 0 {
                tokio::time::sleep(self.stall).await;
            }
            let mut res = GetPropertiesRes {
                status: Status::ok(),
                ..Default::default()
            };
            res.properties
                .insert("score".to_string(), Scalar::Float(self.score));
            res
        }

        async fn get_parameters(&self, _ins: GetParametersIns) -> GetParametersRes {
            GetParametersRes {
                status: Status::ok(),
                parameters: Parameters::new(vec![Bytes::from_static(b"w")], "raw"),
            }
        }

        async fn fit(&self, ins: FitIns) -> FitRes {
            tokio::time::sleep(Duration::from_secs(5)).await;
            FitRes {
                status: Status::ok(),
                parameters: ins.parameters,
                num_examples: 10,
                ..Default::default()
            }
        }
    }

    // Serves a bridge from a local worker, one instruction at a time.
    fn serve(bridge: Arc<Bridge>, worker: Arc<dyn Worker>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = bridge.next_instruction().await {
                let instruction = match envelope.into_instruction() {
                    Ok(ins) => ins,
                    Err(_) => continue,
                };
                let reply = handle_instruction(worker.as_ref(), instruction).await;
                bridge.deliver(Envelope::reply(reply));
            }
        })
    }

    fn connected(worker: Arc<dyn Worker>) -> (StreamWorkerProxy, Arc<Bridge>) {
        let bridge = Arc::new(Bridge::new(WorkerId::generate()));
        serve(bridge.clone(), worker);
        (StreamWorkerProxy::new(bridge.clone()), bridge)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_properties_updates_cache_and_failure_keeps_it() {
        let worker = Arc::new(ScoredWorker::new(7.5, Duration::from_secs(30)));
        let (proxy, _bridge) = connected(worker);

        assert!(!proxy.properties().is_populated());

        let res = proxy
            .get_properties(GetPropertiesIns::default(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(res.status.is_ok());

        let cached = proxy.properties();
        assert_eq!(cached.version, 1);
        assert_eq!(cached.values, res.properties);

        // Second fetch stalls past the deadline.
        let err = proxy
            .get_properties(GetPropertiesIns::default(), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Timeout { .. }));

        let after = proxy.properties();
        assert_eq!(after.version, 1);
        assert_eq!(after.get("score"), Some(&Scalar::Float(7.5)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_fetches_keep_latest_reply() {
        /// Reports how many property fetches it has answered before this one.
        struct Counting(AtomicUsize);

        #[async_trait]
        impl Worker for Counting {
            async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
                let n = self.0.fetch_add(1, Ordering::SeqCst);
                let mut res = GetPropertiesRes {
                    status: Status::ok(),
                    ..Default::default()
                };
                res.properties
                    .insert("seq".to_string(), Scalar::Int(n as i64));
                res
            }
        }

        for _ in 0..50 {
            let (proxy, _bridge) = connected(Arc::new(Counting(AtomicUsize::new(0))));
            let proxy = Arc::new(proxy);

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

    #[tokio::test(start_paused = true)]
    async fn test_fit_timeout_does_not_corrupt_next_call() {
        let worker = Arc::new(ScoredWorker::new(1.0, Duration::ZERO));
        let (proxy, bridge) = connected(worker);

        let err = proxy
            .fit(FitIns::default(), Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Timeout { .. }));
        assert!(err.is_recoverable());

        // Queued behind the slow fit on the worker; its reply must not be
        // mistaken for the late fit result.
        let res = proxy
            .get_parameters(GetParametersIns::default(), Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(res.parameters.tensors, vec![Bytes::from_static(b"w")]);
        assert_eq!(bridge.stale_replies_pending(), 0);
    }

    #[tokio::test]
    async fn test_non_ok_properties_do_not_update_cache() {
        struct Refusing;

        #[async_trait]
        impl Worker for Refusing {}

        let (proxy, _bridge) = connected(Arc::new(Refusing));

        let res = proxy
            .get_properties(GetPropertiesIns::default(), None)
            .await
            .unwrap();
        assert_eq!(res.status.code, Code::GetPropertiesNotImplemented);
        assert!(!proxy.properties().is_populated());
    }

    #[tokio::test]
    async fn test_mismatched_reply_is_malformed() {
        let bridge = Arc::new(Bridge::new(WorkerId::from("liar")));
        let proxy = StreamWorkerProxy::new(bridge.clone());

        let liar = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge.next_instruction().await.unwrap();
                bridge.deliver(Envelope::reply(EvaluateRes::default()));
            })
        };

        let err = proxy.fit(FitIns::default(), None).await.unwrap_err();
        match err {
            FleetError::MalformedResult {
                worker_id,
                expected,
                actual,
            } => {
                assert_eq!(worker_id.as_str(), "liar");
                assert_eq!(expected, "fit");
                assert_eq!(actual, "evaluate_res");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        liar.await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_closed_mid_call() {
        let bridge = Arc::new(Bridge::new(WorkerId::from("gone")));
        let proxy = StreamWorkerProxy::new(bridge.clone());

        let stream = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                bridge.next_instruction().await.unwrap();
                bridge.close();
            })
        };

        let err = proxy
            .evaluate(EvaluateIns::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Disconnected { .. }));
        stream.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconnect_returns_disconnect() {
        let (proxy, _bridge) = connected(Arc::new(ScoredWorker::new(0.0, Duration::ZERO)));

        let res = proxy
            .reconnect(ReconnectIns { seconds: Some(60) }, None)
            .await
            .unwrap();
        assert_eq!(res.reason, DisconnectReason::Reconnect);
    }
}
