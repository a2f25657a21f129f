//! Registry of connected workers.
//!
//! Holds one [`WorkerProxy`] per connected worker and offers the
//! orchestrator's view of the fleet: waiting for enough workers, refreshing
//! their properties, screening them against a [`Criterion`] and sampling a
//! round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::seq::SliceRandom;
use tokio::sync::{watch, RwLock};

use crate::criterion::Criterion;
use crate::error::{FleetError, Result};
use crate::protocol::{GetPropertiesIns, WorkerId};
use crate::proxy::WorkerProxy;

/// Outcome of applying a criterion to every registered worker.
#[derive(Default)]
pub struct Screening {
    pub eligible: Vec<Arc<dyn WorkerProxy>>,
    pub ineligible: Vec<Arc<dyn WorkerProxy>>,
    /// Workers whose properties could not be judged.
    pub failed: Vec<(Arc<dyn WorkerProxy>, FleetError)>,
}

impl std::fmt::Debug for Screening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screening")
            .field("eligible", &self.eligible.len())
            .field("ineligible", &self.ineligible.len())
            .field("failed", &self.failed.len())
            .finish()
    }
}

/// Result of refreshing the properties of the whole fleet.
#[derive(Debug, Default)]
pub struct Refresh {
    pub updated: usize,
    pub failed: Vec<(WorkerId, FleetError)>,
}

pub struct WorkerRegistry {
    workers: RwLock<HashMap<WorkerId, Arc<dyn WorkerProxy>>>,
    count: watch::Sender<usize>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            workers: RwLock::new(HashMap::new()),
            count,
        }
    }

    /// Register a worker. Returns false if it replaced one with the same id.
    pub async fn register(&self, proxy: Arc<dyn WorkerProxy>) -> bool {
        let mut workers = self.workers.write().await;
        let id = proxy.id().clone();
        let fresh = workers.insert(id.clone(), proxy).is_none();
        self.count.send_replace(workers.len());
        tracing::info!(worker_id = %id, connected = workers.len(), "worker registered");
        fresh
    }

    pub async fn unregister(&self, worker_id: &WorkerId) -> bool {
        let mut workers = self.workers.write().await;
        let removed = workers.remove(worker_id).is_some();
        if removed {
            self.count.send_replace(workers.len());
            tracing::info!(worker_id = %worker_id, connected = workers.len(), "worker unregistered");
        }
        removed
    }

    pub async fn get(&self, worker_id: &WorkerId) -> Option<Arc<dyn WorkerProxy>> {
        let workers = self.workers.read().await;
        workers.get(worker_id).cloned()
    }

    pub async fn all(&self) -> Vec<Arc<dyn WorkerProxy>> {
        let workers = self.workers.read().await;
        workers.values().cloned().collect()
    }

    pub fn num_available(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until at least `num` workers are registered.
    ///
    /// Returns false if `timeout` passes first.
    pub async fn wait_for(&self, num: usize, timeout: Duration) -> bool {
        let mut count = self.count.subscribe();
        let reached = tokio::time::timeout(timeout, count.wait_for(|n| *n >= num)).await;
        matches!(reached, Ok(Ok(_)))
    }

    /// Fetch properties from every worker concurrently.
    ///
    /// Each proxy updates its own cache; failures are collected, not raised.
    pub async fn refresh_properties(&self, timeout: Duration) -> Refresh {
        let workers = self.all().await;
        let calls = workers.iter().map(|proxy| async move {
            let outcome = proxy
                .get_properties(GetPropertiesIns::default(), Some(timeout))
                .await;
            (proxy.id().clone(), outcome)
        });

        let mut refresh = Refresh::default();
        for (worker_id, outcome) in join_all(calls).await {
            match outcome {
                Ok(res) if res.status.is_ok() => refresh.updated += 1,
                Ok(res) => tracing::debug!(
                    worker_id = %worker_id,
                    code = ?res.status.code,
                    "worker declined to share properties"
                ),
                Err(e) => {
                    tracing::warn!(worker_id = %worker_id, error = %e, "property refresh failed");
                    refresh.failed.push((worker_id, e));
                }
            }
        }
        refresh
    }

    /// Partition registered workers by the criterion's verdict on their
    /// cached properties.
    pub async fn screen(&self, criterion: &dyn Criterion, threshold: f64) -> Screening {
        let mut screening = Screening::default();
        for proxy in self.all().await {
            match criterion.select_worker(proxy.as_ref(), threshold) {
                Ok(true) => screening.eligible.push(proxy),
                Ok(false) => screening.ineligible.push(proxy),
                Err(e) => screening.failed.push((proxy, e)),
            }
        }
        screening
    }

    /// Pick `num` distinct workers uniformly at random, optionally only
    /// among those the criterion accepts.
    ///
    /// Returns an empty list if fewer than `num` workers qualify. Workers
    /// the criterion cannot judge are skipped.
    pub async fn sample(
        &self,
        num: usize,
        filter: Option<(&dyn Criterion, f64)>,
    ) -> Vec<Arc<dyn WorkerProxy>> {
        self.sample_exact(num, filter).await.unwrap_or_default()
    }

    /// Like [`sample`](Self::sample), but fails instead of returning an
    /// empty round.
    ///
    /// # Errors
    ///
    /// `InsufficientWorkers` if fewer than `num` workers qualify.
    pub async fn sample_exact(
        &self,
        num: usize,
        filter: Option<(&dyn Criterion, f64)>,
    ) -> Result<Vec<Arc<dyn WorkerProxy>>> {
        let candidates = match filter {
            Some((criterion, threshold)) => {
                let screening = self.screen(criterion, threshold).await;
                for (proxy, e) in &screening.failed {
                    tracing::warn!(worker_id = %proxy.id(), error = %e, "worker skipped by criterion");
                }
                screening.eligible
            }
            None => self.all().await,
        };

        if candidates.len() < num {
            tracing::info!(
                requested = num,
                available = candidates.len(),
                "not enough eligible workers to sample"
            );
            return Err(FleetError::insufficient_workers(num, candidates.len()));
        }

        let mut rng = rand::thread_rng();
        Ok(candidates
            .choose_multiple(&mut rng, num)
            .cloned()
            .collect())
    }
}
