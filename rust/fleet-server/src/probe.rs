//! Periodic refresh of worker properties.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Criterion, SamplingConfig, WorkerRegistry};

/// Counts from one probe pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub connected: usize,
    pub refreshed: usize,
    pub eligible: usize,
    pub ineligible: usize,
    pub undecided: usize,
}

/// Refresh every worker's properties, then screen the fleet.
pub async fn probe_once(
    registry: &WorkerRegistry,
    criterion: &dyn Criterion,
    threshold: f64,
    timeout: Duration,
) -> ProbeSummary {
    let refresh = registry.refresh_properties(timeout).await;
    let screening = registry.screen(criterion, threshold).await;

    let summary = ProbeSummary {
        connected: registry.num_available(),
        refreshed: refresh.updated,
        eligible: screening.eligible.len(),
        ineligible: screening.ineligible.len(),
        undecided: screening.failed.len(),
    };
    tracing::info!(
        connected = summary.connected,
        refreshed = summary.refreshed,
        eligible = summary.eligible,
        ineligible = summary.ineligible,
        undecided = summary.undecided,
        threshold,
        "fleet probed"
    );
    summary
}

/// Probe the fleet every `interval` until the task is dropped.
pub async fn run_probe(registry: Arc<WorkerRegistry>, sampling: SamplingConfig, interval: Duration) {
    let criterion = sampling.criterion.build();

    if !registry
        .wait_for(sampling.min_workers, sampling.wait_timeout())
        .await
    {
        tracing::warn!(
            min_workers = sampling.min_workers,
            connected = registry.num_available(),
            "probing before enough workers joined"
        );
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        probe_once(
            &registry,
            criterion.as_ref(),
            sampling.threshold,
            sampling.properties_timeout(),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use fleet_core::{
        GetPropertiesIns, GetPropertiesRes, InProcessWorkerProxy, Scalar, ScoreAbove, Status,
        Worker, WorkerId,
    };

    struct Battery(Option<f64>);

    #[async_trait]
    impl Worker for Battery {
        async fn get_properties(&self, _ins: GetPropertiesIns) -> GetPropertiesRes {
            let mut res = GetPropertiesRes {
                status: Status::ok(),
                ..Default::default()
            };
            if let Some(level) = self.0 {
                res.properties.insert("IE".to_string(), Scalar::Float(level));
            }
            res
        }
    }

    #[tokio::test]
    async fn test_probe_once_counts() {
        let registry = WorkerRegistry::new();
        for (id, level) in [("a", Some(0.9)), ("b", Some(0.1)), ("c", None)] {
            registry
                .register(Arc::new(InProcessWorkerProxy::new(
                    WorkerId::from(id),
                    Arc::new(Battery(level)),
                )))
                .await;
        }

        let summary = probe_once(
            &registry,
            &ScoreAbove::default(),
            0.5,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(
            summary,
            ProbeSummary {
                connected: 3,
                refreshed: 3,
                eligible: 1,
                ineligible: 1,
                undecided: 1,
            }
        );
    }
}
