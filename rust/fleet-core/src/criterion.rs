//! Eligibility criteria for sampling workers.
//!
//! A [`Criterion`] decides, from a worker's cached properties and a numeric
//! threshold, whether the worker may be sampled into a round. Criteria are
//! stateless; the orchestrator picks one through [`CriterionConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};
use crate::properties::Properties;
use crate::proxy::WorkerProxy;

/// Property read by the default criterion.
pub const DEFAULT_SCORE_KEY: &str = "IE";

/// Trait for eligibility strategies.
pub trait Criterion: Send + Sync + fmt::Debug {
    /// Decide whether a worker with `properties` is eligible.
    ///
    /// # Errors
    ///
    /// `MissingProperty` if a property the strategy needs is absent,
    /// `InvalidProperty` if it is not numeric.
    fn select(&self, properties: &Properties, threshold: f64) -> Result<bool>;

    /// Apply the criterion to a proxy's cached properties.
    fn select_worker(&self, worker: &dyn WorkerProxy, threshold: f64) -> Result<bool> {
        let snapshot = worker.properties();
        let span = tracing::debug_span!(
            "criterion",
            worker_id = %worker.id(),
            properties_version = snapshot.version
        );
        let _entered = span.enter();
        self.select(&snapshot.values, threshold)
    }
}

fn score(properties: &Properties, key: &str) -> Result<f64> {
    let value = properties.get(key).ok_or_else(|| {
        tracing::warn!(key, "score property missing");
        FleetError::missing_property(key)
    })?;
    value
        .as_f64()
        .ok_or_else(|| FleetError::invalid_property(key, value.type_name()))
}

/// Eligible when the score strictly exceeds the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreAbove {
    key: String,
}

impl ScoreAbove {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for ScoreAbove {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE_KEY)
    }
}

impl Criterion for ScoreAbove {
    fn select(&self, properties: &Properties, threshold: f64) -> Result<bool> {
        let score = score(properties, &self.key)?;
        let eligible = score > threshold;
        tracing::info!(key = %self.key, score, threshold, eligible, "eligibility decided");
        Ok(eligible)
    }
}

/// Eligible when the score is strictly below the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBelow {
    key: String,
}

impl ScoreBelow {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Criterion for ScoreBelow {
    fn select(&self, properties: &Properties, threshold: f64) -> Result<bool> {
        let score = score(properties, &self.key)?;
        let eligible = score < threshold;
        tracing::info!(key = %self.key, score, threshold, eligible, "eligibility decided");
        Ok(eligible)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Criterion for AcceptAll {
    fn select(&self, _properties: &Properties, _threshold: f64) -> Result<bool> {
        Ok(true)
    }
}

/// Eligible when every inner criterion is. Errors from any inner criterion
/// are returned as-is.
#[derive(Debug)]
pub struct AllOf(pub Vec<Box<dyn Criterion>>);

impl Criterion for AllOf {
    fn select(&self, properties: &Properties, threshold: f64) -> Result<bool> {
        for criterion in &self.0 {
            if !criterion.select(properties, threshold)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Eligible when at least one inner criterion is.
#[derive(Debug)]
pub struct AnyOf(pub Vec<Box<dyn Criterion>>);

impl Criterion for AnyOf {
    fn select(&self, properties: &Properties, threshold: f64) -> Result<bool> {
        for criterion in &self.0 {
            if criterion.select(properties, threshold)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn default_score_key() -> String {
    DEFAULT_SCORE_KEY.to_string()
}

/// Criterion selection as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CriterionConfig {
    ScoreAbove {
        #[serde(default = "default_score_key")]
        key: String,
    },
    ScoreBelow {
        #[serde(default = "default_score_key")]
        key: String,
    },
    AcceptAll,
    AllOf {
        criteria: Vec<CriterionConfig>,
    },
    AnyOf {
        criteria: Vec<CriterionConfig>,
    },
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self::ScoreAbove {
            key: default_score_key(),
        }
    }
}

impl CriterionConfig {
    pub fn build(&self) -> Box<dyn Criterion> {
        match self {
            Self::ScoreAbove { key } => Box::new(ScoreAbove::new(key.clone())),
            Self::ScoreBelow { key } => Box::new(ScoreBelow::new(key.clone())),
            Self::AcceptAll => Box::new(AcceptAll),
            Self::AllOf { criteria } => Box::new(AllOf(criteria.iter().map(Self::build).collect())),
            Self::AnyOf { criteria } => Box::new(AnyOf(criteria.iter().map(Self::build).collect())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::ScoreAbove { key } | Self::ScoreBelow { key } => {
                if key.is_empty() {
                    return Err(FleetError::config(
                        "sampling.criterion.key must not be empty",
                    ));
                }
                Ok(())
            }
            Self::AcceptAll => Ok(()),
            Self::AllOf { criteria } | Self::AnyOf { criteria } => {
                if criteria.is_empty() {
                    return Err(FleetError::config(
                        "composite criterion needs at least one member",
                    ));
                }
                criteria.iter().try_for_each(Self::validate)
            }
        }
    }

    /// Point every score-based member at `key`.
    pub fn set_score_key(&mut self, new_key: &str) {
        match self {
            Self::ScoreAbove { key } | Self::ScoreBelow { key } => *key = new_key.to_string(),
            Self::AcceptAll => {}
            Self::AllOf { criteria } | Self::AnyOf { criteria } => {
                for criterion in criteria {
                    criterion.set_score_key(new_key);
                }
            }
        }
    }
}
