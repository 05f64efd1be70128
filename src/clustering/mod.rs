//! 学生ベクトルのクラスタリング。
//!
//! Two K-Means variants are fitted side by side, scored, and one of them is
//! promoted to serve inference. See [`trainer::DualModelTrainer`] and
//! [`service::ClusterService`].

pub mod evaluation;
pub mod kmeans;
pub mod metrics;
pub mod report;
pub mod selection;
pub mod service;
pub mod store;
pub mod trainer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub use kmeans::{InitMethod, KMeansConfig, KMeansModel};

pub const DEFAULT_CLUSTER_COUNT: usize = 5;

/// Display names by cluster id.
pub const DEFAULT_CLUSTER_NAMES: [&str; DEFAULT_CLUSTER_COUNT] = [
    "Tech/Analytical",
    "Creative",
    "Business/Leadership",
    "Social/People",
    "Practical/Realistic",
];

/// Name for `cluster_id`, falling back to `"Cluster {id}"` past the end of `names`.
#[must_use]
pub fn cluster_name(names: &[String], cluster_id: usize) -> String {
    names
        .get(cluster_id)
        .cloned()
        .unwrap_or_else(|| format!("Cluster {cluster_id}"))
}

#[must_use]
pub fn default_cluster_names() -> Vec<String> {
    DEFAULT_CLUSTER_NAMES.iter().map(ToString::to_string).collect()
}

/// The two K-Means variants the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "kmeans_plus")]
    KMeansPlus,
    #[serde(rename = "kmeans_random")]
    KMeansRandom,
}

impl Algorithm {
    pub const ALL: [Self; 2] = [Self::KMeansPlus, Self::KMeansRandom];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KMeansPlus => "kmeans_plus",
            Self::KMeansRandom => "kmeans_random",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::KMeansPlus => "KMeans++",
            Self::KMeansRandom => "KMeans (Random)",
        }
    }

    #[must_use]
    pub fn config(self, n_clusters: usize) -> KMeansConfig {
        match self {
            Self::KMeansPlus => KMeansConfig::plus_plus(n_clusters),
            Self::KMeansRandom => KMeansConfig::random(n_clusters),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a training run decides which variant to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStrategy {
    /// Fit both variants and pick one with the weighted score.
    #[default]
    Auto,
    PinnedKMeansPlusPlus,
    PinnedRandom,
}

impl TrainingStrategy {
    /// Variants fitted under this strategy, in evaluation order.
    #[must_use]
    pub fn algorithms(self) -> &'static [Algorithm] {
        match self {
            Self::Auto => &Algorithm::ALL,
            Self::PinnedKMeansPlusPlus => &[Algorithm::KMeansPlus],
            Self::PinnedRandom => &[Algorithm::KMeansRandom],
        }
    }
}

impl FromStr for TrainingStrategy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "kmeans_plus" | "kmeans" => Ok(Self::PinnedKMeansPlusPlus),
            "kmeans_random" => Ok(Self::PinnedRandom),
            other => Err(EngineError::invalid(format!(
                "unknown clustering algorithm '{other}' \
                 (expected auto, kmeans_plus, kmeans or kmeans_random)"
            ))),
        }
    }
}
