/// エンジン全体で共有するエラー分類。
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the clustering core and its collaborators.
///
/// Metric-level failures are reported as [`EngineError::MetricComputation`] and
/// are expected to be downgraded to `None` fields by the evaluation layer;
/// everything else propagates to the caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("insufficient data: {samples} samples cannot form {clusters} clusters")]
    InsufficientData { samples: usize, clusters: usize },
    #[error("clustering model is not trained")]
    NotTrained,
    #[error("metric could not be computed: {0}")]
    MetricComputation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model store I/O failed for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model bundle could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn metric(message: impl Into<String>) -> Self {
        Self::MetricComputation(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
