//! デュアルモデル学習器。
//!
//! Fits the K-Means variants required by the [`TrainingStrategy`], evaluates each
//! one on the training matrix and decides which variant to serve.

use std::time::Instant;

use ndarray::{Array2, ArrayView2};

use super::evaluation::EvaluationRecord;
use super::kmeans::KMeansModel;
use super::selection::{SelectionResult, SelectionWeights};
use super::{Algorithm, DEFAULT_CLUSTER_COUNT, TrainingStrategy};
use crate::error::{EngineError, EngineResult};

/// Output of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub kmeans_plus: Option<KMeansModel>,
    pub kmeans_random: Option<KMeansModel>,
    pub selection: SelectionResult,
}

impl TrainingOutcome {
    #[must_use]
    pub fn model(&self, algorithm: Algorithm) -> Option<&KMeansModel> {
        match algorithm {
            Algorithm::KMeansPlus => self.kmeans_plus.as_ref(),
            Algorithm::KMeansRandom => self.kmeans_random.as_ref(),
        }
    }

    #[must_use]
    pub fn active_model(&self) -> Option<&KMeansModel> {
        self.model(self.selection.selected)
    }
}

/// Fits and compares the configured K-Means variants.
#[derive(Debug, Clone)]
pub struct DualModelTrainer {
    n_clusters: usize,
    strategy: TrainingStrategy,
    weights: SelectionWeights,
}

impl Default for DualModelTrainer {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_COUNT, TrainingStrategy::Auto)
    }
}

impl DualModelTrainer {
    #[must_use]
    pub fn new(n_clusters: usize, strategy: TrainingStrategy) -> Self {
        Self {
            n_clusters,
            strategy,
            weights: SelectionWeights::default(),
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: SelectionWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    #[must_use]
    pub fn strategy(&self) -> TrainingStrategy {
        self.strategy
    }

    /// Builds the sample matrix from row vectors.
    ///
    /// # Errors
    /// [`EngineError::InvalidInput`] for an empty input or rows of unequal length.
    pub fn matrix(rows: &[Vec<f64>]) -> EngineResult<Array2<f64>> {
        let first = rows
            .first()
            .ok_or_else(|| EngineError::invalid("training matrix has no rows"))?;
        let dim = first.len();
        if dim == 0 {
            return Err(EngineError::invalid("training vectors are empty"));
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != dim) {
            return Err(EngineError::invalid(format!(
                "row {idx} has {} features, expected {dim}",
                row.len()
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((rows.len(), dim), flat)
            .map_err(|error| EngineError::invalid(error.to_string()))
    }

    /// 戦略に従ってモデルを学習・評価し、採用モデルを決める。
    ///
    /// # Errors
    /// Propagates fitting failures. The caller is expected to have checked that the
    /// number of samples exceeds the cluster count.
    pub fn train(&self, data: ArrayView2<'_, f64>) -> EngineResult<TrainingOutcome> {
        let mut kmeans_plus = None;
        let mut kmeans_random = None;
        let mut plus_record = None;
        let mut random_record = None;

        for &algorithm in self.strategy.algorithms() {
            let (model, record) = self.fit_and_evaluate(algorithm, data)?;
            match algorithm {
                Algorithm::KMeansPlus => {
                    kmeans_plus = Some(model);
                    plus_record = Some(record);
                }
                Algorithm::KMeansRandom => {
                    kmeans_random = Some(model);
                    random_record = Some(record);
                }
            }
        }

        let selection = match (plus_record, random_record) {
            (Some(plus), Some(random)) => SelectionResult::compare(&self.weights, plus, random),
            (Some(plus), None) => SelectionResult::pinned(Algorithm::KMeansPlus, plus),
            (None, Some(random)) => SelectionResult::pinned(Algorithm::KMeansRandom, random),
            (None, None) => {
                return Err(EngineError::invalid("training strategy selected no algorithm"));
            }
        };

        tracing::info!(
            strategy = ?self.strategy,
            selected = %selection.selected,
            plus_total = selection.kmeans_plus_score.map(|s| s.total),
            random_total = selection.kmeans_random_score.map(|s| s.total),
            "clustering model selected"
        );

        Ok(TrainingOutcome {
            kmeans_plus,
            kmeans_random,
            selection,
        })
    }

    fn fit_and_evaluate(
        &self,
        algorithm: Algorithm,
        data: ArrayView2<'_, f64>,
    ) -> EngineResult<(KMeansModel, EvaluationRecord)> {
        let started = Instant::now();
        let model = KMeansModel::fit(algorithm.config(self.n_clusters), data)?;
        let training_time = started.elapsed().as_secs_f64();

        let record = EvaluationRecord::evaluate(&model, data, training_time);
        tracing::info!(
            algorithm = %algorithm,
            training_time,
            inertia = model.inertia(),
            n_iter = model.n_iter(),
            silhouette = record.silhouette,
            calinski_harabasz = record.calinski_harabasz,
            davies_bouldin = record.davies_bouldin,
            dunn_index = record.dunn_index,
            "clustering model evaluated"
        );
        Ok((model, record))
    }
}
