//! 推論ファサード。
//!
//! Readers take a cheap [`Arc`] snapshot of the current [`PersistedState`]. A
//! training run builds a complete replacement, persists it, and swaps the pointer
//! under the write lock, so a reader never observes a partially trained state.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use ndarray::{Array1, Array2};
use tracing::{info, warn};

use super::kmeans::KMeansModel;
use super::selection::SelectionResult;
use super::store::{ModelStore, PersistedState};
use super::trainer::DualModelTrainer;
use super::{Algorithm, TrainingStrategy, cluster_name};
use crate::error::{EngineError, EngineResult};
use crate::observability::metrics::Metrics;
use crate::profile::conform_to_dim;

/// Cluster assignment for one vector.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClusterAssignment {
    pub cluster_id: usize,
    pub cluster_name: String,
}

pub struct ClusterService {
    trainer: DualModelTrainer,
    store: ModelStore,
    state: RwLock<Arc<PersistedState>>,
    training: Mutex<()>,
    metrics: Option<Arc<Metrics>>,
}

impl ClusterService {
    #[must_use]
    pub fn new(trainer: DualModelTrainer, store: ModelStore) -> Self {
        let state = PersistedState::empty(trainer.n_clusters(), trainer.strategy());
        Self {
            trainer,
            store,
            state: RwLock::new(Arc::new(state)),
            training: Mutex::new(()),
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.trainer.n_clusters()
    }

    #[must_use]
    pub fn strategy(&self) -> TrainingStrategy {
        self.trainer.strategy()
    }

    #[must_use]
    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// 現在の状態のスナップショット。
    #[must_use]
    pub fn snapshot(&self) -> Arc<PersistedState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn swap(&self, next: PersistedState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }

    /// Restores the persisted bundle, if any. Returns whether a model was loaded.
    ///
    /// # Errors
    /// Propagates store read and decode failures.
    pub fn load_from_store(&self) -> EngineResult<bool> {
        let Some(state) = self.store.load()? else {
            return Ok(false);
        };
        let trained = state.is_trained();
        if let Some(model) = state.active_model() {
            if model.n_clusters() != self.trainer.n_clusters() {
                warn!(
                    stored = model.n_clusters(),
                    configured = self.trainer.n_clusters(),
                    "stored model cluster count differs from configuration"
                );
            }
        }
        info!(active = ?state.active, trained, "model bundle restored");
        self.swap(state);
        Ok(trained)
    }

    /// 学習・保存・差し替えを行う。学習は同時に一つだけ実行される。
    ///
    /// # Errors
    /// [`EngineError::InsufficientData`] when there are not more samples than clusters,
    /// [`EngineError::InvalidInput`] for ragged rows, plus fit and store failures.
    /// On error the previously served state is left untouched.
    pub fn train(&self, vectors: &[Vec<f64>]) -> EngineResult<Arc<PersistedState>> {
        let _training = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();
        if let Some(metrics) = &self.metrics {
            metrics.training_runs.inc();
        }

        let result = self.train_locked(vectors);

        if let Some(metrics) = &self.metrics {
            metrics
                .training_duration
                .observe(started.elapsed().as_secs_f64());
            if result.is_err() {
                metrics.training_failures.inc();
            }
        }
        result
    }

    fn train_locked(&self, vectors: &[Vec<f64>]) -> EngineResult<Arc<PersistedState>> {
        let n_clusters = self.trainer.n_clusters();
        if vectors.len() <= n_clusters {
            return Err(EngineError::InsufficientData {
                samples: vectors.len(),
                clusters: n_clusters,
            });
        }
        let data = DualModelTrainer::matrix(vectors)?;
        let outcome = self.trainer.train(data.view())?;
        let state = PersistedState::from_outcome(outcome, self.trainer.strategy());

        self.store.save(&state)?;
        self.swap(state);
        info!(
            samples = vectors.len(),
            n_clusters,
            active = ?self.active_algorithm(),
            "clustering model trained and activated"
        );
        Ok(self.snapshot())
    }

    /// `None` when nothing is trained.
    #[must_use]
    pub fn active_algorithm(&self) -> Option<Algorithm> {
        let state = self.snapshot();
        state.active.filter(|_| state.is_trained())
    }

    fn with_active_model<T>(
        &self,
        f: impl FnOnce(&PersistedState, &KMeansModel) -> T,
    ) -> EngineResult<T> {
        let state = self.snapshot();
        match state.active_model() {
            Some(model) => Ok(f(&state, model)),
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.not_trained_requests.inc();
                }
                Err(EngineError::NotTrained)
            }
        }
    }

    /// Assigns `vector` to a cluster. Vectors of other lengths are zero-padded or truncated.
    ///
    /// # Errors
    /// [`EngineError::InvalidInput`] for NaN or infinite components,
    /// [`EngineError::NotTrained`] when no model is active.
    pub fn predict(&self, vector: &[f64]) -> EngineResult<ClusterAssignment> {
        ensure_finite(vector)?;
        let assignment = self.with_active_model(|state, model| {
            let point = Array1::from(conform_to_dim(vector, model.n_features()));
            let cluster_id = model.predict(point.view());
            ClusterAssignment {
                cluster_id,
                cluster_name: cluster_name(&state.cluster_names, cluster_id),
            }
        })?;
        if let Some(metrics) = &self.metrics {
            metrics.predictions.inc();
        }
        Ok(assignment)
    }

    /// One-hot "probabilities": K-Means has no soft assignment.
    ///
    /// # Errors
    /// [`EngineError::InvalidInput`] for NaN or infinite components,
    /// [`EngineError::NotTrained`] when no model is active.
    pub fn predict_probabilities(&self, vector: &[f64]) -> EngineResult<Vec<f64>> {
        ensure_finite(vector)?;
        self.with_active_model(|_, model| {
            let point = Array1::from(conform_to_dim(vector, model.n_features()));
            let cluster_id = model.predict(point.view());
            let mut probabilities = vec![0.0; model.n_clusters()];
            probabilities[cluster_id] = 1.0;
            probabilities
        })
    }

    /// # Errors
    /// [`EngineError::NotTrained`] when no model is active.
    pub fn cluster_centers(&self) -> EngineResult<Array2<f64>> {
        self.with_active_model(|_, model| model.centers().to_owned())
    }

    /// 比較結果一式。未学習なら `None`。
    #[must_use]
    pub fn metrics(&self) -> Option<SelectionResult> {
        self.snapshot().selection.clone()
    }

    #[must_use]
    pub fn cluster_names(&self) -> Vec<String> {
        self.snapshot().cluster_names.clone()
    }
}

fn ensure_finite(vector: &[f64]) -> EngineResult<()> {
    match vector.iter().position(|value| !value.is_finite()) {
        Some(idx) => Err(EngineError::invalid(format!("vector element {idx} is not finite"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &tempfile::TempDir, strategy: TrainingStrategy) -> ClusterService {
        ClusterService::new(
            DualModelTrainer::new(2, strategy),
            ModelStore::new(dir.path().join("model.json")),
        )
    }

    fn vectors() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.1, 0.0],
            vec![0.1, 0.0, 0.1],
            vec![0.0, 0.0, 0.1],
            vec![0.9, 1.0, 0.9],
            vec![1.0, 0.9, 1.0],
            vec![1.0, 1.0, 0.9],
        ]
    }

    #[test]
    fn untrained_service_rejects_inference() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir, TrainingStrategy::Auto);

        assert_eq!(service.active_algorithm(), None);
        assert!(matches!(service.predict(&[0.0; 3]), Err(EngineError::NotTrained)));
        assert!(matches!(
            service.predict_probabilities(&[0.0; 3]),
            Err(EngineError::NotTrained)
        ));
        assert!(service.cluster_centers().is_err());
        assert!(service.metrics().is_none());
    }

    #[test]
    fn too_few_samples_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir, TrainingStrategy::Auto);
        let error = service.train(&vectors()[..2]).unwrap_err();
        assert!(matches!(
            error,
            EngineError::InsufficientData {
                samples: 2,
                clusters: 2
            }
        ));
        assert!(!dir.path().join("model.json").exists());
    }

    #[test]
    fn train_activates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir, TrainingStrategy::PinnedKMeansPlusPlus);
        service.train(&vectors()).unwrap();

        assert_eq!(service.active_algorithm(), Some(Algorithm::KMeansPlus));
        let low = service.predict(&[0.0, 0.0, 0.0]).unwrap();
        let high = service.predict(&[1.0, 1.0, 1.0, 5.0]).unwrap();
        assert_ne!(low.cluster_id, high.cluster_id);
        assert_eq!(service.cluster_centers().unwrap().dim(), (2, 3));

        let restored = ClusterService::new(
            DualModelTrainer::new(2, TrainingStrategy::Auto),
            ModelStore::new(dir.path().join("model.json")),
        );
        assert!(restored.load_from_store().unwrap());
        assert_eq!(restored.predict(&[0.0, 0.0, 0.0]).unwrap(), low);
    }

    #[test]
    fn probabilities_are_one_hot() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir, TrainingStrategy::Auto);
        service.train(&vectors()).unwrap();

        let probabilities = service.predict_probabilities(&[0.95, 0.95]).unwrap();
        assert_eq!(probabilities.len(), 2);
        assert_eq!(probabilities.iter().sum::<f64>(), 1.0);
        assert_eq!(probabilities.iter().filter(|p| **p == 1.0).count(), 1);
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir, TrainingStrategy::Auto);
        service.train(&vectors()).unwrap();

        for vector in [
            vec![f64::NAN, 0.5, 0.5],
            vec![f64::INFINITY; 3],
            vec![0.1, f64::NEG_INFINITY],
        ] {
            assert!(matches!(
                service.predict(&vector),
                Err(EngineError::InvalidInput(_))
            ));
            assert!(matches!(
                service.predict_probabilities(&vector),
                Err(EngineError::InvalidInput(_))
            ));
        }
        assert!(service.predict(&[0.1, 0.1, 0.1]).is_ok());
    }

    #[test]
    fn not_trained_requests_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(prometheus::Registry::new());
        let metrics = Arc::new(Metrics::new(registry).unwrap());
        let service = service(&dir, TrainingStrategy::Auto).with_metrics(Arc::clone(&metrics));

        let _ = service.predict(&[0.0]);
        let _ = service.predict_probabilities(&[0.0]);
        let _ = service.cluster_centers();
        assert_eq!(metrics.not_trained_requests.get(), 3.0);

        service.train(&vectors()).unwrap();
        service.predict(&[0.0]).unwrap();
        assert_eq!(metrics.predictions.get(), 1.0);
        assert_eq!(metrics.training_runs.get(), 1.0);
    }
}
