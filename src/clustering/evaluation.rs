//! Per-model evaluation record.

use std::time::Instant;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kmeans::KMeansModel;
use super::metrics;

/// 予測レイテンシ計測に使う最大サンプル数。
pub const LATENCY_SAMPLE_LIMIT: usize = 100;

/// Seeded fits are deterministic, so stability is a constant.
pub const DETERMINISTIC_STABILITY: f64 = 1.0;

/// Metrics bundle for one fitted model.
///
/// Quality metrics that could not be computed for a degenerate labelling are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub silhouette: Option<f64>,
    pub calinski_harabasz: Option<f64>,
    pub davies_bouldin: Option<f64>,
    pub dunn_index: f64,
    /// Seconds.
    pub training_time: f64,
    /// Average milliseconds per sample.
    pub prediction_time_ms: f64,
    pub inter_cluster_distance: f64,
    pub intra_cluster_variance: Option<f64>,
    pub cluster_stability: f64,
    pub inertia: Option<f64>,
    pub n_iter: Option<usize>,
    pub n_clusters: usize,
    pub n_samples: usize,
}

impl EvaluationRecord {
    /// Scores `model` against the matrix it was trained on.
    #[must_use]
    pub fn evaluate(model: &KMeansModel, data: ArrayView2<'_, f64>, training_time: f64) -> Self {
        let labels = model.predict_batch(data);

        let silhouette = metrics::silhouette_score(data, &labels)
            .inspect_err(|error| debug!(error = %error, "silhouette skipped"))
            .ok();
        let calinski_harabasz = metrics::calinski_harabasz_score(data, &labels)
            .inspect_err(|error| debug!(error = %error, "calinski-harabasz skipped"))
            .ok();
        let davies_bouldin = metrics::davies_bouldin_score(data, &labels)
            .inspect_err(|error| debug!(error = %error, "davies-bouldin skipped"))
            .ok();

        Self {
            silhouette,
            calinski_harabasz,
            davies_bouldin,
            dunn_index: metrics::dunn_index(data, &labels),
            training_time,
            prediction_time_ms: average_prediction_ms(model, data),
            inter_cluster_distance: metrics::inter_cluster_distance(model.centers()),
            intra_cluster_variance: metrics::intra_cluster_variance(data, &labels),
            cluster_stability: DETERMINISTIC_STABILITY,
            inertia: Some(model.inertia()),
            n_iter: Some(model.n_iter()),
            n_clusters: model.n_clusters(),
            n_samples: data.nrows(),
        }
    }
}

fn average_prediction_ms(model: &KMeansModel, data: ArrayView2<'_, f64>) -> f64 {
    let sample = data.nrows().min(LATENCY_SAMPLE_LIMIT);
    if sample == 0 {
        return 0.0;
    }
    let started = Instant::now();
    for row in data.outer_iter().take(sample) {
        std::hint::black_box(model.predict(row));
    }
    started.elapsed().as_secs_f64() * 1000.0 / sample as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::KMeansConfig;
    use ndarray::array;

    #[test]
    fn record_is_complete_for_a_healthy_fit() {
        let data = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.2],
            [4.0, 4.0],
            [4.1, 4.2],
            [4.2, 4.1],
        ];
        let model = KMeansModel::fit(KMeansConfig::plus_plus(2), data.view()).unwrap();
        let record = EvaluationRecord::evaluate(&model, data.view(), 0.01);

        assert!(record.silhouette.unwrap() > 0.9);
        assert!(record.calinski_harabasz.is_some());
        assert!(record.davies_bouldin.is_some());
        assert!(record.dunn_index > 1.0);
        assert!(record.intra_cluster_variance.is_some());
        assert_eq!(record.cluster_stability, 1.0);
        assert_eq!(record.n_clusters, 2);
        assert_eq!(record.n_samples, 6);
        assert!(record.prediction_time_ms >= 0.0);
    }

    #[test]
    fn degenerate_fit_degrades_to_none() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let model = KMeansModel::fit(KMeansConfig::random(2), data.view()).unwrap();
        let record = EvaluationRecord::evaluate(&model, data.view(), 0.0);

        // every point lands in cluster 0
        assert!(record.silhouette.is_none());
        assert!(record.calinski_harabasz.is_none());
        assert!(record.davies_bouldin.is_none());
        assert_eq!(record.dunn_index, 0.0);
        assert_eq!(record.inertia, Some(0.0));
    }
}
