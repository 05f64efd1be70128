/// Prometheusメトリクス定義。
use std::sync::Arc;

use prometheus::{
    Counter, Histogram, Registry, histogram_opts, register_counter_with_registry,
    register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub training_runs: Counter,
    pub training_failures: Counter,
    pub predictions: Counter,
    pub not_trained_requests: Counter,
    pub recommendations: Counter,

    // ヒストグラム
    pub training_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            training_runs: register_counter_with_registry!(
                "career_engine_training_runs_total",
                "Total number of clustering training runs",
                registry
            )?,
            training_failures: register_counter_with_registry!(
                "career_engine_training_failures_total",
                "Total number of failed clustering training runs",
                registry
            )?,
            predictions: register_counter_with_registry!(
                "career_engine_predictions_total",
                "Total number of cluster predictions served",
                registry
            )?,
            not_trained_requests: register_counter_with_registry!(
                "career_engine_not_trained_requests_total",
                "Number of inference requests rejected because no model was trained",
                registry
            )?,
            recommendations: register_counter_with_registry!(
                "career_engine_recommendations_total",
                "Total number of career rankings produced",
                registry
            )?,
            training_duration: register_histogram_with_registry!(
                histogram_opts!(
                    "career_engine_training_duration_seconds",
                    "Wall-clock duration of a full dual-model training run",
                    vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
                ),
                registry
            )?,
        })
    }
}
