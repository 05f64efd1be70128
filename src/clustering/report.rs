//! モデル統計レポート。
//!
//! Summarises the active model over the student population: cluster sizes,
//! center statistics, quality metrics with a coarse interpretation, external
//! agreement with the RIASEC-dominant pseudo ground truth, the dual-model
//! comparison and elbow data.

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use super::evaluation::EvaluationRecord;
use super::kmeans::{KMeansConfig, KMeansModel};
use super::metrics::{self, ExternalMetrics};
use super::store::PersistedState;
use super::{Algorithm, cluster_name};
use crate::error::{EngineError, EngineResult};
use crate::profile::conform_to_dim;

pub const GROUND_TRUTH_TYPE: &str = "riasec_dominant";

/// Elbow data is only produced above this many students.
pub const ELBOW_MIN_SAMPLES: usize = 10;
pub const ELBOW_MAX_K: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interpretation {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Interpretation {
    #[must_use]
    pub fn silhouette(value: f64) -> Self {
        if value > 0.7 {
            Self::Excellent
        } else if value > 0.5 {
            Self::Good
        } else if value > 0.25 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    #[must_use]
    pub fn davies_bouldin(value: f64) -> Self {
        if value < 1.0 {
            Self::Good
        } else if value < 2.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    #[must_use]
    pub fn dunn(value: f64) -> Self {
        if value > 1.0 {
            Self::Excellent
        } else if value > 0.5 {
            Self::Good
        } else if value > 0.2 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// ARI, NMI and FMI share the same bands.
    #[must_use]
    pub fn external(value: f64) -> Self {
        if value > 0.7 {
            Self::Excellent
        } else if value > 0.5 {
            Self::Good
        } else if value > 0.3 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatedValue {
    pub value: f64,
    pub interpretation: Interpretation,
}

impl RatedValue {
    fn rate(value: Option<f64>, rule: fn(f64) -> Interpretation) -> Option<Self> {
        value.map(|value| Self {
            value,
            interpretation: rule(value),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSize {
    pub cluster_id: usize,
    pub cluster_name: String,
    pub count: usize,
    /// Percentage of students, one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenterSummary {
    pub cluster_id: usize,
    pub cluster_name: String,
    pub center: Vec<f64>,
    pub norm: f64,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub silhouette: Option<RatedValue>,
    pub calinski_harabasz: Option<f64>,
    pub davies_bouldin: Option<RatedValue>,
    pub dunn_index: RatedValue,
    pub inertia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalReport {
    pub adjusted_rand_index: Option<RatedValue>,
    pub normalized_mutual_info: Option<RatedValue>,
    pub fowlkes_mallows_index: Option<RatedValue>,
    pub ground_truth_type: &'static str,
    pub labeled_students: usize,
}

impl ExternalReport {
    fn from_metrics(metrics: ExternalMetrics, labeled_students: usize) -> Self {
        Self {
            adjusted_rand_index: RatedValue::rate(
                metrics.adjusted_rand_index,
                Interpretation::external,
            ),
            normalized_mutual_info: RatedValue::rate(
                metrics.normalized_mutual_info,
                Interpretation::external,
            ),
            fowlkes_mallows_index: RatedValue::rate(
                metrics.fowlkes_mallows_index,
                Interpretation::external,
            ),
            ground_truth_type: GROUND_TRUTH_TYPE,
            labeled_students,
        }
    }
}

/// 二つのモデルの比較サマリー。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub winner: &'static str,
    /// Absolute silhouette difference.
    pub quality_difference: f64,
    pub speed_advantage: &'static str,
    pub speed_difference_seconds: f64,
}

impl ComparisonSummary {
    fn new(selected: Algorithm, plus: &EvaluationRecord, random: &EvaluationRecord) -> Self {
        let faster = if plus.training_time < random.training_time {
            Algorithm::KMeansPlus
        } else {
            Algorithm::KMeansRandom
        };
        Self {
            winner: selected.display_name(),
            quality_difference: (plus.silhouette.unwrap_or(0.0) - random.silhouette.unwrap_or(0.0))
                .abs(),
            speed_advantage: faster.display_name(),
            speed_difference_seconds: (plus.training_time - random.training_time).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
    /// `None` when the fit collapses to a single populated cluster.
    pub silhouette: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub active_algorithm: Algorithm,
    pub n_students: usize,
    pub n_clusters: usize,
    pub cluster_sizes: Vec<ClusterSize>,
    pub centers: Vec<CenterSummary>,
    pub metrics: QualityReport,
    pub external: Option<ExternalReport>,
    pub comparison: Option<ComparisonSummary>,
    pub elbow: Vec<ElbowPoint>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

impl ModelReport {
    /// 学習済み状態と学生ベクトルからレポートを組み立てる。
    ///
    /// # Errors
    /// [`EngineError::NotTrained`] without an active model,
    /// [`EngineError::InsufficientData`] when `students` is empty.
    pub fn build(state: &PersistedState, students: &[Vec<f64>]) -> EngineResult<Self> {
        let (Some(algorithm), Some(model)) = (state.active, state.active_model()) else {
            return Err(EngineError::NotTrained);
        };
        if students.is_empty() {
            return Err(EngineError::InsufficientData {
                samples: 0,
                clusters: model.n_clusters(),
            });
        }

        let dim = model.n_features();
        let flat: Vec<f64> = students
            .iter()
            .flat_map(|vector| conform_to_dim(vector, dim))
            .collect();
        let data = Array2::from_shape_vec((students.len(), dim), flat)
            .map_err(|error| EngineError::invalid(error.to_string()))?;
        let labels = model.predict_batch(data.view());

        let stored = state.selection.as_ref().and_then(|s| s.record(algorithm));
        let metrics = match stored {
            Some(record) => quality_from_record(record),
            None => {
                // 比較結果を持たない（旧形式の）バンドルはその場で計算する
                let record = EvaluationRecord::evaluate(model, data.view(), 0.0);
                quality_from_record(&record)
            }
        };

        let comparison = state.selection.as_ref().and_then(|selection| {
            match (&selection.kmeans_plus, &selection.kmeans_random) {
                (Some(plus), Some(random)) => {
                    Some(ComparisonSummary::new(selection.selected, plus, random))
                }
                _ => None,
            }
        });

        let elbow = if students.len() > ELBOW_MIN_SAMPLES {
            elbow_curve(data.view())?
        } else {
            Vec::new()
        };

        Ok(Self {
            active_algorithm: algorithm,
            n_students: students.len(),
            n_clusters: model.n_clusters(),
            cluster_sizes: cluster_sizes(&labels, model.n_clusters(), &state.cluster_names),
            centers: center_summaries(model, &state.cluster_names),
            metrics,
            external: external_report(model, students),
            comparison,
            elbow,
        })
    }
}

fn quality_from_record(record: &EvaluationRecord) -> QualityReport {
    QualityReport {
        silhouette: RatedValue::rate(record.silhouette, Interpretation::silhouette),
        calinski_harabasz: record.calinski_harabasz,
        davies_bouldin: RatedValue::rate(record.davies_bouldin, Interpretation::davies_bouldin),
        dunn_index: RatedValue {
            value: record.dunn_index,
            interpretation: Interpretation::dunn(record.dunn_index),
        },
        inertia: record.inertia.unwrap_or_default(),
    }
}

fn cluster_sizes(labels: &[usize], n_clusters: usize, names: &[String]) -> Vec<ClusterSize> {
    let mut counts = vec![0_usize; n_clusters];
    for label in labels {
        counts[*label] += 1;
    }
    let total = labels.len().max(1) as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(cluster_id, count)| ClusterSize {
            cluster_id,
            cluster_name: cluster_name(names, cluster_id),
            count,
            percentage: round_to(count as f64 * 100.0 / total, 1),
        })
        .collect()
}

fn center_summaries(model: &KMeansModel, names: &[String]) -> Vec<CenterSummary> {
    model
        .centers()
        .outer_iter()
        .enumerate()
        .map(|(cluster_id, center)| CenterSummary {
            cluster_id,
            cluster_name: cluster_name(names, cluster_id),
            center: center.to_vec(),
            norm: center.dot(&center).sqrt(),
            mean: center.mean().unwrap_or_default(),
            std: center.std(0.0),
        })
        .collect()
}

/// Predicts only the students that carry a pseudo label so both sides align.
fn external_report(model: &KMeansModel, students: &[Vec<f64>]) -> Option<ExternalReport> {
    let indexed = metrics::pseudo_ground_truth_indexed(students.iter().map(Vec::as_slice))?;
    let dim = model.n_features();
    let (truth, predicted): (Vec<usize>, Vec<usize>) = indexed
        .iter()
        .map(|(row, label)| {
            let point = Array1::from(conform_to_dim(&students[*row], dim));
            (*label, model.predict(point.view()))
        })
        .unzip();
    let external = metrics::external_metrics(&truth, &predicted);
    Some(ExternalReport::from_metrics(external, truth.len()))
}

fn elbow_curve(data: ndarray::ArrayView2<'_, f64>) -> EngineResult<Vec<ElbowPoint>> {
    let upper = (ELBOW_MAX_K + 1).min(data.len_of(Axis(0)));
    (2..upper)
        .map(|k| {
            let model = KMeansModel::fit(KMeansConfig::plus_plus(k), data)?;
            let labels = model.predict_batch(data);
            Ok(ElbowPoint {
                k,
                inertia: model.inertia(),
                silhouette: metrics::silhouette_score(data, &labels).ok(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::TrainingStrategy;
    use crate::clustering::trainer::{DualModelTrainer, TrainingOutcome};

    fn students() -> Vec<Vec<f64>> {
        (0..12)
            .map(|i| {
                let mut vector = vec![0.0; 6];
                vector[i % 3] = 1.0;
                vector[(i + 1) % 6] += 0.1 * (i as f64 / 12.0);
                vector
            })
            .collect()
    }

    fn trained(strategy: TrainingStrategy) -> PersistedState {
        let data = DualModelTrainer::matrix(&students()).unwrap();
        let outcome: TrainingOutcome = DualModelTrainer::new(3, strategy)
            .train(data.view())
            .unwrap();
        PersistedState::from_outcome(outcome, strategy)
    }

    #[test]
    fn untrained_state_has_no_report() {
        let state = PersistedState::empty(3, TrainingStrategy::Auto);
        assert!(matches!(
            ModelReport::build(&state, &students()),
            Err(EngineError::NotTrained)
        ));
    }

    #[test]
    fn report_covers_sizes_centers_and_comparison() {
        let state = trained(TrainingStrategy::Auto);
        let report = ModelReport::build(&state, &students()).unwrap();

        assert_eq!(report.n_students, 12);
        assert_eq!(report.cluster_sizes.len(), 3);
        assert_eq!(report.cluster_sizes.iter().map(|s| s.count).sum::<usize>(), 12);
        let total_pct: f64 = report.cluster_sizes.iter().map(|s| s.percentage).sum();
        assert!((total_pct - 100.0).abs() < 0.2);
        assert_eq!(report.centers.len(), 3);
        assert!(report.comparison.is_some());
        // 12 students allow k = 2..=10
        assert_eq!(report.elbow.len(), 9);
        assert_eq!(report.elbow[0].k, 2);
        assert!(report.elbow[0].silhouette.is_some());
        assert!(
            report
                .elbow
                .iter()
                .filter_map(|point| point.silhouette)
                .all(|s| (-1.0..=1.0).contains(&s))
        );

        let external = report.external.unwrap();
        assert_eq!(external.ground_truth_type, "riasec_dominant");
        assert_eq!(external.labeled_students, 12);
        assert!(external.adjusted_rand_index.is_some());
    }

    #[test]
    fn pinned_state_has_no_comparison() {
        let state = trained(TrainingStrategy::PinnedKMeansPlusPlus);
        let report = ModelReport::build(&state, &students()[..6]).unwrap();
        assert!(report.comparison.is_none());
        assert!(report.elbow.is_empty());
    }

    #[test]
    fn interpretation_bands() {
        assert_eq!(Interpretation::silhouette(0.71), Interpretation::Excellent);
        assert_eq!(Interpretation::silhouette(0.25), Interpretation::Poor);
        assert_eq!(Interpretation::davies_bouldin(1.5), Interpretation::Fair);
        assert_eq!(Interpretation::dunn(0.6), Interpretation::Good);
        assert_eq!(Interpretation::external(0.31), Interpretation::Fair);
    }
}
