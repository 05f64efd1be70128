//! 二つのモデルの重み付きスコアと採用判定。

use serde::{Deserialize, Serialize};

use super::Algorithm;
use super::evaluation::EvaluationRecord;

/// Weights and normalisation constants of the composite score.
///
/// The defaults are empirical. They are kept as data so deployments can tune them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionWeights {
    pub quality: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub complexity: f64,

    pub silhouette: f64,
    pub calinski_harabasz: f64,
    pub davies_bouldin: f64,
    /// CH value that maps to a full score.
    pub calinski_harabasz_scale: f64,

    pub stability: f64,
    pub separation: f64,
    pub compactness: f64,
    /// Inter-cluster distance that maps to a full score.
    pub separation_scale: f64,

    pub training_speed: f64,
    pub prediction_speed: f64,
    /// Multiplier on training seconds.
    pub training_time_factor: f64,
    /// Divisor on prediction milliseconds.
    pub prediction_time_scale: f64,

    pub inertia_scale: f64,
    /// Complexity score used when either model lacks an inertia.
    pub missing_inertia_score: f64,

    /// Totals closer than this favour k-means++.
    pub tie_margin: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            quality: 0.50,
            performance: 0.25,
            efficiency: 0.15,
            complexity: 0.10,
            silhouette: 0.4,
            calinski_harabasz: 0.3,
            davies_bouldin: 0.3,
            calinski_harabasz_scale: 200.0,
            stability: 0.5,
            separation: 0.3,
            compactness: 0.2,
            separation_scale: 2.0,
            training_speed: 0.6,
            prediction_speed: 0.4,
            training_time_factor: 10.0,
            prediction_time_scale: 10.0,
            inertia_scale: 100.0,
            missing_inertia_score: 0.5,
            tie_margin: 0.02,
        }
    }
}

/// Composite score of one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub quality: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub complexity: f64,
    pub total: f64,
}

/// 1/(1+x); an infinite `x` yields 0.
fn inverse(x: f64) -> f64 {
    if x.is_finite() { 1.0 / (1.0 + x) } else { 0.0 }
}

impl SelectionWeights {
    /// Scores `record`. `complexity_enabled` is false when either compared model
    /// lacks an inertia, in which case the fixed fallback score is used.
    #[must_use]
    pub fn score(&self, record: &EvaluationRecord, complexity_enabled: bool) -> ScoreBreakdown {
        let silhouette = record.silhouette.unwrap_or(-1.0);
        let calinski_harabasz = record.calinski_harabasz.unwrap_or(0.0);
        let davies_bouldin = record.davies_bouldin.unwrap_or(f64::INFINITY);
        let intra = record.intra_cluster_variance.unwrap_or(f64::INFINITY);

        let quality = self.silhouette * silhouette
            + self.calinski_harabasz * (calinski_harabasz / self.calinski_harabasz_scale).min(1.0)
            + self.davies_bouldin * inverse(davies_bouldin);

        let performance = self.stability * record.cluster_stability.min(1.0)
            + self.separation * (record.inter_cluster_distance / self.separation_scale).min(1.0)
            + self.compactness * inverse(intra);

        let efficiency = self.training_speed
            * inverse(self.training_time_factor * record.training_time)
            + self.prediction_speed
                * inverse(record.prediction_time_ms / self.prediction_time_scale);

        let complexity = match record.inertia {
            Some(inertia) if complexity_enabled => inverse(inertia / self.inertia_scale),
            _ => self.missing_inertia_score,
        };

        let total = self.quality * quality
            + self.performance * performance
            + self.efficiency * efficiency
            + self.complexity * complexity;

        ScoreBreakdown {
            quality,
            performance,
            efficiency,
            complexity,
            total,
        }
    }

    /// k-means++ wins ties within `tie_margin`; otherwise the larger total wins.
    #[must_use]
    pub fn choose(&self, plus: &ScoreBreakdown, random: &ScoreBreakdown) -> Algorithm {
        if (plus.total - random.total).abs() < self.tie_margin || plus.total > random.total {
            Algorithm::KMeansPlus
        } else {
            Algorithm::KMeansRandom
        }
    }
}

/// 比較結果。採用アルゴリズムと各モデルの評価・スコアを保持する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected: Algorithm,
    pub kmeans_plus: Option<EvaluationRecord>,
    pub kmeans_random: Option<EvaluationRecord>,
    pub kmeans_plus_score: Option<ScoreBreakdown>,
    pub kmeans_random_score: Option<ScoreBreakdown>,
}

impl SelectionResult {
    #[must_use]
    pub fn record(&self, algorithm: Algorithm) -> Option<&EvaluationRecord> {
        match algorithm {
            Algorithm::KMeansPlus => self.kmeans_plus.as_ref(),
            Algorithm::KMeansRandom => self.kmeans_random.as_ref(),
        }
    }

    #[must_use]
    pub fn selected_record(&self) -> Option<&EvaluationRecord> {
        self.record(self.selected)
    }

    /// Runs the weighted comparison between both records.
    #[must_use]
    pub fn compare(
        weights: &SelectionWeights,
        plus: EvaluationRecord,
        random: EvaluationRecord,
    ) -> Self {
        let complexity_enabled = plus.inertia.is_some() && random.inertia.is_some();
        let plus_score = weights.score(&plus, complexity_enabled);
        let random_score = weights.score(&random, complexity_enabled);
        Self {
            selected: weights.choose(&plus_score, &random_score),
            kmeans_plus: Some(plus),
            kmeans_random: Some(random),
            kmeans_plus_score: Some(plus_score),
            kmeans_random_score: Some(random_score),
        }
    }

    /// Result for a pinned strategy: only `algorithm` was fitted and evaluated.
    #[must_use]
    pub fn pinned(algorithm: Algorithm, record: EvaluationRecord) -> Self {
        let (kmeans_plus, kmeans_random) = match algorithm {
            Algorithm::KMeansPlus => (Some(record), None),
            Algorithm::KMeansRandom => (None, Some(record)),
        };
        Self {
            selected: algorithm,
            kmeans_plus,
            kmeans_random,
            kmeans_plus_score: None,
            kmeans_random_score: None,
        }
    }
}
