//! クラスタリング品質の指標群。
//!
//! Internal indices (silhouette, Calinski-Harabasz, Davies-Bouldin, Dunn) take the
//! sample matrix and a hard labelling. External indices compare the labelling with
//! a pseudo ground truth derived from each student's dominant RIASEC dimension.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::kmeans::euclidean;
use crate::error::{EngineError, EngineResult};
use crate::profile::RIASEC_DIM;

/// Labels remapped to dense ids `0..k` in ascending order of the original label.
struct DenseLabels {
    ids: Vec<usize>,
    n_clusters: usize,
}

impl DenseLabels {
    fn new(labels: &[usize]) -> Self {
        let mut distinct: Vec<usize> = labels.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        let ids = labels
            .iter()
            .map(|label| distinct.binary_search(label).unwrap_or_default())
            .collect();
        Self {
            ids,
            n_clusters: distinct.len(),
        }
    }

    fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters];
        for id in &self.ids {
            counts[*id] += 1;
        }
        counts
    }
}

fn check_labelling(data: ArrayView2<'_, f64>, labels: &[usize]) -> EngineResult<DenseLabels> {
    let n_samples = data.nrows();
    if labels.len() != n_samples {
        return Err(EngineError::metric(format!(
            "label count {} does not match sample count {n_samples}",
            labels.len()
        )));
    }
    let dense = DenseLabels::new(labels);
    if dense.n_clusters < 2 || dense.n_clusters > n_samples.saturating_sub(1) {
        return Err(EngineError::metric(format!(
            "number of labels is {}; valid values are 2 to n_samples - 1 ({})",
            dense.n_clusters,
            n_samples.saturating_sub(1)
        )));
    }
    Ok(dense)
}

fn centroids(data: ArrayView2<'_, f64>, labels: &DenseLabels) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros((labels.n_clusters, data.ncols()));
    for (row, id) in data.outer_iter().zip(&labels.ids) {
        let mut target = sums.row_mut(*id);
        target += &row;
    }
    for (mut row, count) in sums.outer_iter_mut().zip(labels.counts()) {
        if count > 0 {
            row /= count as f64;
        }
    }
    sums
}

/// Mean silhouette coefficient over all samples (Euclidean distance).
///
/// Samples in singleton clusters score 0.
///
/// # Errors
/// [`EngineError::MetricComputation`] unless the labelling has between 2 and
/// `n_samples - 1` distinct clusters.
pub fn silhouette_score(data: ArrayView2<'_, f64>, labels: &[usize]) -> EngineResult<f64> {
    let dense = check_labelling(data, labels)?;
    let counts = dense.counts();
    let n = data.nrows();

    let mut total = 0.0;
    for i in 0..n {
        let own = dense.ids[i];
        let mut dist_sums = vec![0.0_f64; dense.n_clusters];
        for j in 0..n {
            if i != j {
                dist_sums[dense.ids[j]] += euclidean(data.row(i), data.row(j));
            }
        }
        if counts[own] <= 1 {
            continue;
        }
        let a = dist_sums[own] / (counts[own] - 1) as f64;
        let b = dist_sums
            .iter()
            .zip(&counts)
            .enumerate()
            .filter(|(cluster, _)| *cluster != own)
            .map(|(_, (sum, count))| sum / *count as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Ok(total / n as f64)
}

/// Calinski-Harabasz variance ratio. Returns 1.0 when within-cluster dispersion is 0.
///
/// # Errors
/// Same labelling constraints as [`silhouette_score`].
pub fn calinski_harabasz_score(data: ArrayView2<'_, f64>, labels: &[usize]) -> EngineResult<f64> {
    let dense = check_labelling(data, labels)?;
    let n = data.nrows() as f64;
    let k = dense.n_clusters as f64;
    let overall_mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| EngineError::metric("empty matrix"))?;
    let centers = centroids(data, &dense);
    let counts = dense.counts();

    let extra: f64 = centers
        .outer_iter()
        .zip(&counts)
        .map(|(center, count)| *count as f64 * squared(center, overall_mean.view()))
        .sum();
    let intra: f64 = data
        .outer_iter()
        .zip(&dense.ids)
        .map(|(row, id)| squared(row, centers.row(*id)))
        .sum();

    if intra == 0.0 {
        return Ok(1.0);
    }
    Ok(extra * (n - k) / (intra * (k - 1.0)))
}

/// Davies-Bouldin index (lower is better).
///
/// # Errors
/// Same labelling constraints as [`silhouette_score`].
pub fn davies_bouldin_score(data: ArrayView2<'_, f64>, labels: &[usize]) -> EngineResult<f64> {
    let dense = check_labelling(data, labels)?;
    let centers = centroids(data, &dense);
    let counts = dense.counts();
    let k = dense.n_clusters;

    let mut scatter = vec![0.0_f64; k];
    for (row, id) in data.outer_iter().zip(&dense.ids) {
        scatter[*id] += euclidean(row, centers.row(*id));
    }
    for (value, count) in scatter.iter_mut().zip(&counts) {
        *value /= *count as f64;
    }

    let mut separation = Array2::<f64>::zeros((k, k));
    for i in 0..k {
        for j in 0..k {
            separation[[i, j]] = euclidean(centers.row(i), centers.row(j));
        }
    }

    if scatter.iter().all(|s| s.abs() < 1e-8) || separation.iter().all(|d| d.abs() < 1e-8) {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for i in 0..k {
        let worst = (0..k)
            .filter(|j| *j != i)
            .map(|j| {
                let distance = separation[[i, j]];
                // 重心が重なる組は寄与しない
                if distance == 0.0 {
                    0.0
                } else {
                    (scatter[i] + scatter[j]) / distance
                }
            })
            .fold(0.0_f64, f64::max);
        total += worst;
    }
    Ok(total / k as f64)
}

/// Dunn index: minimum distance between cluster centroids divided by the largest
/// distance between two points of the same cluster.
///
/// Returns 0.0 with fewer than two populated clusters or when the largest
/// intra-cluster distance is 0.
#[must_use]
pub fn dunn_index(data: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    if labels.len() != data.nrows() || labels.is_empty() {
        return 0.0;
    }
    let dense = DenseLabels::new(labels);
    if dense.n_clusters < 2 {
        return 0.0;
    }

    let centers = centroids(data, &dense);
    let mut min_inter = f64::INFINITY;
    for i in 0..dense.n_clusters {
        for j in (i + 1)..dense.n_clusters {
            min_inter = min_inter.min(euclidean(centers.row(i), centers.row(j)));
        }
    }

    let mut max_intra = 0.0_f64;
    let n = data.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if dense.ids[i] == dense.ids[j] {
                max_intra = max_intra.max(euclidean(data.row(i), data.row(j)));
            }
        }
    }

    if max_intra == 0.0 {
        return 0.0;
    }
    min_inter / max_intra
}

/// Mean of all pairwise distances between centers; 0.0 with fewer than two.
#[must_use]
pub fn inter_cluster_distance(centers: ArrayView2<'_, f64>) -> f64 {
    let k = centers.nrows();
    if k < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0_usize;
    for i in 0..k {
        for j in (i + 1)..k {
            total += euclidean(centers.row(i), centers.row(j));
            pairs += 1;
        }
    }
    total / pairs as f64
}

/// Mean per-feature population variance, averaged over clusters with more than
/// one member. `None` when no cluster qualifies.
#[must_use]
pub fn intra_cluster_variance(data: ArrayView2<'_, f64>, labels: &[usize]) -> Option<f64> {
    if labels.len() != data.nrows() {
        return None;
    }
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        members.entry(*label).or_default().push(idx);
    }

    let variances: Vec<f64> = members
        .values()
        .filter(|rows| rows.len() > 1)
        .filter_map(|rows| {
            data.select(Axis(0), rows)
                .var_axis(Axis(0), 0.0)
                .mean()
        })
        .collect();

    if variances.is_empty() {
        None
    } else {
        Some(variances.iter().sum::<f64>() / variances.len() as f64)
    }
}

/// 先頭6要素（RIASEC）の最大次元を擬似正解ラベルとする。
///
/// Returns `(row_index, label)` for every row whose RIASEC block sums to a
/// positive value. The first maximum wins on ties. `None` when no row qualifies.
#[must_use]
pub fn pseudo_ground_truth_indexed<'a, I>(vectors: I) -> Option<Vec<(usize, usize)>>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let labels: Vec<(usize, usize)> = vectors
        .into_iter()
        .enumerate()
        .filter_map(|(idx, vector)| dominant_dimension(vector).map(|label| (idx, label)))
        .collect();
    if labels.is_empty() { None } else { Some(labels) }
}

/// Labels only, in row order. See [`pseudo_ground_truth_indexed`].
#[must_use]
pub fn pseudo_ground_truth<'a, I>(vectors: I) -> Option<Vec<usize>>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    pseudo_ground_truth_indexed(vectors)
        .map(|pairs| pairs.into_iter().map(|(_, label)| label).collect())
}

fn dominant_dimension(vector: &[f64]) -> Option<usize> {
    let riasec = vector.get(..RIASEC_DIM)?;
    if riasec.iter().sum::<f64>() <= 0.0 {
        return None;
    }
    let mut best = 0;
    for (idx, value) in riasec.iter().enumerate() {
        if *value > riasec[best] {
            best = idx;
        }
    }
    Some(best)
}

/// 外部指標。計算できなかった場合は三つとも `None`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetrics {
    pub adjusted_rand_index: Option<f64>,
    pub normalized_mutual_info: Option<f64>,
    pub fowlkes_mallows_index: Option<f64>,
}

impl ExternalMetrics {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.adjusted_rand_index.is_some()
    }
}

/// Compares predicted labels with a ground truth of the same length.
#[must_use]
pub fn external_metrics(truth: &[usize], predicted: &[usize]) -> ExternalMetrics {
    match compute_external(truth, predicted) {
        Ok((ari, nmi, fmi)) => ExternalMetrics {
            adjusted_rand_index: Some(ari),
            normalized_mutual_info: Some(nmi),
            fowlkes_mallows_index: Some(fmi),
        },
        Err(error) => {
            tracing::debug!(error = %error, "external metrics unavailable");
            ExternalMetrics::default()
        }
    }
}

fn compute_external(truth: &[usize], predicted: &[usize]) -> EngineResult<(f64, f64, f64)> {
    if truth.len() != predicted.len() {
        return Err(EngineError::metric(format!(
            "label length mismatch: {} ground truth vs {} predicted",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(EngineError::metric("no labels to compare"));
    }
    let table = Contingency::new(truth, predicted);
    let (ari, nmi, fmi) = (
        table.adjusted_rand_index(),
        table.normalized_mutual_info(),
        table.fowlkes_mallows(),
    );
    if [ari, nmi, fmi].iter().any(|v| !v.is_finite()) {
        return Err(EngineError::metric("external metric is not finite"));
    }
    Ok((ari, nmi, fmi))
}

struct Contingency {
    n: f64,
    cells: Array2<f64>,
    rows: Array1<f64>,
    cols: Array1<f64>,
}

fn comb2(x: f64) -> f64 {
    x * (x - 1.0) / 2.0
}

impl Contingency {
    fn new(truth: &[usize], predicted: &[usize]) -> Self {
        let truth = DenseLabels::new(truth);
        let predicted = DenseLabels::new(predicted);
        let mut cells = Array2::<f64>::zeros((truth.n_clusters, predicted.n_clusters));
        for (t, p) in truth.ids.iter().zip(&predicted.ids) {
            cells[[*t, *p]] += 1.0;
        }
        Self {
            n: truth.ids.len() as f64,
            rows: cells.sum_axis(Axis(1)),
            cols: cells.sum_axis(Axis(0)),
            cells,
        }
    }

    fn adjusted_rand_index(&self) -> f64 {
        let sum_cells: f64 = self.cells.iter().map(|v| comb2(*v)).sum();
        let sum_rows: f64 = self.rows.iter().map(|v| comb2(*v)).sum();
        let sum_cols: f64 = self.cols.iter().map(|v| comb2(*v)).sum();
        let total_pairs = comb2(self.n);
        if total_pairs == 0.0 {
            return 1.0;
        }
        let expected = sum_rows * sum_cols / total_pairs;
        let max_index = (sum_rows + sum_cols) / 2.0;
        if (max_index - expected).abs() < f64::EPSILON {
            return 1.0;
        }
        (sum_cells - expected) / (max_index - expected)
    }

    fn normalized_mutual_info(&self) -> f64 {
        if self.rows.len() == 1 && self.cols.len() == 1 {
            return 1.0;
        }
        let n = self.n;
        let mut mutual_info = 0.0;
        for ((i, j), value) in self.cells.indexed_iter() {
            if *value > 0.0 {
                mutual_info += value / n * (n * value / (self.rows[i] * self.cols[j])).ln();
            }
        }
        let entropy = |marginal: ArrayView1<'_, f64>| -> f64 {
            -marginal
                .iter()
                .filter(|v| **v > 0.0)
                .map(|v| (v / n) * (v / n).ln())
                .sum::<f64>()
        };
        let normalizer = f64::midpoint(entropy(self.rows.view()), entropy(self.cols.view()));
        if mutual_info.abs() < 1e-15 {
            return 0.0;
        }
        (mutual_info / normalizer.max(f64::EPSILON)).clamp(0.0, 1.0)
    }

    fn fowlkes_mallows(&self) -> f64 {
        let tk: f64 = self.cells.iter().map(|v| v * v).sum::<f64>() - self.n;
        let pk: f64 = self.rows.iter().map(|v| v * v).sum::<f64>() - self.n;
        let qk: f64 = self.cols.iter().map(|v| v * v).sum::<f64>() - self.n;
        if tk == 0.0 || pk == 0.0 || qk == 0.0 {
            return 0.0;
        }
        (tk / pk).sqrt() * (tk / qk).sqrt()
    }
}

fn squared(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    super::kmeans::squared_euclidean(a, b)
}
