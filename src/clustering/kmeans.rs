use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// 初期重心の選び方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMethod {
    #[serde(rename = "k-means++")]
    KMeansPlusPlus,
    Random,
}

/// Parameters of a single K-Means configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub init: InitMethod,
    /// Independent restarts; the run with the lowest inertia wins.
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
    /// Relative to the mean per-feature variance of the training data.
    pub tolerance: f64,
}

impl KMeansConfig {
    pub const DEFAULT_TOLERANCE: f64 = 1e-4;

    /// k-means++ init, 10 restarts, 300 iterations, seed 42.
    #[must_use]
    pub fn plus_plus(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            init: InitMethod::KMeansPlusPlus,
            n_init: 10,
            max_iter: 300,
            seed: 42,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }

    /// Random init, 3 restarts, 100 iterations, seed 789.
    #[must_use]
    pub fn random(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            init: InitMethod::Random,
            n_init: 3,
            max_iter: 100,
            seed: 789,
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// Fitted K-Means model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    config: KMeansConfig,
    centers: Array2<f64>,
    inertia: f64,
    n_iter: usize,
}

struct RunResult {
    centers: Array2<f64>,
    inertia: f64,
    n_iter: usize,
}

impl KMeansModel {
    /// Runs K-Means clustering with `config.n_init` seeded restarts.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidInput`] when the matrix is empty, `k` is zero
    /// or exceeds the number of samples.
    pub fn fit(config: KMeansConfig, data: ArrayView2<'_, f64>) -> EngineResult<Self> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(EngineError::invalid("cannot cluster an empty matrix"));
        }
        if config.n_clusters == 0 {
            return Err(EngineError::invalid("n_clusters must be at least 1"));
        }
        if config.n_clusters > n_samples {
            return Err(EngineError::invalid(format!(
                "n_clusters ({}) exceeds number of samples ({n_samples})",
                config.n_clusters
            )));
        }
        if data.iter().any(|value| !value.is_finite()) {
            return Err(EngineError::invalid("input contains non-finite values"));
        }

        let tolerance = scaled_tolerance(data, config.tolerance);

        // 各リスタートのシードはマスター RNG から順に引くので、並列実行でも結果は変わらない
        let mut master = StdRng::seed_from_u64(config.seed);
        let run_seeds: Vec<u64> = (0..config.n_init.max(1))
            .map(|_| master.random::<u64>())
            .collect();

        let runs: Vec<RunResult> = run_seeds
            .into_par_iter()
            .map(|seed| run_once(&config, data, seed, tolerance))
            .collect();

        let mut best: Option<RunResult> = None;
        for run in runs {
            let replace = best
                .as_ref()
                .is_none_or(|current| run.inertia < current.inertia);
            if replace {
                best = Some(run);
            }
        }
        let best = best.ok_or_else(|| EngineError::invalid("no K-Means run completed"))?;

        Ok(Self {
            config,
            centers: best.centers,
            inertia: best.inertia,
            n_iter: best.n_iter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    #[must_use]
    pub fn centers(&self) -> ArrayView2<'_, f64> {
        self.centers.view()
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.centers.nrows()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.centers.ncols()
    }

    /// Sum of squared distances of the training samples to their closest center.
    #[must_use]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Index of the closest center. Ties resolve to the lowest index.
    #[must_use]
    pub fn predict(&self, point: ArrayView1<'_, f64>) -> usize {
        nearest_center(point, self.centers.view()).0
    }

    #[must_use]
    pub fn predict_batch(&self, data: ArrayView2<'_, f64>) -> Vec<usize> {
        data.outer_iter().map(|row| self.predict(row)).collect()
    }
}

#[must_use]
pub fn squared_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[must_use]
pub fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

fn nearest_center(point: ArrayView1<'_, f64>, centers: ArrayView2<'_, f64>) -> (usize, f64) {
    let mut best_cluster = 0;
    let mut min_dist_sq = f64::INFINITY;
    for (j, center) in centers.outer_iter().enumerate() {
        let dist_sq = squared_euclidean(point, center);
        if dist_sq < min_dist_sq {
            min_dist_sq = dist_sq;
            best_cluster = j;
        }
    }
    (best_cluster, min_dist_sq)
}

fn scaled_tolerance(data: ArrayView2<'_, f64>, tolerance: f64) -> f64 {
    let mean_variance = data
        .var_axis(Axis(0), 0.0)
        .mean()
        .unwrap_or(0.0);
    mean_variance * tolerance
}

fn run_once(
    config: &KMeansConfig,
    data: ArrayView2<'_, f64>,
    seed: u64,
    tolerance: f64,
) -> RunResult {
    let mut rng = StdRng::seed_from_u64(seed);
    let k = config.n_clusters;
    let mut centers = match config.init {
        InitMethod::KMeansPlusPlus => init_plus_plus(data, k, &mut rng),
        InitMethod::Random => init_random(data, k, &mut rng),
    };

    let mut labels = vec![0_usize; data.nrows()];
    let mut n_iter = 0;

    for _ in 0..config.max_iter.max(1) {
        n_iter += 1;

        // E-step: 各点を最も近い重心に割り当てる
        for (label, point) in labels.iter_mut().zip(data.outer_iter()) {
            *label = nearest_center(point, centers.view()).0;
        }

        // M-step: 重心を更新する
        let new_centers = update_centers(data, &labels, centers.view());
        let shift: f64 = centers
            .iter()
            .zip(new_centers.iter())
            .map(|(old, new)| (old - new).powi(2))
            .sum();
        centers = new_centers;

        if shift <= tolerance {
            break;
        }
    }

    let inertia = data
        .outer_iter()
        .map(|point| nearest_center(point, centers.view()).1)
        .sum();

    RunResult {
        centers,
        inertia,
        n_iter,
    }
}

fn update_centers(
    data: ArrayView2<'_, f64>,
    labels: &[usize],
    previous: ArrayView2<'_, f64>,
) -> Array2<f64> {
    let (k, dim) = previous.dim();
    let mut sums = Array2::<f64>::zeros((k, dim));
    let mut counts = vec![0_usize; k];

    for (point, &cluster) in data.outer_iter().zip(labels) {
        let mut row = sums.row_mut(cluster);
        row += &point;
        counts[cluster] += 1;
    }

    let mut taken: Vec<usize> = Vec::new();
    for (cluster, count) in counts.iter().enumerate() {
        if *count > 0 {
            let mut row = sums.row_mut(cluster);
            row /= *count as f64;
        } else {
            // 空クラスタは現在の割り当てで最も遠い点へ移す
            let far = farthest_point(data, labels, previous, &taken);
            taken.push(far);
            sums.row_mut(cluster).assign(&data.row(far));
        }
    }
    sums
}

fn farthest_point(
    data: ArrayView2<'_, f64>,
    labels: &[usize],
    centers: ArrayView2<'_, f64>,
    exclude: &[usize],
) -> usize {
    let mut best = 0;
    let mut best_dist = f64::NEG_INFINITY;
    for (idx, (point, &cluster)) in data.outer_iter().zip(labels).enumerate() {
        if exclude.contains(&idx) {
            continue;
        }
        let dist = squared_euclidean(point, centers.row(cluster));
        if dist > best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

fn init_random(data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let picked = rand::seq::index::sample(rng, data.nrows(), k);
    data.select(Axis(0), &picked.into_vec())
}

/// k-means++: pick each next center with probability proportional to the
/// squared distance to the closest already chosen center.
fn init_plus_plus(data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = data.nrows();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.random_range(0..n));

    let mut closest: Array1<f64> = data
        .outer_iter()
        .map(|point| squared_euclidean(point, data.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f64 = closest.sum();
        let next = if total > 0.0 {
            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut selected = n - 1;
            for (idx, dist) in closest.iter().enumerate() {
                cumulative += dist;
                if cumulative >= threshold && *dist > 0.0 {
                    selected = idx;
                    break;
                }
            }
            selected
        } else {
            rng.random_range(0..n)
        };
        chosen.push(next);

        let center = data.row(next);
        for (slot, point) in closest.iter_mut().zip(data.outer_iter()) {
            let dist = squared_euclidean(point, center);
            if dist < *slot {
                *slot = dist;
            }
        }
    }

    data.select(Axis(0), &chosen)
}
