/// 生徒200人・20次元での学習と評価の性能ベンチマーク。
use career_engine::clustering::metrics::{davies_bouldin_score, silhouette_score};
use career_engine::clustering::trainer::DualModelTrainer;
use career_engine::clustering::{KMeansConfig, KMeansModel, TrainingStrategy};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn synthetic_students(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 20), |(row, dim)| {
        let base = if dim % 5 == row % 5 { 0.8 } else { 0.2 };
        (base + rng.random_range(-0.15..0.15_f64)).clamp(0.0, 1.0)
    })
}

fn bench_kmeans(c: &mut Criterion) {
    let data = synthetic_students(200, 1);

    c.bench_function("kmeans_plus_plus_200x20", |b| {
        b.iter(|| {
            let model = KMeansModel::fit(KMeansConfig::plus_plus(5), data.view()).unwrap();
            black_box(model.inertia());
        });
    });
    c.bench_function("kmeans_random_200x20", |b| {
        b.iter(|| {
            let model = KMeansModel::fit(KMeansConfig::random(5), data.view()).unwrap();
            black_box(model.inertia());
        });
    });
}

fn bench_dual_training(c: &mut Criterion) {
    let data = synthetic_students(200, 2);
    let trainer = DualModelTrainer::new(5, TrainingStrategy::Auto);

    c.bench_function("dual_training_200x20", |b| {
        b.iter(|| {
            let outcome = trainer.train(data.view()).unwrap();
            black_box(outcome.selection.selected);
        });
    });
}

fn bench_metrics(c: &mut Criterion) {
    let data = synthetic_students(200, 3);
    let model = KMeansModel::fit(KMeansConfig::plus_plus(5), data.view()).unwrap();
    let labels = model.predict_batch(data.view());

    c.bench_function("silhouette_200x20", |b| {
        b.iter(|| black_box(silhouette_score(data.view(), &labels).unwrap()));
    });
    c.bench_function("davies_bouldin_200x20", |b| {
        b.iter(|| black_box(davies_bouldin_score(data.view(), &labels).unwrap()));
    });
}

criterion_group!(benches, bench_kmeans, bench_dual_training, bench_metrics);
criterion_main!(benches);
