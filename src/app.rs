use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    clustering::{
        report::ModelReport, service::ClusterService, store::ModelStore, store::PersistedState,
        trainer::DualModelTrainer,
    },
    config::Config,
    dataset,
    error::EngineError,
    observability::Telemetry,
    recommend::{CareerRecommender, StructuredEmbedder},
};

/// アプリケーション全体の依存をまとめたレジストリ。
pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    clusters: Arc<ClusterService>,
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化に失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new().context("failed to initialise telemetry")?;
        Ok(Self::with_telemetry(config, telemetry))
    }

    /// 既存の Telemetry を使って構築する（テスト向け）。
    #[must_use]
    pub fn with_telemetry(config: Config, telemetry: Telemetry) -> Self {
        let config = Arc::new(config);
        let trainer = DualModelTrainer::new(config.cluster_count().get(), config.strategy());
        let store = ModelStore::new(config.model_path().clone());
        let clusters =
            Arc::new(ClusterService::new(trainer, store).with_metrics(telemetry.metrics()));
        Self {
            config,
            telemetry,
            clusters,
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    #[must_use]
    pub fn clusters(&self) -> Arc<ClusterService> {
        Arc::clone(&self.clusters)
    }

    /// 保存済みモデルを読み込み、必要なら学生データから再学習する。
    ///
    /// # Errors
    /// モデルの読み込み、データセットの読み込み、学習のいずれかが失敗した場合はエラーを返す。
    pub fn bootstrap(&self) -> Result<()> {
        let loaded = if self.config.retrain_on_start() {
            false
        } else {
            self.clusters
                .load_from_store()
                .context("failed to load persisted clustering model")?
        };
        if loaded {
            return Ok(());
        }

        match self.train_from_dataset() {
            Ok(_) => Ok(()),
            Err(error) => match error.downcast_ref::<EngineError>() {
                Some(EngineError::InsufficientData { samples, clusters }) => {
                    warn!(
                        samples,
                        clusters, "not enough students to train; serving without a model"
                    );
                    Ok(())
                }
                _ => Err(error),
            },
        }
    }

    /// Loads the student dataset and runs a full training.
    ///
    /// # Errors
    /// Dataset and training failures, including [`EngineError::InsufficientData`].
    pub fn train_from_dataset(&self) -> Result<Arc<PersistedState>> {
        let students = dataset::load_students(&self.config.students_path())
            .context("failed to load student dataset")?;
        let vectors = dataset::student_vectors(&students);
        info!(students = vectors.len(), "training clustering models");
        let state = self.clusters.train(&vectors)?;
        Ok(state)
    }

    /// # Errors
    /// Fails when nothing is trained or the student dataset cannot be read.
    pub fn report(&self) -> Result<ModelReport> {
        let students = dataset::load_students(&self.config.students_path())
            .context("failed to load student dataset")?;
        let vectors = dataset::student_vectors(&students);
        let report = ModelReport::build(&self.clusters.snapshot(), &vectors)?;
        Ok(report)
    }

    /// # Errors
    /// Fails when the career dataset cannot be read.
    pub fn recommender(&self) -> Result<CareerRecommender> {
        let careers = dataset::load_careers(&self.config.careers_path())
            .context("failed to load career dataset")?;
        Ok(CareerRecommender::new(Box::new(StructuredEmbedder), careers))
    }
}
