//! 学習済みモデルの永続化。
//!
//! The bundle is a JSON document tagged with a `schema` discriminator. The current
//! schema stores both variants and the selection; the legacy schema held a
//! single model and is migrated on load.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use super::kmeans::KMeansModel;
use super::selection::SelectionResult;
use super::trainer::TrainingOutcome;
use super::{Algorithm, TrainingStrategy, default_cluster_names};
use crate::error::{EngineError, EngineResult};

/// Complete trained state. Replaced as a whole, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub kmeans_plus: Option<KMeansModel>,
    pub kmeans_random: Option<KMeansModel>,
    pub selection: Option<SelectionResult>,
    /// `None` until a model has been trained or loaded.
    pub active: Option<Algorithm>,
    pub cluster_names: Vec<String>,
    pub n_clusters: usize,
    #[serde(default)]
    pub strategy: TrainingStrategy,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
}

impl PersistedState {
    /// Untrained state.
    #[must_use]
    pub fn empty(n_clusters: usize, strategy: TrainingStrategy) -> Self {
        Self {
            kmeans_plus: None,
            kmeans_random: None,
            selection: None,
            active: None,
            cluster_names: default_cluster_names(),
            n_clusters,
            strategy,
            trained_at: None,
        }
    }

    #[must_use]
    pub fn from_outcome(outcome: TrainingOutcome, strategy: TrainingStrategy) -> Self {
        let n_clusters = outcome
            .active_model()
            .map_or(0, KMeansModel::n_clusters);
        Self {
            active: Some(outcome.selection.selected),
            kmeans_plus: outcome.kmeans_plus,
            kmeans_random: outcome.kmeans_random,
            selection: Some(outcome.selection),
            cluster_names: default_cluster_names(),
            n_clusters,
            strategy,
            trained_at: Some(Utc::now()),
        }
    }

    #[must_use]
    pub fn model(&self, algorithm: Algorithm) -> Option<&KMeansModel> {
        match algorithm {
            Algorithm::KMeansPlus => self.kmeans_plus.as_ref(),
            Algorithm::KMeansRandom => self.kmeans_random.as_ref(),
        }
    }

    /// 推論に使うモデル。未学習なら `None`。
    #[must_use]
    pub fn active_model(&self) -> Option<&KMeansModel> {
        self.active.and_then(|algorithm| self.model(algorithm))
    }

    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.active_model().is_some()
    }

    /// Checks that every stored model can serve inference for `n_clusters`.
    ///
    /// # Errors
    /// [`EngineError::InvalidInput`] naming the first inconsistency found.
    pub fn validate(&self) -> EngineResult<()> {
        for algorithm in Algorithm::ALL {
            let Some(model) = self.model(algorithm) else {
                continue;
            };
            if model.n_clusters() == 0 || model.n_features() == 0 {
                return Err(EngineError::invalid(format!(
                    "{algorithm} model has an empty center matrix"
                )));
            }
            if model.n_clusters() != self.n_clusters {
                return Err(EngineError::invalid(format!(
                    "{algorithm} model has {} centers but the bundle declares {} clusters",
                    model.n_clusters(),
                    self.n_clusters
                )));
            }
            if model.centers().iter().any(|value| !value.is_finite()) {
                return Err(EngineError::invalid(format!(
                    "{algorithm} model has non-finite centers"
                )));
            }
        }
        if let Some(active) = self.active {
            if self.model(active).is_none() {
                return Err(EngineError::invalid(format!(
                    "active algorithm {active} has no stored model"
                )));
            }
        }
        Ok(())
    }
}

/// Single-model bundle written before the dual comparison existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyBundle {
    pub model: KMeansModel,
    #[serde(default)]
    pub cluster_names: Option<Vec<String>>,
    #[serde(default)]
    pub n_clusters: Option<usize>,
}

impl LegacyBundle {
    fn migrate(self) -> PersistedState {
        let n_clusters = self.n_clusters.unwrap_or_else(|| self.model.n_clusters());
        PersistedState {
            kmeans_plus: Some(self.model),
            kmeans_random: None,
            selection: None,
            active: Some(Algorithm::KMeansPlus),
            cluster_names: self.cluster_names.unwrap_or_else(default_cluster_names),
            n_clusters,
            strategy: TrainingStrategy::PinnedKMeansPlusPlus,
            trained_at: None,
        }
    }
}

/// On-disk schemas.
#[derive(Debug, Deserialize)]
#[serde(tag = "schema")]
pub enum StoredBundle {
    #[serde(rename = "legacy_single_model")]
    LegacySingleModel(LegacyBundle),
    #[serde(rename = "dual_model_v2")]
    DualModel(PersistedState),
}

#[derive(Serialize)]
#[serde(tag = "schema")]
enum StoredBundleRef<'a> {
    #[serde(rename = "dual_model_v2")]
    DualModel(&'a PersistedState),
}

impl StoredBundle {
    /// Brings any schema up to the current [`PersistedState`].
    #[must_use]
    pub fn into_current(self) -> PersistedState {
        match self {
            Self::DualModel(state) => state,
            Self::LegacySingleModel(legacy) => {
                warn!(
                    "legacy single-model bundle loaded; running without a model comparison"
                );
                legacy.migrate()
            }
        }
    }
}

/// Reads and writes the model bundle at a fixed path.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 一時ファイルに書き出してから rename するので、読み手が途中の内容を見ることはない。
    ///
    /// # Errors
    /// [`EngineError::Persistence`] on I/O failure, [`EngineError::Serialization`]
    /// if the state cannot be encoded.
    pub fn save(&self, state: &PersistedState) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(&StoredBundleRef::DualModel(state))?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|error| EngineError::persistence(&parent, error))?;

        let mut tmp = NamedTempFile::new_in(&parent)
            .map_err(|error| EngineError::persistence(&parent, error))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|error| EngineError::persistence(tmp.path(), error))?;
        tmp.persist(&self.path)
            .map_err(|error| EngineError::persistence(&self.path, error.error))?;

        info!(path = %self.path.display(), bytes = bytes.len(), "model bundle saved");
        Ok(())
    }

    /// Loads the bundle, migrating older schemas. A missing file yields `Ok(None)`.
    ///
    /// # Errors
    /// [`EngineError::Persistence`] when the file exists but cannot be read,
    /// [`EngineError::Serialization`] when it cannot be decoded,
    /// [`EngineError::InvalidInput`] when its models are inconsistent.
    pub fn load(&self) -> EngineResult<Option<PersistedState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no model bundle found");
                return Ok(None);
            }
            Err(error) => return Err(EngineError::persistence(&self.path, error)),
        };
        let bundle: StoredBundle = serde_json::from_slice(&bytes)?;
        let state = bundle.into_current();
        if let Err(error) = state.validate() {
            warn!(path = %self.path.display(), error = %error, "rejecting model bundle");
            return Err(error);
        }
        Ok(Some(state))
    }
}
