use std::{env, num::NonZeroUsize, path::PathBuf};

use thiserror::Error;

use crate::clustering::TrainingStrategy;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    model_path: PathBuf,
    cluster_count: NonZeroUsize,
    strategy: TrainingStrategy,
    data_dir: PathBuf,
    top_k: NonZeroUsize,
    retrain_on_start: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数からエンジンの設定値を読み込み、検証する。
    ///
    /// すべての値にデフォルトがあるため、未設定の変数はエラーにならない。
    ///
    /// # Errors
    /// 値のパースに失敗した場合、またはパスが空文字列で設定されている場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_path = parse_path("CAREER_ENGINE_MODEL_PATH", "model/clustering_model.json")?;
        let cluster_count = parse_non_zero_usize("CAREER_ENGINE_CLUSTER_COUNT", 5)?;
        let strategy = parse_strategy("CAREER_ENGINE_ALGORITHM", "auto")?;
        let data_dir = parse_path("CAREER_ENGINE_DATA_DIR", "data")?;
        let top_k = parse_non_zero_usize("CAREER_ENGINE_TOP_K", 5)?;
        let retrain_on_start = parse_bool("CAREER_ENGINE_RETRAIN_ON_START", false)?;

        Ok(Self {
            model_path,
            cluster_count,
            strategy,
            data_dir,
            top_k,
            retrain_on_start,
        })
    }

    #[must_use]
    pub fn model_path(&self) -> &PathBuf {
        &self.model_path
    }

    #[must_use]
    pub fn cluster_count(&self) -> NonZeroUsize {
        self.cluster_count
    }

    #[must_use]
    pub fn strategy(&self) -> TrainingStrategy {
        self.strategy
    }

    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    #[must_use]
    pub fn students_path(&self) -> PathBuf {
        self.data_dir.join("students.json")
    }

    #[must_use]
    pub fn careers_path(&self) -> PathBuf {
        self.data_dir.join("careers.json")
    }

    #[must_use]
    pub fn top_k(&self) -> NonZeroUsize {
        self.top_k
    }

    #[must_use]
    pub fn retrain_on_start(&self) -> bool {
        self.retrain_on_start
    }
}

fn parse_path(name: &'static str, default: &str) -> Result<PathBuf, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Err(ConfigError::Missing(name)),
        Ok(raw) => Ok(PathBuf::from(raw.trim())),
        Err(_) => Ok(PathBuf::from(default)),
    }
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_strategy(name: &'static str, default: &str) -> Result<TrainingStrategy, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<TrainingStrategy>()
        .map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(error),
        })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 6] = [
        "CAREER_ENGINE_MODEL_PATH",
        "CAREER_ENGINE_CLUSTER_COUNT",
        "CAREER_ENGINE_ALGORITHM",
        "CAREER_ENGINE_DATA_DIR",
        "CAREER_ENGINE_TOP_K",
        "CAREER_ENGINE_RETRAIN_ON_START",
    ];

    fn with_env<F: FnOnce()>(overrides: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = KEYS
            .iter()
            .map(|key| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| *value);
                (*key, value)
            })
            .collect();
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn from_env_uses_defaults_when_unset() {
        with_env(&[], || {
            let config = Config::from_env().expect("config should load");
            assert_eq!(config.model_path(), &PathBuf::from("model/clustering_model.json"));
            assert_eq!(config.cluster_count().get(), 5);
            assert_eq!(config.strategy(), TrainingStrategy::Auto);
            assert_eq!(config.students_path(), PathBuf::from("data/students.json"));
            assert_eq!(config.careers_path(), PathBuf::from("data/careers.json"));
            assert_eq!(config.top_k().get(), 5);
            assert!(!config.retrain_on_start());
        });
    }

    #[test]
    fn from_env_reads_overrides() {
        with_env(
            &[
                ("CAREER_ENGINE_MODEL_PATH", "/tmp/model.json"),
                ("CAREER_ENGINE_CLUSTER_COUNT", "7"),
                ("CAREER_ENGINE_ALGORITHM", "kmeans_random"),
                ("CAREER_ENGINE_TOP_K", "3"),
                ("CAREER_ENGINE_RETRAIN_ON_START", "yes"),
            ],
            || {
                let config = Config::from_env().expect("config should load");
                assert_eq!(config.model_path(), &PathBuf::from("/tmp/model.json"));
                assert_eq!(config.cluster_count().get(), 7);
                assert_eq!(config.strategy(), TrainingStrategy::PinnedRandom);
                assert_eq!(config.top_k().get(), 3);
                assert!(config.retrain_on_start());
            },
        );
    }

    #[test]
    fn zero_cluster_count_is_invalid() {
        with_env(&[("CAREER_ENGINE_CLUSTER_COUNT", "0")], || {
            let error = Config::from_env().expect_err("zero clusters should fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "CAREER_ENGINE_CLUSTER_COUNT",
                    ..
                }
            ));
        });
    }

    #[test]
    fn unknown_algorithm_is_invalid() {
        with_env(&[("CAREER_ENGINE_ALGORITHM", "spectral")], || {
            let error = Config::from_env().expect_err("unknown algorithm should fail");
            assert!(error.to_string().contains("CAREER_ENGINE_ALGORITHM"));
        });
    }

    #[test]
    fn empty_model_path_is_missing() {
        with_env(&[("CAREER_ENGINE_MODEL_PATH", "  ")], || {
            let error = Config::from_env().expect_err("empty path should fail");
            assert!(matches!(error, ConfigError::Missing("CAREER_ENGINE_MODEL_PATH")));
        });
    }
}
