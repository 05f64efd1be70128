use std::sync::OnceLock;

use anyhow::{Error, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Tracing サブスクライバを一度だけ初期化する。
///
/// `RUST_LOG` が未設定の場合は `info` レベルで JSON ログを出力する。
/// 同時に呼ばれても初期化は一度だけ行われ、全員が同じ結果を受け取る。
///
/// # Errors
/// 別のグローバルサブスクライバが既に設定されている場合はエラーを返す。
pub fn init() -> Result<()> {
    TRACING_INIT
        .get_or_init(install_subscriber)
        .clone()
        .map_err(Error::msg)
}

fn install_subscriber() -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| e.to_string())?;

    info!(service = env!("CARGO_PKG_NAME"), "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_init_runs_once_and_agrees() {
        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| init().is_ok())).collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(init().is_ok(), results[0]);
    }
}
