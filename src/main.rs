use std::env;
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{error, info};

use career_engine::{app::ComponentRegistry, config::Config};

enum Command {
    Train,
    Stats,
    Predict { vector: Vec<f64> },
    Recommend { vector: Vec<f64>, top_k: Option<usize> },
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(|s| s.as_str())
            })
            .unwrap_or("unknown panic payload");

        if let Some(location) = panic_info.location() {
            error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                column = location.column(),
                message,
                "panic occurred"
            );
        } else {
            error!(
                thread = thread_name,
                message, "panic occurred without location information"
            );
        }
    }));

    let command = parse_args()?;

    // Tracing initialization is handled by Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;

    match command {
        Command::Train => {
            let state = registry.train_from_dataset().context("training failed")?;
            info!(active = ?state.active, "training finished");
            print_json(&state.selection)?;
        }
        Command::Stats => {
            registry.bootstrap()?;
            let report = registry.report().context("failed to build model report")?;
            print_json(&report)?;
        }
        Command::Predict { vector } => {
            registry.bootstrap()?;
            let clusters = registry.clusters();
            let assignment = clusters.predict(&vector)?;
            let probabilities = clusters.predict_probabilities(&vector)?;
            print_json(&serde_json::json!({
                "cluster_id": assignment.cluster_id,
                "cluster_name": assignment.cluster_name,
                "probabilities": probabilities,
                "algorithm": clusters.active_algorithm(),
            }))?;
        }
        Command::Recommend { vector, top_k } => {
            let top_k = top_k.unwrap_or_else(|| registry.config().top_k().get());
            let recommender = registry.recommender()?;
            let recommendations = recommender.recommend(&vector, None, top_k);
            registry.telemetry().metrics().recommendations.inc();
            print_json(&recommendations)?;
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        bail!("a command is required");
    };

    let mut vector = None;
    let mut top_k = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--vector" => {
                let value = args
                    .next()
                    .context("--vector requires comma separated numbers")?;
                vector = Some(parse_vector(&value)?);
            }
            "--top-k" => {
                let value = args.next().context("--top-k requires a number")?;
                let parsed = value
                    .parse::<usize>()
                    .context("--top-k must be a positive integer")?;
                top_k = Some(parsed);
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            _ => {
                bail!("unknown argument: {}", arg);
            }
        }
    }

    match command.as_str() {
        "train" => Ok(Command::Train),
        "stats" => Ok(Command::Stats),
        "predict" => Ok(Command::Predict {
            vector: vector.ok_or_else(|| anyhow!("--vector is required"))?,
        }),
        "recommend" => Ok(Command::Recommend {
            vector: vector.ok_or_else(|| anyhow!("--vector is required"))?,
            top_k,
        }),
        "--help" | "help" => {
            print_usage();
            process::exit(0);
        }
        other => bail!("unknown command: {other}"),
    }
}

fn parse_vector(raw: &str) -> Result<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let value = part
                .parse::<f64>()
                .with_context(|| format!("invalid vector element: {part}"))?;
            if !value.is_finite() {
                bail!("vector element must be finite: {part}");
            }
            Ok(value)
        })
        .collect()
}

fn print_usage() {
    eprintln!(
        "Usage: career-engine <train|stats|predict|recommend> [--vector 0.1,0.2,...] [--top-k 5]"
    );
}
