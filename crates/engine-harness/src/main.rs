//! Command-script harness for the matching engine.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use engine_harness::{run_script, Cli, Config};
use tokio::io::{self, AsyncBufRead, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(Cli::parse())?;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = config.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder.build().context("building tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &config.script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening script {}", path.display()))?;
            info!(script = %path.display(), "replaying script");
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin())),
    };

    let (report, _) = run_script(&config, input, io::stdout()).await?;

    if let Some(path) = &config.report {
        report.write_json(path)?;
        info!(report = %path.display(), "run report written");
    }

    let aborted = report.aborted_sessions();
    if aborted > 0 {
        error!(aborted, sessions = report.sessions.len(), "some sessions aborted");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
