//! Configuration for the script harness.
//!
//! Values come from three places, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. command-line flags, or their environment variables:
//!    - `ENGINE_WAIT_TIMEOUT_MS` (default: none, waits block indefinitely)
//!    - `ENGINE_WORKER_THREADS`  (default: tokio's choice)
//!    - `ENGINE_MAX_SESSIONS`    (default: 1024)
//!    - `ENGINE_REPORT`          (default: no report file)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Parser)]
#[clap(name = "engine-harness")]
#[clap(about = "Replay a command script against the concurrent matching engine")]
pub struct Cli {
    /// Command script to replay; stdin when omitted
    pub script: Option<PathBuf>,

    /// TOML settings file
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Deadline for each `w` command in milliseconds (0 = none)
    #[clap(long, env = "ENGINE_WAIT_TIMEOUT_MS")]
    pub wait_timeout_ms: Option<u64>,

    /// Tokio worker threads
    #[clap(long, env = "ENGINE_WORKER_THREADS")]
    pub worker_threads: Option<usize>,

    /// Largest session count a script may declare
    #[clap(long, env = "ENGINE_MAX_SESSIONS")]
    pub max_sessions: Option<u32>,

    /// Write a JSON run report here
    #[clap(long, env = "ENGINE_REPORT")]
    pub report: Option<PathBuf>,

    /// Do not print engine events to stdout
    #[clap(short, long)]
    pub quiet: bool,
}

/// Settings file contents. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub wait_timeout_ms: Option<u64>,
    pub worker_threads: Option<usize>,
    pub max_sessions: Option<u32>,
    pub report: Option<PathBuf>,
    pub events: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Resolved harness configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Script path; `None` reads stdin.
    pub script: Option<PathBuf>,

    /// Deadline applied to every wait; `None` blocks indefinitely.
    pub wait_timeout: Option<Duration>,

    pub worker_threads: Option<usize>,

    /// Upper bound on the header's session count.
    pub max_sessions: u32,

    pub report: Option<PathBuf>,

    /// Print engine events as output lines.
    pub emit_events: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            script: None,
            wait_timeout: None,
            worker_threads: None,
            max_sessions: 1024,
            report: None,
            emit_events: true,
        }
    }
}

impl Config {
    /// Build a `Config` from parsed flags, reading `--config` if given.
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::merge(cli, file))
    }

    fn merge(cli: Cli, file: FileConfig) -> Self {
        let defaults = Config::default();
        let wait_timeout_ms = cli.wait_timeout_ms.or(file.wait_timeout_ms);

        Config {
            script: cli.script,
            wait_timeout: wait_timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            worker_threads: cli.worker_threads.or(file.worker_threads),
            max_sessions: cli
                .max_sessions
                .or(file.max_sessions)
                .unwrap_or(defaults.max_sessions),
            report: cli.report.or(file.report),
            emit_events: !cli.quiet && file.events.unwrap_or(defaults.emit_events),
        }
    }
}
