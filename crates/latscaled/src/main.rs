//! latscaled — the latency-driven autoscaler daemon.
//!
//! Single binary that validates the configuration and then runs two
//! long-lived tasks connected by one bounded channel:
//! - Sampler (probes the function endpoint with `hey`)
//! - Decision engine (hysteresis + `kubectl` scaling)
//!
//! # Usage
//!
//! ```text
//! latscaled run --config latscale.toml
//! latscaled check --config latscale.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info};

use latscale_autoscale::{DecisionEngine, Kubectl, Scaler};
use latscale_core::{ConfigError, LogLevel, RawConfig, ScalingConfig};
use latscale_probe::{HeyRunner, Sampler};

#[derive(Parser)]
#[command(
    name = "latscaled",
    about = "Latency-driven autoscaler for a single function deployment",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and run the control loop.
    Run {
        #[command(flatten)]
        opts: CommonOpts,
    },
    /// Validate the configuration and exit.
    Check {
        #[command(flatten)]
        opts: CommonOpts,
    },
}

#[derive(clap::Args)]
struct CommonOpts {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "latscale.toml")]
    config: PathBuf,

    /// Override [logging].level (DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { opts } => {
            let config = load_config(&opts)?;
            run(config).await
        }
        Command::Check { opts } => {
            let config = load_config(&opts)?;
            info!(
                deployment = %config.target.deployment,
                namespace = %config.target.namespace,
                "configuration is valid"
            );
            Ok(())
        }
    }
}

/// Read the config, set up logging from it, then validate it.
///
/// Logging has to exist before validation so that violations are
/// reported through it, which is why the raw file is read first.
fn load_config(opts: &CommonOpts) -> anyhow::Result<ScalingConfig> {
    let raw = RawConfig::from_file(&opts.config);
    let level = resolve_level(opts.log_level, raw.as_ref().ok());
    init_tracing(level, opts.log_format);

    let result = raw.and_then(|raw| raw.validate());
    report_config(&opts.config, result)
}

/// CLI flag first, then the file's level, then `INFO`.
fn resolve_level(flag: Option<LogLevel>, raw: Option<&RawConfig>) -> LogLevel {
    flag.or_else(|| raw.and_then(RawConfig::log_level_hint))
        .unwrap_or_default()
}

fn init_tracing(level: LogLevel, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_directive()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn report_config(
    path: &Path,
    result: Result<ScalingConfig, ConfigError>,
) -> anyhow::Result<ScalingConfig> {
    match result {
        Ok(config) => {
            info!(path = %path.display(), "configuration check completed");
            Ok(config)
        }
        Err(e) => {
            for violation in e.violations() {
                error!(field = violation.field, "{}", violation.message);
            }
            error!(path = %path.display(), error = %e, "configuration rejected");
            bail!("configuration rejected: {e}")
        }
    }
}

async fn run(config: ScalingConfig) -> anyhow::Result<()> {
    let band = config.band();
    info!(
        deployment = %config.target.deployment,
        namespace = %config.target.namespace,
        url = %config.target.url,
        target_ms = config.latency.target_ms,
        tolerance = config.latency.tolerance,
        low_secs = band.low,
        high_secs = band.high,
        "latscale daemon starting"
    );

    // ── Wire the pipeline ──────────────────────────────────────

    let (tx, rx) = mpsc::channel(config.sampling.channel_capacity);

    let sampler = Sampler::new(HeyRunner::from_config(&config.sampling), &config, tx)?;
    let scaler = Scaler::new(Kubectl::new(config.kubectl_path.clone()), &config);
    let mut engine = DecisionEngine::new(scaler, &config);

    // ── Start background tasks ─────────────────────────────────

    let mut sampler_handle = tokio::spawn(sampler.run());
    let mut engine_handle = tokio::spawn(async move {
        engine.run(rx).await;
    });

    // Both loops run until the process is told to stop.
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("shutdown signal received");
        }
        res = &mut sampler_handle => {
            bail!("sampler stopped unexpectedly: {res:?}");
        }
        res = &mut engine_handle => {
            bail!("decision engine stopped unexpectedly: {res:?}");
        }
    }

    sampler_handle.abort();
    engine_handle.abort();

    info!("latscale daemon stopped");
    Ok(())
}
