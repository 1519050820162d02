//! sdxmltv - Schedules Direct to XMLTV guide builder.

/// Application configuration (TOML).
mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sdxmltv_api::schedules_direct::{SchedulesDirectClient, TokenStore};
use sdxmltv_cache::{CacheGate, SnapshotWriter};
use sdxmltv_guide::{GuideService, ensure_broadcast_lineup};
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};

/// Cached guide document file name inside the cache directory.
const GUIDE_FILE: &str = "xmltv.xml";
/// Persisted provider token file name inside the cache directory.
const TOKEN_FILE: &str = "sd_token.json";

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Config directory holding `config.toml` (default: `$XDG_CONFIG_HOME/sdxmltv`).
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Write the guide, rebuilding it only when the cache is stale.
    Guide(OutputArgs),
    /// Rebuild the guide regardless of cache age.
    Refresh(OutputArgs),
    /// Ensure a broadcast lineup is on the account and list account lineups.
    Lineups,
    /// Show cache age and freshness.
    Status,
    /// Write a default config file.
    Init,
}

/// Arguments for the `guide` and `refresh` subcommands.
#[derive(clap::Args)]
struct OutputArgs {
    /// Write the document to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

/// Config loaded from disk with environment overrides applied.
#[derive(Debug)]
struct LoadedConfig {
    /// Parsed config.
    config: AppConfig,
    /// Resolved cache directory.
    cache_dir: PathBuf,
}

/// Loads the config file and applies environment overrides.
///
/// # Errors
///
/// Returns an error if the config path cannot be resolved, the file cannot be
/// parsed, or an override is invalid.
fn load_config(dir: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    let mut config = AppConfig::load(&config_path).context("failed to load config")?;
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    let cache_dir = config.resolve_cache_dir(&config_path);
    tracing::debug!(config = %config_path.display(), cache_dir = %cache_dir.display(), "config loaded");
    Ok(LoadedConfig { config, cache_dir })
}

/// Builds the Schedules Direct client from the provider settings.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the client fails to build.
fn build_client(loaded: &LoadedConfig) -> Result<SchedulesDirectClient> {
    let provider = &loaded.config.provider;
    SchedulesDirectClient::builder()
        .base_url(provider.base_url()?)
        .user_agent(provider.user_agent.clone())
        .credentials(provider.username.clone(), provider.password.clone())
        .token_store(TokenStore::new(loaded.cache_dir.join(TOKEN_FILE)))
        .timeout(provider.timeout())
        .build()
        .context("failed to build Schedules Direct client")
}

/// Builds the cache gate for the guide document.
fn build_gate(loaded: &LoadedConfig) -> CacheGate {
    CacheGate::with_hours(
        loaded.cache_dir.join(GUIDE_FILE),
        loaded.config.epg.cache_hours,
    )
}

/// Builds the snapshot writer (disabled unless `epg.write_snapshots`).
fn build_snapshots(loaded: &LoadedConfig) -> SnapshotWriter {
    if loaded.config.epg.write_snapshots {
        SnapshotWriter::new(&loaded.cache_dir)
    } else {
        SnapshotWriter::disabled()
    }
}

/// Builds the cache-gated guide service.
///
/// # Errors
///
/// Returns an error if the config is incomplete or the client fails to build.
fn build_service(dir: Option<&PathBuf>) -> Result<GuideService<SchedulesDirectClient>> {
    let loaded = load_config(dir)?;
    loaded.config.validate().context("invalid config")?;
    let client = build_client(&loaded)?;
    Ok(GuideService::new(
        client,
        loaded.config.guide_settings(),
        build_gate(&loaded),
        build_snapshots(&loaded),
    ))
}

/// Writes the document to `output`, or to stdout when `None`.
///
/// # Errors
///
/// Returns an error if the file or stdout write fails.
fn write_output(body: &[u8], output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        sdxmltv_cache::write_atomic(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes = body.len(), "guide written");
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(body)
        .and_then(|()| stdout.flush())
        .context("failed to write guide to stdout")
}

/// Runs the `guide` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid, a needed rebuild fails, or the
/// output cannot be written.
#[instrument(skip_all)]
async fn run_guide(args: &OutputArgs, dir: Option<&PathBuf>) -> Result<()> {
    let service = build_service(dir)?;
    let served = service.serve().await.context("failed to build guide")?;
    tracing::info!(
        origin = ?served.origin,
        cache_control = %served.cache_control(),
        bytes = served.body.len(),
        "guide ready"
    );
    write_output(&served.body, args.output.as_deref())
}

/// Runs the `refresh` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid, the rebuild fails, or the
/// output cannot be written.
#[instrument(skip_all)]
async fn run_refresh(args: &OutputArgs, dir: Option<&PathBuf>) -> Result<()> {
    let service = build_service(dir)?;
    let body = service.refresh().await.context("failed to refresh guide")?;
    tracing::info!(
        path = %service.gate().path().display(),
        bytes = body.len(),
        "guide rebuilt"
    );
    write_output(&body, args.output.as_deref())
}

/// Runs the `lineups` subcommand.
///
/// # Errors
///
/// Returns an error if the config is invalid or a provider call fails.
#[instrument(skip_all)]
async fn run_lineups(dir: Option<&PathBuf>) -> Result<()> {
    let loaded = load_config(dir)?;
    loaded.config.validate().context("invalid config")?;
    let client = build_client(&loaded)?;
    let epg = &loaded.config.epg;

    let lineups = ensure_broadcast_lineup(
        &client,
        &epg.postal_code,
        &epg.country,
        &build_snapshots(&loaded),
    )
    .await
    .context("failed to resolve lineups")?;

    if lineups.lineups.is_empty() {
        tracing::info!("No lineups on account.");
        return Ok(());
    }

    tracing::info!("Lineup\t\t\tTransport\tLocation\tName");
    for lineup in &lineups.lineups {
        tracing::info!(
            "{}\t{}\t\t{}\t\t{}{}",
            lineup.id,
            lineup.transport.as_deref().unwrap_or("-"),
            lineup.location.as_deref().unwrap_or("-"),
            lineup.name.as_deref().unwrap_or("-"),
            if lineup.is_broadcast() { " (broadcast)" } else { "" },
        );
    }
    tracing::info!("Total: {} lineups", lineups.lineups.len());

    Ok(())
}

/// Runs the `status` subcommand.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded.
#[instrument(skip_all)]
fn run_status(dir: Option<&PathBuf>) -> Result<()> {
    let loaded = load_config(dir)?;
    let gate = build_gate(&loaded);

    tracing::info!("Cache file: {}", gate.path().display());
    let now = SystemTime::now();
    let Some(age) = gate.age_at(now) else {
        tracing::info!("Guide cache: missing");
        return Ok(());
    };

    let state = if gate.is_fresh_at(now) { "fresh" } else { "stale" };
    tracing::info!(
        "Guide cache: {state} (age {}s, max age {}s)",
        age.as_secs(),
        gate.max_age().as_secs()
    );

    Ok(())
}

/// Runs the `init` subcommand.
///
/// # Errors
///
/// Returns an error if a config file already exists or cannot be written.
#[instrument(skip_all)]
fn run_init(dir: Option<&PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(dir).context("failed to resolve config path")?;
    if config_path.exists() {
        bail!("config already exists: {}", config_path.display());
    }

    AppConfig::default()
        .save(&config_path)
        .context("failed to write default config")?;
    tracing::info!("Wrote {}", config_path.display());

    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // stdout carries the XMLTV document; logs go to stderr.
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Guide(args) => run_guide(&args, cli.dir.as_ref()).await,
        Commands::Refresh(args) => run_refresh(&args, cli.dir.as_ref()).await,
        Commands::Lineups => run_lineups(cli.dir.as_ref()).await,
        Commands::Status => run_status(cli.dir.as_ref()),
        Commands::Init => run_init(cli.dir.as_ref()),
    }
}
