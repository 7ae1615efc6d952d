//! Route map worker.
//!
//! Runs rendering and maintenance jobs over the routes listed in a manifest:
//! - Render a single variant or a raster thumbnail
//! - Warm every missing variant and thumbnail
//! - Clear cached variants, optionally with their stored blobs
//! - Recompute derived route metrics
//! - Export a track as GPX, strip raster metadata

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::WorkerConfig;
use map_pipeline::{ClearMode, MapService, RouteManifest, RouteSource};
use renderer::{normalize_raster, SubprocessRenderer};
use route_common::RenderVariant;

#[derive(Parser, Debug)]
#[command(name = "map-worker")]
#[command(about = "Render and maintain route map images")]
struct Args {
    /// Route manifest listing rasters and routes
    #[arg(long, env = "ROUTE_MANIFEST", default_value = "routes.yaml")]
    manifest: PathBuf,

    /// YAML config file (environment variables are used when absent)
    #[arg(long, env = "WORKER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one variant of a route
    Render {
        route: String,
        /// blank, header, route or header_route
        #[arg(long, default_value = "header_route")]
        variant: RenderVariant,
        /// Write the image here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate the thumbnail of a raster
    Thumbnail {
        raster: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render every missing variant and thumbnail
    Warm {
        /// Routes to warm (default: all in the manifest)
        routes: Vec<String>,
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Print the existence flags of a route
    Flags { route: String },
    /// Drop cached variants and reset flags
    Clear {
        routes: Vec<String>,
        /// Also delete stored blobs
        #[arg(long)]
        store: bool,
    },
    /// Delete stored variant blobs of routes
    Purge { routes: Vec<String> },
    /// Recompute derived metrics
    RefreshMetrics { routes: Vec<String> },
    /// Export a route's track as GPX
    Gpx {
        route: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Re-encode a raster image without its metadata
    StripMetadata { input: PathBuf, output: PathBuf },
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    if let Err(e) = run(args).await {
        error!(error = %format!("{:#}", e), "Job failed");
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    if let Command::StripMetadata { input, output } = &args.command {
        return strip_metadata(input, output).await;
    }

    let config = match &args.config {
        Some(path) => WorkerConfig::from_yaml_file(path)?,
        None => WorkerConfig::from_env()?,
    };
    config.validate()?;

    let manifest = RouteManifest::load(&args.manifest)?;
    let base_dir = args.manifest.parent().unwrap_or_else(|| Path::new("."));
    let all_routes = manifest.route_ids();
    let source = Arc::new(manifest.into_source(base_dir).await?);

    let blobs = config.blob_store()?;
    let (cache, flags) = config.cache_and_flags().await?;
    let renderer = Arc::new(SubprocessRenderer::new(config.renderer.clone()));
    let service = MapService::new(source.clone(), renderer, cache, blobs, flags)
        .with_gazetteer(config.gazetteer()?);

    let or_all = |routes: Vec<String>| if routes.is_empty() { all_routes.clone() } else { routes };

    match args.command {
        Command::Render { route, variant, out } => {
            let image = service.get_variant(&route, variant).await?;
            write_output(out.as_deref(), &image).await?;
            info!(route = %route, variant = %variant, size = image.len(), "Rendered variant");
        }
        Command::Thumbnail { raster, out } => {
            let image = service.get_thumbnail(&raster).await?;
            write_output(out.as_deref(), &image).await?;
            info!(raster = %raster, size = image.len(), "Generated thumbnail");
        }
        Command::Warm {
            routes,
            concurrency,
        } => {
            let routes = or_all(routes);
            let concurrency = concurrency.unwrap_or(config.warm_concurrency);
            let report = service.warm_all(&routes, concurrency).await;
            let stats = service.stats();
            info!(
                rendered = report.rendered,
                skipped = report.skipped,
                cache_hits = stats.cache_hits,
                render_failures = stats.render_failures,
                "Warm-up finished"
            );
            for (target, e) in &report.failures {
                error!(target = %target, error = %e, "Failed to warm");
            }
            if !report.failures.is_empty() {
                bail!("{} warm-up targets failed", report.failures.len());
            }
        }
        Command::Flags { route } => {
            let flags = service.flags(&route).await?;
            println!("{}", serde_json::to_string_pretty(&flags)?);
        }
        Command::Clear { routes, store } => {
            let mode = if store {
                ClearMode::CacheAndStore
            } else {
                ClearMode::CacheOnly
            };
            for route in or_all(routes) {
                let report = service.clear(&route, mode).await?;
                info!(
                    route = %route,
                    cache_entries = report.cache_entries,
                    blobs_deleted = report.blobs_deleted,
                    "Cleared"
                );
            }
        }
        Command::Purge { routes } => {
            for route in or_all(routes) {
                let deleted = service.purge_blobs(&route).await?;
                info!(route = %route, deleted, "Purged blobs");
            }
        }
        Command::RefreshMetrics { routes } => {
            let outcomes = service.refresh_metrics(&or_all(routes), Utc::now()).await?;
            let mut failed = 0;
            for outcome in outcomes {
                match outcome.result {
                    Ok(metrics) => println!(
                        "{}",
                        serde_json::json!({ "route": outcome.route_id, "metrics": metrics })
                    ),
                    Err(e) => {
                        failed += 1;
                        error!(route = %outcome.route_id, error = %e, "Metrics refresh failed");
                    }
                }
            }
            if failed > 0 {
                bail!("metrics refresh failed for {} routes", failed);
            }
        }
        Command::Gpx { route, out } => {
            let record = source.route(&route).await?;
            let gpx = record.track.to_gpx(&route)?;
            write_output(out.as_deref(), gpx.as_bytes()).await?;
        }
        Command::StripMetadata { input, output } => strip_metadata(&input, &output).await?,
    }

    Ok(())
}

async fn strip_metadata(input: &Path, output: &Path) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let jpeg = tokio::task::spawn_blocking(move || normalize_raster(&data)).await??;
    tokio::fs::write(output, &jpeg)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), size = jpeg.len(), "Stripped metadata");
    Ok(())
}

/// Write to `path`, or to stdout when no path is given.
async fn write_output(path: Option<&Path>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, data)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(data).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
