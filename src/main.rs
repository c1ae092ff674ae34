//! Piwigo Uploadr - content-addressed gallery uploader
//!
//! Uploads the given images into one gallery category, skipping files whose
//! content the gallery already holds.

use anyhow::Context;
use clap::Parser;
use piwigo_uploadr::client::{session, GalleryClient};
use piwigo_uploadr::config::{Config, Overrides};
use piwigo_uploadr::upload::{UploadContext, Uploader};
use piwigo_uploadr::{local, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Piwigo Uploadr - upload images to a Piwigo gallery
#[derive(Parser, Debug)]
#[command(name = "piwigo-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root URL of the gallery, without trailing ws.php
    #[arg(long, env = "PIWIGO_URL")]
    url: Option<String>,

    /// User name to log in with
    #[arg(long, env = "PIWIGO_USER")]
    user: Option<String>,

    /// Password for the user
    #[arg(long, env = "PIWIGO_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Chunk size in KiB (defaults to the server's setting)
    #[arg(long)]
    chunk_size_kb: Option<u64>,

    /// Maximum hashes per existence check
    #[arg(long)]
    batch_size: Option<usize>,

    /// Category that receives the uploaded images
    #[arg(long)]
    category: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Image files or directories (one level deep)
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    logging::init(&args.log_level, args.json_logs)?;
    info!("Starting Piwigo Uploadr v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };
    config.apply_overrides(Overrides {
        url: args.url.clone(),
        username: args.user.clone(),
        password: args.password.clone(),
        chunk_size_kb: args.chunk_size_kb,
        existence_batch_size: args.batch_size,
    });
    config.validate()?;

    let client = Arc::new(GalleryClient::new(&config.gallery.url)?);

    info!("Logging in and fetching upload configuration");
    session::login(client.as_ref(), &config.gallery.username, &config.gallery.password).await?;

    let result = run(&args, &config, client.clone()).await;

    if let Err(e) = session::logout(client.as_ref()).await {
        warn!(error = %e, "Logout failed");
    }

    let report_ok = result?;
    Ok(if report_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Upload everything; returns whether every file succeeded
async fn run(args: &Args, config: &Config, client: Arc<GalleryClient>) -> anyhow::Result<bool> {
    let status = session::get_status(client.as_ref()).await?;
    let chunk_size = config
        .upload
        .chunk_size_bytes(status.upload_form_chunk_size)?;
    info!(chunk_size, version = %status.version, "Using upload chunk size");

    let paths = args.paths.clone();
    let allowed = status.allowed_extensions();
    let category = args.category;
    let files = tokio::task::spawn_blocking(move || {
        local::collect_files(&paths, &allowed)?
            .iter()
            .map(|path| local::file_record(path, category))
            .collect::<std::io::Result<Vec<_>>>()
    })
    .await??;
    info!(files = files.len(), "Prepared local files");

    let ctx = UploadContext::new(client, usize::try_from(chunk_size)?)
        .with_existence_batch_size(config.upload.existence_batch_size);
    let report = Uploader::new(ctx).sync(&files).await?;

    for failure in &report.failed {
        error!(
            path = %failure.path.display(),
            stage = %failure.stage,
            error = %failure.error,
            "Upload failed"
        );
    }
    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Done"
    );

    Ok(report.is_success())
}
