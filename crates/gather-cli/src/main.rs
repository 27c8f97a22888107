use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use uuid::Uuid;

mod aggregator;
mod archive;
mod config;
mod pipeline;

use config::{FileConfig, RunConfig, DEFAULT_ARCHIVE_PATH, DEFAULT_DOWNLOAD_DIR, DEFAULT_STAGING_DIR};
use pipeline::RunOutcome;

#[derive(Parser)]
#[command(
    name = "gather",
    about = "Find every image in a Google Drive folder that contains the reference person"
)]
struct Cli {
    /// Reference image of the person to find (jpg, jpeg, png, heic)
    #[arg(short, long)]
    reference: PathBuf,

    /// Google Drive folder link to search
    #[arg(short, long)]
    folder: String,

    /// Embedding distance tolerance for a positive match
    #[arg(long)]
    tolerance: Option<f32>,

    /// Directory for downloaded candidates
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Staging directory for matched copies
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Output archive path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory containing the ONNX model files
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Optional TOML config file
    #[arg(long, default_value = "gather.toml")]
    config: PathBuf,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct RunReport {
    run_id: Uuid,
    started_at: String,
    finished_at: String,
    outcome: &'static str,
    match_count: usize,
    matches: Vec<PathBuf>,
    archive: Option<PathBuf>,
    archive_media_type: Option<&'static str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let file_config = FileConfig::load(&cli.config)?;

    let run_config = RunConfig {
        reference: cli.reference,
        folder_link: cli.folder,
        tolerance: cli
            .tolerance
            .or(file_config.tolerance)
            .unwrap_or(gather_core::DEFAULT_TOLERANCE),
        download_dir: cli
            .download_dir
            .or(file_config.download_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
        staging_dir: cli
            .staging_dir
            .or(file_config.staging_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR)),
        archive_path: cli
            .output
            .or(file_config.archive_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_PATH)),
        model_dir: cli
            .model_dir
            .or(file_config.model_dir)
            .unwrap_or_else(gather_core::default_model_dir),
    };

    let drive_config = gather_drive::DriveConfig::from_env()
        .context("remote store configuration")?;
    let store = gather_drive::DriveClient::new(drive_config)
        .context("remote store client")?;

    let mut provider = gather_core::onnx::OnnxProvider::load(
        &run_config.scrfd_model_path(),
        &run_config.arcface_model_path(),
    )
    .context("loading face models")?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    tracing::info!(%run_id, folder = %run_config.folder_link, "starting run");

    match pipeline::run(&store, &mut provider, &run_config).await {
        Ok(RunOutcome::Success { matches, archive }) => {
            if cli.json {
                let report = RunReport {
                    run_id,
                    started_at: started_at.to_rfc3339(),
                    finished_at: Utc::now().to_rfc3339(),
                    outcome: "success",
                    match_count: matches.len(),
                    matches: matches.clone(),
                    archive: Some(archive.clone()),
                    archive_media_type: Some(archive::ARCHIVE_MEDIA_TYPE),
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Found {} matching images:", matches.len());
                for path in &matches {
                    println!("  {}", path.display());
                }
                println!("Archive written to {}", archive.display());
            }
            Ok(())
        }
        Ok(RunOutcome::NoMatches) => {
            if cli.json {
                let report = RunReport {
                    run_id,
                    started_at: started_at.to_rfc3339(),
                    finished_at: Utc::now().to_rfc3339(),
                    outcome: "no_matches",
                    match_count: 0,
                    matches: Vec::new(),
                    archive: None,
                    archive_media_type: None,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("No matching images found.");
            }
            Ok(())
        }
        Err(err) if err.is_input_error() => {
            eprintln!("{err}");
            std::process::exit(2);
        }
        Err(err) => Err(anyhow::Error::new(err).context("processing failed")),
    }
}
