//! ocr-bench - compare OCR engines on the same photo
//!
//! Recognizes text in a selected or piped-in image with PaddleOCR or
//! Tesseract, reports how long the engine took and keeps every result in a
//! local history database.

mod capture;
mod config;
mod shared;
mod storage;
mod views;
mod vision;
mod workflow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::capture::{capture_from_reader, ImageRef};
use crate::config::AppConfig;
use crate::shared::ResultRoute;
use crate::storage::{Database, HistoryStore};
use crate::vision::{EngineKind, EngineRegistry};
use crate::workflow::{RecognitionOutcome, RecognitionWorkflow, WorkflowError};

const CONFIG_FILE: &str = "config.toml";

/// ocr-bench - run OCR engines on photos and keep a history of the results
#[derive(Parser, Debug)]
#[command(name = "ocr-bench", version)]
#[command(about = "Recognize text in photos with PaddleOCR or Tesseract and compare the engines")]
struct Args {
    /// Config file (defaults to config.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize text in an image
    Recognize {
        /// Image file to recognize
        #[arg(conflicts_with = "stdin")]
        image: Option<PathBuf>,

        /// Read the photo from standard input
        #[arg(long)]
        stdin: bool,

        /// Engine to use (defaults to the configured one)
        #[arg(short, long, value_enum)]
        engine: Option<EngineKind>,
    },
    /// Run every engine on the same image
    Compare {
        /// Image file to recognize
        image: PathBuf,
    },
    /// Show past recognitions, newest first
    History {
        /// Show at most this many entries
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available engines
    Engines,
    /// Write a config file with default settings
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so stdout stays clean for views and JSON
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug,ort=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ort=warn"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_path = match args.config {
        Some(path) => path,
        None => storage::get_config_dir()?.join(CONFIG_FILE),
    };

    if let Command::InitConfig { force } = args.command {
        init_config(&config_path, force)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_or_create_config(&config_path);
    let data_dir = storage::get_data_dir()?;

    match args.command {
        Command::Recognize {
            image,
            stdin,
            engine,
        } => {
            let engine = engine.unwrap_or(config.general.default_engine);

            // Read the photo before any engine exists
            let captured = if stdin {
                let dir = storage::captures_dir(&config.storage, &data_dir);
                let captured = tokio::task::spawn_blocking(move || {
                    capture_from_reader(std::io::stdin().lock(), &dir)
                })
                .await??;
                Some(captured)
            } else {
                None
            };

            let (engines, workflow) = open_workflow(&config, &data_dir)?;
            let outcome = match captured {
                Some(photo) => workflow.on_photo_captured(photo, engine).await,
                None => {
                    workflow
                        .on_image_selected(image.map(ImageRef::new), engine)
                        .await
                }
            };

            let succeeded = show_outcome(&workflow, outcome);
            engines.release_all().await;
            Ok(exit_code(succeeded))
        }
        Command::Compare { image } => {
            let (engines, workflow) = open_workflow(&config, &data_dir)?;
            let image = ImageRef::new(image);

            let mut all_succeeded = true;
            for engine in EngineKind::ALL {
                let outcome = workflow.run(image.clone(), engine).await;
                all_succeeded &= show_outcome(&workflow, outcome);
                println!();
            }

            engines.release_all().await;
            Ok(exit_code(all_succeeded))
        }
        Command::History { limit, json } => {
            let history = open_history(&config, &data_dir)?;
            let mut records = history.list_all().await?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", views::render_history(&records));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Engines => {
            let registry = EngineRegistry::new(&config, data_dir);
            let engines: Vec<(EngineKind, bool)> = EngineKind::ALL
                .into_iter()
                .map(|kind| (kind, registry.is_installed(kind)))
                .collect();
            print!("{}", views::render_engines(&engines));
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(config_path: &Path) -> AppConfig {
    if config_path.exists() {
        match config::load_config(config_path) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", config_path);
                return config;
            }
            Err(e) => warn!("Ignoring unreadable configuration: {:#}", e),
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

fn init_config(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{:?} already exists, pass --force to overwrite it",
            config_path
        );
    }
    config::save_config(&AppConfig::default(), config_path)
        .with_context(|| format!("Failed to write {:?}", config_path))?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

fn open_history(config: &AppConfig, data_dir: &Path) -> Result<HistoryStore> {
    let path = storage::database_path(&config.storage, data_dir);
    let db = Database::open(&path)
        .with_context(|| format!("Failed to open history database {:?}", path))?;
    Ok(HistoryStore::new(db))
}

fn open_workflow(
    config: &AppConfig,
    data_dir: &Path,
) -> Result<(Arc<EngineRegistry>, RecognitionWorkflow)> {
    let history = open_history(config, data_dir)?;
    let engines = Arc::new(EngineRegistry::new(config, data_dir.to_path_buf()));
    let workflow = RecognitionWorkflow::new(
        Arc::clone(&engines),
        history,
        Duration::from_secs(config.storage.handoff_ttl_secs),
    );
    Ok((engines, workflow))
}

/// Follow the navigation signal to the result view, or report the status
fn show_outcome(
    workflow: &RecognitionWorkflow,
    outcome: Result<RecognitionOutcome, WorkflowError>,
) -> bool {
    match outcome {
        Ok(_) => {
            if let Some(event) = workflow.on_navigated() {
                let route = ResultRoute::from_path(&event.route);
                let result = workflow.take_result(&event.request_id);
                print!("{}", views::render_result(&route, result.as_ref()));
            }
            true
        }
        Err(_) => {
            eprintln!("{}", workflow.state().status);
            false
        }
    }
}

fn exit_code(succeeded: bool) -> ExitCode {
    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
