//! Command-line front end for the bench client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bench_client::{
    ClientSettings, ConfigStore, Downloader, FileSlot, HttpEngine, ResultsReport, RunController,
    ScenarioFile,
};
use bench_common::{ConcurrencyLevels, RequestType, RunConfig};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "bench")]
#[command(about = "Launch multi-service load test runs and compare the results", long_about = None)]
struct Cli {
    /// Settings file (YAML)
    #[arg(long, env = "BENCH_SETTINGS")]
    settings: Option<PathBuf>,

    /// Engine base URL, overrides settings
    #[arg(long)]
    base_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a run
    Run {
        /// Scenario file (YAML); defaults to the last-used configuration
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override concurrency levels, e.g. "1,5,10"
        #[arg(short, long)]
        concurrency: Option<String>,

        /// Override requests per user
        #[arg(short, long)]
        requests_per_user: Option<u32>,

        /// Image file for an image service, as INDEX=PATH (repeatable)
        #[arg(long = "image", value_name = "INDEX=PATH")]
        images: Vec<String>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Show the last-used configuration
    Show,

    /// Forget the last-used configuration
    Forget,

    /// Download the latest results CSV
    DownloadResults {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Download error records of the last run
    DownloadErrors {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    let mut settings = ClientSettings::load(cli.settings.as_deref())?;
    if let Some(url) = cli.base_url {
        settings.base_url = url;
    }
    let store = ConfigStore::new(FileSlot::new(settings.state_file.clone()));

    match cli.command {
        Commands::Run {
            scenario,
            concurrency,
            requests_per_user,
            images,
            output,
        } => {
            let mut config = match scenario {
                Some(path) => {
                    println!("Loading scenario: {}", path.display());
                    ScenarioFile::load_run_config(&path)?
                }
                None => store
                    .load()
                    .context("No scenario given and no previous configuration to restore")?,
            };

            if let Some(levels) = concurrency {
                config.concurrency_levels = ConcurrencyLevels::parse_list(&levels)
                    .with_context(|| format!("Invalid concurrency list '{}'", levels))?;
            }
            if let Some(n) = requests_per_user {
                config.requests_per_user = n;
            }
            attach_images(&mut config, &images)?;
            warn_missing_images(&config);

            println!("{}", ResultsReport::format_config(&config));
            println!();

            run(settings, store, config, &output).await
        }
        Commands::Show => {
            match store.load() {
                Some(config) => println!("{}", ResultsReport::format_config(&config)),
                None => println!("No saved configuration"),
            }
            Ok(())
        }
        Commands::Forget => {
            store.clear()?;
            println!("Saved configuration removed");
            Ok(())
        }
        Commands::DownloadResults { out } => {
            let outcome = Downloader::new(&settings)?.download_results(&out).await?;
            println!("{}", outcome.notice());
            Ok(())
        }
        Commands::DownloadErrors { out } => {
            let outcome = Downloader::new(&settings)?.download_errors(&out).await?;
            println!("{}", outcome.notice());
            Ok(())
        }
    }
}

async fn run(
    settings: ClientSettings,
    store: ConfigStore<FileSlot>,
    config: RunConfig,
    output: &str,
) -> Result<()> {
    let engine = HttpEngine::new(&settings)?;
    info!(url = engine.submit_url(), "Using engine");
    let mut controller = RunController::new(engine, store);

    let prepared = match controller.begin(&config) {
        Ok(prepared) => prepared,
        Err(e) => bail!(e.user_message()),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let pending = controller.dispatch(prepared);
    pb.set_message(controller.status_line());
    let outcome = pending.await;
    controller.complete(outcome);
    pb.finish_with_message(controller.status_line());
    println!();

    if let Some(e) = controller.last_error() {
        bail!(e.user_message());
    }
    let view = controller
        .presentation()
        .context("Run finished without results")?;

    match output {
        "json" => println!("{}", ResultsReport::format_json(view)?),
        "csv" => {
            println!("{}", ResultsReport::csv_header());
            println!("{}", ResultsReport::format_csv(view));
        }
        _ => println!("{}", ResultsReport::format_full(view)),
    }

    Ok(())
}

/// Apply `INDEX=PATH` image selections (1-based service index).
fn attach_images(config: &mut RunConfig, images: &[String]) -> Result<()> {
    for selection in images {
        let (index, path) = selection
            .split_once('=')
            .with_context(|| format!("Expected INDEX=PATH, got '{}'", selection))?;
        let index: usize = index
            .trim()
            .parse()
            .with_context(|| format!("Invalid service index in '{}'", selection))?;
        let service = index
            .checked_sub(1)
            .and_then(|i| config.service_mut(i))
            .with_context(|| format!("No service #{}", index))?;

        service.image_payload = Some(bench_client::config::read_attachment(Path::new(path.trim()))?);
        service.request_type = RequestType::Image;
    }
    Ok(())
}

fn warn_missing_images(config: &RunConfig) {
    for (index, service) in config.services.iter().enumerate() {
        if service.request_type == RequestType::Image && service.image_payload.is_none() {
            warn!(service = %service.name, "Image service has no file selected");
            println!(
                "Note: service #{} ({}) has no image selected; use --image {}=PATH",
                index + 1,
                service.name,
                index + 1
            );
        }
    }
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
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
