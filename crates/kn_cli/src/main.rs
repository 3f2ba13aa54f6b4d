use anyhow::{bail, Context};
use clap::Parser;
use kn_core::config::{LogSettings, DEFAULT_CONFIG_PATH};
use kn_core::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

mod logging;
mod pipeline;
mod scheduler;

use pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Daily children's news for note.com", long_about = None)]
pub struct Cli {
    /// Configuration file; the environment is used when it does not exist
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Archive backend: file or memory
    #[arg(long, default_value = "file")]
    archive: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Post once a day at the configured time
    Run {
        /// Run once immediately instead of scheduling
        #[arg(long)]
        now: bool,
    },
    /// Post a local Markdown file
    Post { file: PathBuf },
    /// Print the title and blocks a Markdown file would be posted as
    Parse { file: PathBuf },
    /// Validate the configuration and print it with secrets redacted
    CheckConfig,
}

/// Loads the configuration and starts logging as it prescribes.
fn init(path: &Path) -> anyhow::Result<(Arc<Config>, Option<WorkerGuard>)> {
    let config = Config::load(path).with_context(|| format!("loading {}", path.display()))?;
    let guard = logging::init_logging(&config.log)?;
    info!("⚙️ Configuration loaded");
    Ok((Arc::new(config), guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { file } => {
            let _guard = logging::init_logging(&LogSettings { file: None, ..LogSettings::default() })?;
            let markdown = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let parsed = kn_poster::parse(&markdown);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::CheckConfig => {
            let (config, _guard) = init(&cli.config)?;
            println!("{:#?}", config);
        }
        Commands::Run { now } => {
            let (config, _guard) = init(&cli.config)?;
            let pipeline = Arc::new(Pipeline::from_config(config.clone(), &cli.archive)?);
            if now {
                info!("▶️ Running immediately");
                let outcome = pipeline.run().await;
                if !outcome.is_success() {
                    bail!("run finished without posting: {}", outcome);
                }
            } else {
                scheduler::run_daily(pipeline, config.post_time).await?;
            }
        }
        Commands::Post { file } => {
            let (config, _guard) = init(&cli.config)?;
            let markdown = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let pipeline = Pipeline::from_config(config, &cli.archive)?;
            let outcome = pipeline.post_markdown(&markdown).await;
            if !outcome.is_success() {
                bail!("posting {} failed: {}", file.display(), outcome);
            }
        }
    }

    Ok(())
}
