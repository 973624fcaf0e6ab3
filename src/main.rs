use clap::Parser;
use database::{JsonPostStore, PostRepository, SqlitePostStore};
use llm_interface::build_backend;
use review_pipeline::ReviewPipeline;
use reviewgen_core::{AppConfig, CoreError, ErrorExt, ErrorReporter, ProviderKind};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod report;

const DEFAULT_LOG_FILTER: &str = "reviewgen=info,review_pipeline=info,llm_interface=info,database=info";
const DEFAULT_DATABASE_URL: &str = "sqlite://reviewgen.db";

#[derive(Parser, Debug)]
#[command(
    name = "reviewgen",
    version,
    about = "Turn the most liked food posts for a keyword into a review with curated photos"
)]
struct Cli {
    /// Restaurant or dish to review
    keyword: String,
    #[arg(long, conflicts_with_all = ["database", "import"], help = "Crawler JSON export to read posts from")]
    posts: Option<PathBuf>,
    #[arg(long, help = "SQLite post store URL [default: sqlite://reviewgen.db]")]
    database: Option<String>,
    #[arg(long, help = "Crawler JSON export to load into the post store first")]
    import: Option<PathBuf>,
    #[arg(long, help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Where to write the JSON result [default: output_<keyword>.json]")]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = false, help = "Skip the AI backend entirely")]
    no_ai: bool,
    #[arg(long)]
    max_images: Option<usize>,
    #[arg(long)]
    max_posts: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ErrorReporter::new("reviewgen").report_error(&e);
            eprintln!("[{}] {}", e.error_code(), e.user_friendly_message());
            if e.is_retryable() {
                eprintln!("This looks temporary, running again may succeed.");
            }
            ExitCode::FAILURE
        }
    }
}

/// Drives `work` to completion unless `interrupt` fires first, in which case
/// `work` is dropped and the run ends with [`CoreError::Cancelled`]. A failed
/// interrupt listener only costs the ability to cancel.
async fn run_until_interrupted<T, W, I>(work: W, interrupt: I) -> Result<T, CoreError>
where
    W: Future<Output = Result<T, CoreError>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        signal = interrupt => match signal {
            Ok(()) => {
                warn!("Interrupted, abandoning the run");
                Err(CoreError::Cancelled)
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C, the run cannot be interrupted: {}", e);
                work.await
            }
        },
    }
}

async fn run(cli: Cli) -> Result<(), CoreError> {
    let config = load_config(&cli).await?;
    let backend = build_backend(&config.backend)?;
    let pipeline = ReviewPipeline::new(config.pipeline.clone()).with_optional_backend(backend);
    let repository = open_repository(&cli).await?;

    info!("Generating review for '{}'", cli.keyword);
    let output = run_until_interrupted(
        pipeline.run_from_repository(repository.as_ref(), &cli.keyword),
        tokio::signal::ctrl_c(),
    )
    .await?;

    println!("{}", report::render_console_report(&output));
    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| report::default_output_path(&cli.keyword));
    report::write_json(&path, &output).await?;
    println!("Saved to {}", path.display());
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<AppConfig, CoreError> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path).await?,
        None => AppConfig::default(),
    };
    config.apply_env(|name| std::env::var(name).ok())?;

    if let Some(max_images) = cli.max_images {
        config.pipeline.max_images = max_images;
    }
    if let Some(max_posts) = cli.max_posts {
        config.pipeline.max_posts = max_posts;
    }
    if cli.no_ai {
        config.backend.provider = ProviderKind::None;
    }

    config.validate()?;
    Ok(config)
}

async fn open_repository(cli: &Cli) -> Result<Box<dyn PostRepository>, CoreError> {
    if let Some(path) = &cli.posts {
        return Ok(Box::new(JsonPostStore::from_file(path).await?));
    }

    let url = cli.database.as_deref().unwrap_or(DEFAULT_DATABASE_URL);
    let store = SqlitePostStore::connect(url).await?;
    if let Some(path) = &cli.import {
        let export = JsonPostStore::from_file(path).await?;
        let saved = store
            .save_posts(&cli.keyword, &export.posts_for(&cli.keyword))
            .await?;
        info!("Imported {} posts for '{}'", saved, cli.keyword);
    }
    Ok(Box::new(store))
}
