//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use reviewtopics_core::{
    BridgeConfig, BridgeTopicModel, ExtractConfig, ModelConfig, ModelResult, ProgressReporter,
    TopicParams, TopicSummary, run_extract, run_model,
};
use reviewtopics_discovery::DiscoveryOptions;
use reviewtopics_fetcher::FetchOptions;
use reviewtopics_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// reviewtopics: scrape store reviews and group them into topics.
#[derive(Parser)]
#[command(
    name = "reviewtopics",
    version,
    about = "Scrape game reviews from the store and label them with topics.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.reviewtopics/reviewtopics.toml).
    #[arg(long, global = true, env = "REVIEWTOPICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Stage 1: find games and write their reviews to CSV.
    Extract {
        /// Store search query.
        #[arg(short, long)]
        query: Option<String>,

        /// Phrase a game name must contain (defaults to the query).
        #[arg(short, long)]
        keyword: Option<String>,

        /// Maximum reviews per game.
        #[arg(long)]
        max_reviews: Option<usize>,

        /// Reviews CSV to write.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Stage 2: clean review text, assign topics, save the model.
    Model {
        /// Reviews CSV from `extract`.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Enriched CSV to write.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Where to save the fitted model.
        #[arg(long)]
        model_path: Option<PathBuf>,
    },

    /// Run `extract` then `model`, retrying each stage per `[schedule]`.
    Run,

    /// Print the cleaned form of a text.
    Normalize {
        /// Text to clean.
        text: String,
    },

    /// Summarize the topic column of an enriched CSV.
    Topics {
        /// Enriched CSV (defaults to the configured output).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Number of largest topics to list.
        #[arg(long, default_value = "20")]
        top: usize,

        /// Print the full summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reviewtopics=info",
        1 => "reviewtopics=debug",
        _ => "reviewtopics=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Extract {
            query,
            keyword,
            max_reviews,
            out,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(query) = query {
                config.discovery.query = query;
            }
            if keyword.is_some() {
                config.discovery.keyword = keyword;
            }
            if let Some(max) = max_reviews {
                config.fetch.max_reviews = max;
            }
            if let Some(out) = out {
                config.output.reviews_csv = out;
            }
            cmd_extract(&config).await
        }
        Command::Model {
            input,
            out,
            model_path,
        } => {
            let mut config = resolve_config(config_path)?;
            if let Some(input) = input {
                config.output.reviews_csv = input;
            }
            if let Some(out) = out {
                config.output.topics_csv = out;
            }
            if let Some(path) = model_path {
                config.output.model_path = path;
            }
            cmd_model(&config)
        }
        Command::Run => cmd_run(&resolve_config(config_path)?).await,
        Command::Normalize { text } => {
            println!("{}", reviewtopics_text::normalize(&text));
            Ok(())
        }
        Command::Topics { input, top, json } => {
            let config = resolve_config(config_path)?;
            let input = input.unwrap_or(config.output.topics_csv);
            cmd_topics(&input, top, json)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
        },
    }
}

/// Load config from `--config` when given, otherwise from the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Stage configuration
// ---------------------------------------------------------------------------

fn extract_config(config: &AppConfig) -> reviewtopics_shared::Result<ExtractConfig> {
    Ok(ExtractConfig {
        query: config.discovery.query.clone(),
        discovery: DiscoveryOptions::from_config(&config.api, &config.discovery)?,
        base_url: config.api.base_url()?,
        fetch: FetchOptions::from_config(&config.api, &config.fetch),
        max_reviews: config.fetch.max_reviews,
        output: config.output.reviews_csv.clone(),
    })
}

fn model_config(config: &AppConfig) -> ModelConfig {
    ModelConfig {
        input: config.output.reviews_csv.clone(),
        output: config.output.topics_csv.clone(),
        model_path: config.output.model_path.clone(),
        serialization: config.topics.serialization.clone(),
        params: TopicParams::from_config(&config.topics, &config.api.language),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Stage 2 with a freshly spawned bridge, shut down on every exit path.
fn model_with_bridge(
    config: &AppConfig,
    progress: &dyn ProgressReporter,
) -> reviewtopics_shared::Result<ModelResult> {
    let mut bridge = BridgeTopicModel::spawn(&BridgeConfig::from_config(&config.topics))?;
    let result = run_model(&model_config(config), &mut bridge, progress);
    if let Err(e) = bridge.shutdown() {
        warn!(error = %e, "topic-model bridge did not shut down cleanly");
    }
    result
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_extract(config: &AppConfig) -> Result<()> {
    info!(
        query = %config.discovery.query,
        keyword = %config.discovery.effective_keyword(),
        "extracting reviews"
    );

    let reporter = CliProgress::new();
    let result = run_extract(&extract_config(config)?, &reporter).await?;

    println!();
    println!("  Reviews extracted.");
    println!("  Games:   {}", result.games);
    if result.failed_games > 0 {
        println!("  Failed:  {}", result.failed_games);
    }
    println!("  Reviews: {}", result.reviews);
    println!("  Output:  {}", result.output.display());
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_model(config: &AppConfig) -> Result<()> {
    let reporter = CliProgress::new();
    let result = model_with_bridge(config, &reporter)?;
    print_model_result(&result);
    Ok(())
}

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let policy = config.schedule.retry_policy();
    let extract = &extract_config(config)?;

    // One spinner per attempt; a finished spinner ignores later updates.
    info!(attempts = policy.max_attempts, "running extract stage");
    let extracted = policy
        .retry("extract", move || async move {
            run_extract(extract, &CliProgress::new()).await
        })
        .await?;
    info!(reviews = extracted.reviews, "extract stage finished");

    info!(attempts = policy.max_attempts, "running model stage");
    let modelled = policy
        .retry("model", || {
            std::future::ready(model_with_bridge(config, &CliProgress::new()))
        })
        .await?;
    print_model_result(&modelled);

    Ok(())
}

fn cmd_topics(input: &Path, top: usize, json: bool) -> Result<()> {
    let rows = reviewtopics_storage::read_topic_rows(input)?;
    let summary = TopicSummary::from_rows(&rows);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("  Rows:       {}", summary.rows);
    println!("  Topics:     {}", summary.distinct_topics());
    println!("  Noise:      {}", summary.noise);
    if summary.unassigned > 0 {
        println!("  Unassigned: {}", summary.unassigned);
    }
    println!();
    for (topic, count) in summary.largest().into_iter().take(top) {
        println!("  {topic:>5}  {count}");
    }
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_model_result(result: &ModelResult) {
    println!();
    if result.modelled {
        println!("  Topics assigned.");
    } else {
        println!("  Topic modelling did not complete; topic column left empty.");
    }
    println!("  Reviews: {}", result.summary.rows);
    if result.dropped > 0 {
        println!("  Dropped: {} (no text)", result.dropped);
    }
    println!("  Topics:  {}", result.summary.distinct_topics());
    println!("  Noise:   {}", result.summary.noise);
    println!("  Output:  {}", result.output.display());
    if let Some(manifest) = &result.manifest {
        println!("  Model:   {}", manifest.display());
    }
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn game_fetched(&self, name: &str, reviews: usize, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Fetched [{current}/{total}] {name}: {reviews} reviews"));
    }

    fn texts_cleaned(&self, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Cleaning [{current}/{total}]"));
    }

    fn done(&self, _message: &str) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // A failed attempt never reaches `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
