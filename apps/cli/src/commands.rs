//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use buildline_core::{
    DEFAULT_SERIES, ProgressReporter, RunReport, UpstreamOptions, run_fork, run_insider_scan,
    run_upstream,
};
use buildline_shared::{
    AppConfig, BuildlineError, FetchConfig, HistoryKind, init_config, load_config,
    load_config_from,
};
use buildline_storage::HistoryStore;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// buildline: bisectable build histories for the editor and its fork.
#[derive(Parser)]
#[command(
    name = "buildline",
    version,
    about = "Reconcile editor tags, build metadata and fork releases into ordered build histories.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.buildline/buildline.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Build the stable and insider histories from upstream tags.
    Upstream {
        /// Skip metadata lookups; every build is written without a date.
        #[arg(long)]
        no_metadata: bool,
    },

    /// Build the fork history from fork releases.
    Fork,

    /// Probe the metadata provider for untagged insider builds.
    ScanInsiders,

    /// Run `upstream` then `fork`.
    All,

    /// Print a persisted history.
    Show {
        /// Which history: stable, insider, or fork.
        history: HistoryKind,
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
        0 => "buildline=info",
        1 => "buildline=debug",
        _ => "buildline=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
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
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        };
    }

    let config = resolve_config(cli.config.as_deref())?;
    let store = HistoryStore::new(config.output.clone());

    match cli.command {
        Command::Upstream { no_metadata } => {
            let options = UpstreamOptions {
                resolve_metadata: !no_metadata,
            };
            cmd_upstream(&config, &store, options).await
        }
        Command::Fork => cmd_fork(&config, &store).await,
        Command::ScanInsiders => cmd_scan(&config, &store).await,
        Command::All => cmd_all(&config, &store).await,
        Command::Show { history } => cmd_show(&store, history).await,
        Command::Config { .. } => Ok(()),
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_upstream(
    config: &AppConfig,
    store: &HistoryStore,
    options: UpstreamOptions,
) -> Result<()> {
    let fetch = FetchConfig::from_app(config);
    info!(repo = %fetch.repo_id, metadata = options.resolve_metadata, "building upstream histories");

    let reporter = CliProgress::new();
    let report = run_upstream(&fetch, store, options, &reporter).await?;
    finish("Upstream histories", &report)
}

async fn cmd_fork(config: &AppConfig, store: &HistoryStore) -> Result<()> {
    let fetch = FetchConfig::from_app(config);
    info!(repo = %fetch.fork_repo_id, "building fork history");

    let reporter = CliProgress::new();
    let report = run_fork(&fetch, store, &reporter).await?;
    finish("Fork history", &report)
}

async fn cmd_scan(config: &AppConfig, store: &HistoryStore) -> Result<()> {
    let fetch = FetchConfig::from_app(config);
    info!("scanning insider builds");

    let reporter = CliProgress::new();
    let report = run_insider_scan(&fetch, store, &DEFAULT_SERIES, &reporter).await?;
    finish("Insider scan", &report)
}

async fn cmd_all(config: &AppConfig, store: &HistoryStore) -> Result<()> {
    let fetch = FetchConfig::from_app(config);

    let reporter = CliProgress::new();
    let mut report = run_upstream(&fetch, store, UpstreamOptions::default(), &reporter).await?;

    let reporter = CliProgress::new();
    report.absorb(run_fork(&fetch, store, &reporter).await?);
    finish("All histories", &report)
}

async fn cmd_show(store: &HistoryStore, history: HistoryKind) -> Result<()> {
    let entries = store
        .load(history)
        .await
        .wrap_err_with(|| format!("cannot read the {history} history"))?;

    let odd = entries
        .iter()
        .filter(|e| !buildline_versions::is_release_version(&e.version))
        .count();
    if odd > 0 {
        warn!(count = odd, "entries with a non-release version string");
    }

    println!();
    println!("  {history} history ({} builds)", entries.len());
    println!();
    for entry in &entries {
        let short = entry.commit.get(..10).unwrap_or(&entry.commit);
        let platforms = entry
            .assets
            .as_ref()
            .map(|a| a.keys().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        println!(
            "  {:<24} {short:<10}  {:<20}  {platforms}",
            entry.version,
            entry.date.to_string()
        );
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&std::path::Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

/// Print the run summary; fail if any history was refused.
fn finish(title: &str, report: &RunReport) -> Result<()> {
    println!();
    println!("  {title}");
    println!("  Listed:        {}", report.listed);
    if !report.listing_complete {
        println!("  (listing incomplete, partial result)");
    }
    println!("  Excluded:      {}", report.excluded);
    println!("  Dated (live):  {}", report.resolved);
    println!("  Dated (fallback): {}", report.fallback_dated);
    println!("  Undated:       {}", report.undated);
    if report.unrecoverable > 0 {
        println!("  Unrecoverable: {}", report.unrecoverable);
    }
    if report.pauses > 0 {
        println!("  Pauses:        {}", report.pauses);
    }
    for outcome in &report.histories {
        match &outcome.path {
            Some(path) => println!(
                "  {:<8} {} builds -> {}",
                outcome.history.to_string(),
                outcome.records,
                path.display()
            ),
            None => println!("  {:<8} refused (empty result)", outcome.history.to_string()),
        }
    }
    println!("  Time:          {:.1}s", report.elapsed.as_secs_f64());
    println!();

    match report.refused().first() {
        Some(&history) => Err(BuildlineError::EmptyHistory { history }.into()),
        None => Ok(()),
    }
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
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn lookup(&self, key: &str, current: usize, total: usize) {
        let message = if total == 0 {
            format!("Checking [{current}] {key}")
        } else {
            format!("Checking [{current}/{total}] {key}")
        };
        self.spinner.set_message(message);
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
