//! Book-Spider main entry point
//!
//! This is the command-line interface for the Book-Spider crawl engine.

use anyhow::Context as _;
use book_spider::config::{load_config_with_hash, Config};
use book_spider::crawler::{load_services, CrawlContext, SiteService};
use book_spider::output::{print_statistics, SiteStatistics};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Book-Spider: a fiction-site crawl engine
///
/// Book-Spider tracks every book a fiction-hosting site publishes, keeps a
/// versioned record of each one, and downloads complete books as plain text.
#[derive(Parser, Debug)]
#[command(name = "book-spider")]
#[command(version)]
#[command(about = "A fiction-site crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-examine trailing errored books and discover new ones
    Explore {
        #[arg(long)]
        site: Option<String>,
    },

    /// Refresh stored books
    Update {
        #[arg(long)]
        site: Option<String>,

        /// Only refresh books whose last probe failed
        #[arg(long)]
        error_only: bool,
    },

    /// Download every ended book that is not downloaded yet
    Download {
        #[arg(long)]
        site: Option<String>,
    },

    /// Reconcile downloaded flags with the files on disk
    PatchDownloadStatus {
        #[arg(long)]
        site: Option<String>,
    },

    /// Explore ids missing below the highest stored id
    PatchMissing {
        #[arg(long)]
        site: Option<String>,
    },

    /// Check that each site is reachable
    CheckAvailability {
        #[arg(long)]
        site: Option<String>,
    },

    /// Mark books whose metadata says they are complete
    ValidateEnd {
        #[arg(long)]
        site: Option<String>,
    },

    /// Show statistics from the database and exit
    Stats {
        #[arg(long)]
        site: Option<String>,
    },
}

impl Command {
    fn site(&self) -> Option<&str> {
        match self {
            Self::Explore { site }
            | Self::Update { site, .. }
            | Self::Download { site }
            | Self::PatchDownloadStatus { site }
            | Self::PatchMissing { site }
            | Self::CheckAvailability { site }
            | Self::ValidateEnd { site }
            | Self::Stats { site } => site.as_deref(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let services = open_services(&config, cli.command.site())?;

    for service in &services {
        run_command(service, &cli.command)
            .await
            .with_context(|| format!("{} failed on site {}", command_name(&cli.command), service.name()))?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("book_spider=info,warn"),
            1 => EnvFilter::new("book_spider=debug,info"),
            2 => EnvFilter::new("book_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Opens the selected sites on one shared crawl context
fn open_services(config: &Config, site: Option<&str>) -> anyhow::Result<Vec<SiteService>> {
    let context = CrawlContext::new(&config.batch).context("failed to build HTTP client")?;
    let services = load_services(config, &context, site)?;

    tracing::info!(
        "Sites: {}, shared pool: {} tasks",
        services.len(),
        context.pool().size()
    );
    Ok(services)
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Explore { .. } => "explore",
        Command::Update { .. } => "update",
        Command::Download { .. } => "download",
        Command::PatchDownloadStatus { .. } => "patch-download-status",
        Command::PatchMissing { .. } => "patch-missing",
        Command::CheckAvailability { .. } => "check-availability",
        Command::ValidateEnd { .. } => "validate-end",
        Command::Stats { .. } => "stats",
    }
}

/// Runs one command against one site
async fn run_command(service: &SiteService, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Explore { .. } => {
            let report = service.explore().await?;
            tracing::info!(
                "{}: re-examined {} ({} failed), discovered {} new books",
                service.name(),
                report.reexamined.total(),
                report.reexamined.failed,
                report.discovered.succeeded
            );
        }
        Command::Update { error_only, .. } => {
            let report = service.update(*error_only).await?;
            tracing::info!(
                "{}: refreshed {} books ({} failed)",
                service.name(),
                report.total(),
                report.failed
            );
        }
        Command::Download { .. } => {
            let report = service.download().await?;
            tracing::info!(
                "{}: downloaded {} books ({} failed)",
                service.name(),
                report.succeeded,
                report.failed
            );
        }
        Command::PatchDownloadStatus { .. } => {
            let patched = service.patch_download_status().await?;
            tracing::info!("{}: patched {} records", service.name(), patched);
        }
        Command::PatchMissing { .. } => {
            let report = service.patch_missing_records().await?;
            tracing::info!(
                "{}: probed {} missing ids ({} recovered)",
                service.name(),
                report.total(),
                report.succeeded
            );
        }
        Command::CheckAvailability { .. } => {
            service.check_availability().await?;
            println!("✓ {} is available", service.name());
        }
        Command::ValidateEnd { .. } => {
            let marked = service.validate_end()?;
            tracing::info!("{}: marked {} books as ended", service.name(), marked);
        }
        Command::Stats { .. } => {
            let summary = service.stats()?;
            print_statistics(&SiteStatistics::new(service.name(), summary));
        }
    }

    Ok(())
}
