//! `ftpindex` binary entry point

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ftpindex::cmd::{self, search::Format};
use ftpindex::{Config, Result};

#[derive(Parser)]
#[command(name = "ftpindex", version, about = "Crawl FTP sites into a searchable index")]
struct Cli {
    /// Config file
    #[arg(
        short = 'f',
        long,
        global = true,
        value_name = "FILE",
        default_value = "~/.ftpindexrc"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl sites and update the index
    Update {
        /// Update a single site (repeatable)
        #[arg(short = 's', long = "site", value_name = "NAME")]
        sites: Vec<String>,
        /// Only show what would be crawled
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Remove entries for sites that do not exist in the config
    Gc {
        /// Only show what would be deleted
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Keep the named site even when unconfigured (repeatable)
        #[arg(short = 'e', long = "exclude", value_name = "NAME")]
        exclude: Vec<String>,
    },
    /// Search indexed directories
    Search {
        /// Only search the named site
        #[arg(short = 's', long, value_name = "NAME")]
        site: Option<String>,
        /// Maximum number of results, 0 for all
        #[arg(short = 'm', long, value_name = "N", default_value_t = 0)]
        max_count: usize,
        /// Sort order as COLUMN[:asc|desc] (repeatable)
        #[arg(short = 'o', long = "order", value_name = "COLUMN[:DIR]")]
        order: Vec<String>,
        /// Output format; defaults to table on a terminal, path otherwise
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Keywords to match against directory paths
        #[arg(required = true, value_name = "KEYWORDS")]
        keywords: Vec<String>,
    },
    /// Validate the configuration and print it
    Test,
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cmd::expand_tilde(&cli.config))?;
    match cli.command {
        Commands::Update { sites, dry_run } => cmd::update::run(&config, &sites, dry_run).await,
        Commands::Gc { dry_run, exclude } => cmd::gc::run(&config, dry_run, &exclude),
        Commands::Search {
            site,
            max_count,
            order,
            format,
            keywords,
        } => cmd::search::run(
            &config,
            site.as_deref(),
            max_count,
            &order,
            format,
            &keywords,
        ),
        Commands::Test => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("ftpindex: {err}");
        process::exit(1);
    }
}
