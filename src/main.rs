mod comments;
mod config;
mod dataset;
mod fetch;
mod report;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::fetch::{Fetcher, GitHubClient, WorkerPool};
use crate::store::RecordStore;

/// PR Dataset: collects GitHub pull requests and their diffs, then builds
/// diff → summary datasets for fine-tuning a summarization model.
#[derive(Parser, Debug)]
#[command(name = "pr-dataset", version, about)]
struct Cli {
    /// Config file (defaults to .pr-dataset.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch PR metadata and diffs for every configured repository
    Fetch {
        /// Maximum PRs to fetch per repository
        #[arg(default_value_t = 100)]
        limit: usize,
    },
    /// Sample stored PRs into the small dataset CSV
    Sample,
    /// Split the small dataset into train/dev/test
    Split,
    /// Extract review comments from raw JSON dumps
    Comments,
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = dotenvy::dotenv() {
        debug!(error = %err, "no .env file loaded");
    }

    info!("loading configuration");
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch { limit } => run_fetch(&config, limit).await?,
        Command::Sample => {
            let _span = info_span!("sample").entered();
            let store = RecordStore::open(&config.paths.db)?;
            let out = &config.paths.small_dataset;
            let outcome = dataset::sample_dataset(&store, &config.dataset, out)?;
            report::print(&report::sample(&outcome, config.dataset.sample_size, out));
        }
        Command::Split => {
            let _span = info_span!("split").entered();
            let splits = dataset::split_dataset(
                &config.paths.small_dataset,
                &config.paths.splits_dir,
                config.dataset.seed,
            )?;
            report::print(&report::split(&splits, &config.paths.splits_dir));
        }
        Command::Comments => {
            let _span = info_span!("comments").entered();
            let outcome = comments::extract_comments(
                &config.paths.comments_dir,
                &config.paths.comments_csv,
                config.dataset.comment_cap,
            )?;
            report::print(&report::comments(&outcome, &config.paths.comments_csv));
        }
        Command::Config => report::print(&report::config(&config)),
    }

    Ok(())
}

async fn run_fetch(config: &Config, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let token = config.require_token()?;
    let repos = config.repositories()?;
    debug!(repos = repos.len(), limit, "starting fetch");

    let store = RecordStore::open(&config.paths.db)?;
    let client = GitHubClient::new(&config.github.api_url, token)?;
    let fetcher = Fetcher::new(client, store.clone(), WorkerPool::new(config.github.diff_workers));

    let summaries = fetcher.run(&repos, limit).await?;
    info!(rows = store.count()?, "All PRs fetched into {}", config.paths.db.display());
    for built in report::fetch(&summaries, &config.paths.db) {
        report::print(&built);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_limit_defaults_to_100() {
        let cli = Cli::try_parse_from(["pr-dataset", "fetch"]).unwrap();
        match cli.command {
            Command::Fetch { limit } => assert_eq!(limit, 100),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_accepts_positional_limit() {
        let cli = Cli::try_parse_from(["pr-dataset", "fetch", "250"]).unwrap();
        assert!(matches!(cli.command, Command::Fetch { limit: 250 }));
    }

    #[test]
    fn test_fetch_rejects_non_numeric_limit() {
        assert!(Cli::try_parse_from(["pr-dataset", "fetch", "many"]).is_err());
    }

    #[test]
    fn test_stages_take_no_arguments() {
        assert!(Cli::try_parse_from(["pr-dataset", "sample", "extra"]).is_err());
        let cli = Cli::try_parse_from(["pr-dataset", "--config", "alt.toml", "split"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(cli.command, Command::Split));
    }
}
