pub mod github;
pub mod pool;
pub mod types;

pub use github::GitHubClient;
pub use pool::{TaskError, WorkerPool};
pub use types::{FetchSummary, PrNode, PrPage, RepoId};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, info_span, instrument, warn, Instrument};

use crate::store::{PrRecord, RecordStore, StoreError};

/// Largest page the GraphQL API serves.
pub const MAX_PAGE_SIZE: usize = 100;

/// Progress is reported after this many completed diff downloads.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Repository {0} not found")]
    RepositoryNotFound(String),

    #[error("Failed to store PR: {0}")]
    Store(#[from] StoreError),

    #[error("Storage task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

/// Source of pull request metadata, one page at a time.
///
/// The first request carries no cursor; later requests pass the
/// `end_cursor` of the previous page.
#[async_trait]
pub trait PagedQuerySource: Send + Sync {
    async fn fetch_page(
        &self,
        repo: &RepoId,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<PrPage, FetchError>;
}

/// Source of unified diff text for a single pull request.
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn fetch_diff(&self, repo: &RepoId, number: u64) -> Result<String, FetchError>;
}

/// Collects pull requests for a list of repositories into the record store.
pub struct Fetcher<S> {
    source: Arc<S>,
    store: RecordStore,
    pool: WorkerPool,
}

impl<S> Fetcher<S>
where
    S: PagedQuerySource + DiffSource + 'static,
{
    pub fn new(source: S, store: RecordStore, pool: WorkerPool) -> Self {
        Self {
            source: Arc::new(source),
            store,
            pool,
        }
    }

    /// Fetch up to `limit` pull requests per repository.
    ///
    /// Any metadata failure aborts the whole run. Diff failures are logged
    /// and counted in the returned summaries.
    pub async fn run(&self, repos: &[RepoId], limit: usize) -> Result<Vec<FetchSummary>, FetchError> {
        let mut summaries = Vec::with_capacity(repos.len());
        for repo in repos {
            let span = info_span!("fetch_repo", repo = %repo);
            let summary = self.fetch_repo(repo, limit).instrument(span).await?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    async fn fetch_repo(&self, repo: &RepoId, limit: usize) -> Result<FetchSummary, FetchError> {
        info!(limit, "fetching pull request metadata");
        let nodes = self.collect_metadata(repo, limit).await?;
        info!(total = nodes.len(), "fetched metadata");

        let mut summary = self.download_diffs(repo, nodes).await;
        summary.requested = limit;
        Ok(summary)
    }

    /// Page through metadata in cursor order until `limit` nodes are
    /// collected or the remote has no more pages.
    #[instrument(skip(self, repo), fields(repo = %repo))]
    pub async fn collect_metadata(&self, repo: &RepoId, limit: usize) -> Result<Vec<PrNode>, FetchError> {
        let mut fetched: Vec<PrNode> = Vec::new();
        let mut cursor: Option<String> = None;

        while fetched.len() < limit {
            let page_size = (limit - fetched.len()).min(MAX_PAGE_SIZE);
            let page = self
                .source
                .fetch_page(repo, page_size, cursor.as_deref())
                .await?;

            let received = page.nodes.len();
            fetched.extend(page.nodes);
            info!(received, total = fetched.len(), "retrieved page");

            if !page.has_next_page || received == 0 {
                break;
            }
            match page.end_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    warn!("remote reported more pages without a cursor; stopping");
                    break;
                }
            }
        }

        fetched.truncate(limit);
        Ok(fetched)
    }

    /// Download and store every diff through the worker pool.
    async fn download_diffs(&self, repo: &RepoId, nodes: Vec<PrNode>) -> FetchSummary {
        let listed = nodes.len();
        info!(workers = self.pool.width(), "downloading diffs");

        let tasks: Vec<_> = nodes
            .into_iter()
            .map(|node| {
                let source = Arc::clone(&self.source);
                let store = self.store.clone();
                let repo = repo.clone();
                async move {
                    let number = node.number;
                    let result = fetch_and_store(source.as_ref(), store, &repo, node).await;
                    if let Err(err) = &result {
                        warn!(repo = %repo, pr = number, error = %err, "error fetching diff");
                    }
                    result
                }
            })
            .collect();

        let results = self
            .pool
            .run(tasks, |done, total| {
                if should_report(done, total) {
                    info!("{}/{} diffs processed", done, total);
                }
            })
            .await;

        let mut summary = FetchSummary {
            repo: repo.to_string(),
            listed,
            ..FetchSummary::default()
        };
        for result in results {
            match result {
                Ok(true) => summary.inserted += 1,
                Ok(false) => summary.already_present += 1,
                Err(TaskError::Failed(_)) => summary.failed += 1,
                Err(TaskError::Aborted(err)) => {
                    warn!(error = %err, "diff worker aborted");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

/// Progress is logged on every `PROGRESS_EVERY`th completion and on the last.
fn should_report(done: usize, total: usize) -> bool {
    done % PROGRESS_EVERY == 0 || done == total
}

async fn fetch_and_store<S: DiffSource>(
    source: &S,
    store: RecordStore,
    repo: &RepoId,
    node: PrNode,
) -> Result<bool, FetchError> {
    let diff = source.fetch_diff(repo, node.number).await?;
    let record = PrRecord {
        repo: repo.to_string(),
        number: node.number,
        title: node.title,
        body: node.body,
        diff,
    };
    let inserted = tokio::task::spawn_blocking(move || store.upsert_if_absent(&record)).await??;
    Ok(inserted)
}
