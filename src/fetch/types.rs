use std::fmt;

/// A repository identifier of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// Parse `owner/name`. Returns None for anything else, including
    /// empty segments or extra path components.
    pub fn parse(full: &str) -> Option<RepoId> {
        let (owner, name) = full.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(RepoId {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Pull request metadata as listed by the paged query.
/// Missing titles and bodies are normalized to empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrNode {
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// One page of pull request metadata.
#[derive(Debug, Clone, Default)]
pub struct PrPage {
    pub nodes: Vec<PrNode>,
    /// Opaque cursor to pass as `after` for the next page
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Outcome of fetching one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub repo: String,
    /// Per-repository limit that was asked for
    pub requested: usize,
    /// Pull requests returned by the metadata pages
    pub listed: usize,
    /// New rows written to the store
    pub inserted: usize,
    /// Diffs downloaded for keys the store already had
    pub already_present: usize,
    /// Diff downloads (or writes) that failed and were skipped
    pub failed: usize,
}
