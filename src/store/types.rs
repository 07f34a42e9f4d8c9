/// One stored pull request, keyed by `(repo, number)`.
///
/// `body` doubles as the human-written summary label downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRecord {
    /// Repository as `owner/name`
    pub repo: String,
    /// PR number, unique within `repo`
    pub number: u64,
    pub title: String,
    pub body: String,
    /// Unified diff text
    pub diff: String,
}

impl PrRecord {
    /// True when the body has any non-whitespace content.
    pub fn has_summary(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Diff length in characters rather than bytes.
    pub fn diff_chars(&self) -> usize {
        self.diff.chars().count()
    }
}
