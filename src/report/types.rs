/// Outcome of a pipeline stage as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    /// Completed, but some items were skipped
    Partial,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Partial => write!(f, "PARTIAL"),
        }
    }
}

/// Summary of a finished stage: a title plus labeled values.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub title: String,
    pub status: Status,
    pub lines: Vec<(String, String)>,
}

impl StageReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: Status::Ok,
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, label: impl Into<String>, value: impl ToString) -> Self {
        self.lines.push((label.into(), value.to_string()));
        self
    }

    /// Raise the status; a report never goes back from Partial to Ok.
    pub fn status(mut self, status: Status) -> Self {
        self.status = self.status.max(status);
        self
    }
}
