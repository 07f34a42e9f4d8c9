pub mod types;

pub use types::{StageReport, Status};

use colored::Colorize;
use std::path::Path;

use crate::comments::ExtractOutcome;
use crate::config::Config;
use crate::dataset::{shortfall_notice, SampleOutcome, Splits};
use crate::fetch::FetchSummary;

/// One report per repository, marked Partial when any diff was skipped.
pub fn fetch(summaries: &[FetchSummary], db: &Path) -> Vec<StageReport> {
    summaries
        .iter()
        .map(|s| {
            let status = if s.failed > 0 { Status::Partial } else { Status::Ok };
            StageReport::new(format!("Fetch {}", s.repo))
                .status(status)
                .line("Requested", s.requested)
                .line("Listed", s.listed)
                .line("Inserted", s.inserted)
                .line("Already stored", s.already_present)
                .line("Failed diffs", s.failed)
                .line("Database", db.display())
        })
        .collect()
}

pub fn sample(outcome: &SampleOutcome, requested: usize, out: &Path) -> StageReport {
    let status = if outcome.written < requested {
        Status::Partial
    } else {
        Status::Ok
    };
    let report = StageReport::new("Sample dataset")
        .status(status)
        .line("Requested", requested)
        .line("Eligible", outcome.available)
        .line("Written", outcome.written)
        .line("Output", out.display());
    match shortfall_notice(outcome.available, requested) {
        Some(notice) => report.line("Notice", notice),
        None => report,
    }
}

pub fn split(splits: &Splits, out_dir: &Path) -> StageReport {
    let (train, dev, test) = splits.counts();
    StageReport::new("Split dataset")
        .line("Train", train)
        .line("Dev", dev)
        .line("Test", test)
        .line("Output", out_dir.display())
}

pub fn comments(outcome: &ExtractOutcome, out: &Path) -> StageReport {
    let status = if outcome.files_failed > 0 {
        Status::Partial
    } else {
        Status::Ok
    };
    StageReport::new("Extract comments")
        .status(status)
        .line("Records", outcome.written)
        .line("Files read", outcome.files_read)
        .line("Files failed", outcome.files_failed)
        .line("Stopped at cap", outcome.capped)
        .line("Output", out.display())
}

pub fn config(config: &Config) -> StageReport {
    let token = match config.require_token() {
        Ok(_) => "set",
        Err(_) => "missing",
    };
    StageReport::new("Configuration")
        .line("GitHub token", token)
        .line("API URL", &config.github.api_url)
        .line("Repositories", config.github.repos.join(", "))
        .line("Diff workers", config.github.diff_workers)
        .line("Database", config.paths.db.display())
        .line("Small dataset", config.paths.small_dataset.display())
        .line("Splits directory", config.paths.splits_dir.display())
        .line("Comments directory", config.paths.comments_dir.display())
        .line("Comments output", config.paths.comments_csv.display())
        .line("Sample size", config.dataset.sample_size)
        .line("Seed", config.dataset.seed)
        .line("Max diff chars", config.dataset.max_diff_chars)
        .line("Comment cap", config.dataset.comment_cap)
        .line("Model", &config.model.id)
}

/// Render a report as terminal text.
pub fn render(report: &StageReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "═══ {} ═══ {}\n",
        report.title.bold(),
        colorize_status(report.status)
    ));
    let width = report.lines.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in &report.lines {
        out.push_str(&format!("  {:<width$}  {}\n", label, value, width = width));
    }
    out
}

/// Print a report to stdout.
pub fn print(report: &StageReport) {
    println!();
    print!("{}", render(report));
}

fn colorize_status(status: Status) -> colored::ColoredString {
    match status {
        Status::Ok => "OK".green().bold(),
        Status::Partial => "PARTIAL".yellow().bold(),
    }
}
