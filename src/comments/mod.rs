use serde::de::{Deserializer as _, Error as DeError, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::ops::ControlFlow;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CommentsError {
    #[error("Failed to write comments file: {0}")]
    Output(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

const HEADER: [&str; 3] = ["repo", "number", "summary"];
const REPO_FIELDS: [&str; 2] = ["repository", "repo_name"];
const NUMBER_FIELDS: [&str; 2] = ["number", "pr_number"];
const SUMMARY_FIELDS: [&str; 2] = ["comment", "review_comment"];

/// Result of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub written: usize,
    pub files_read: usize,
    pub files_failed: usize,
    /// True when the walk stopped early at the row cap
    pub capped: bool,
}

/// JSON truthiness: null, false, zero and empty containers are absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_present<'a>(item: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|field| item.get(*field))
        .find(|value| is_present(value))
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull `(repo, number, summary)` out of one element, or None when the
/// repository or number is missing.
pub fn extract_row(item: &Map<String, Value>) -> Option<[String; 3]> {
    let repo = first_present(item, &REPO_FIELDS)?;
    let number = first_present(item, &NUMBER_FIELDS)?;
    let summary = first_present(item, &SUMMARY_FIELDS)
        .map(render)
        .unwrap_or_default();
    Some([render(repo), render(number), summary])
}

/// Output state shared across every file of a run.
struct Extraction {
    writer: csv::Writer<File>,
    written: usize,
    cap: usize,
    failure: Option<csv::Error>,
}

impl Extraction {
    fn is_full(&self) -> bool {
        self.written >= self.cap
    }

    fn accept(&mut self, item: &Map<String, Value>) -> ControlFlow<()> {
        let Some(row) = extract_row(item) else {
            return ControlFlow::Continue(());
        };
        if let Err(err) = self.writer.write_record(&row) {
            self.failure = Some(err);
            return ControlFlow::Break(());
        }
        self.written += 1;
        if self.is_full() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Visits a top-level JSON array one element at a time. Any other
/// top-level value holds no elements and is consumed without output.
struct ArrayVisitor<'a> {
    extraction: &'a mut Extraction,
}

impl<'de> Visitor<'de> for ArrayVisitor<'_> {
    type Value = ControlFlow<()>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON document")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(ControlFlow::Continue(()))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_bool<E>(self, _: bool) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_i64<E>(self, _: i64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_u64<E>(self, _: u64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_f64<E>(self, _: f64) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_str<E>(self, _: &str) -> Result<Self::Value, E>
    where
        E: DeError,
    {
        Ok(ControlFlow::Continue(()))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(item) = seq.next_element::<Map<String, Value>>()? {
            if self.extraction.accept(&item).is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

/// Stream one file into the extraction.
fn stream_file(path: &Path, extraction: &mut Extraction) -> Result<ControlFlow<()>, CommentsError> {
    let file = File::open(path)?;
    let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
    let parsed = (&mut de).deserialize_any(ArrayVisitor {
        extraction: &mut *extraction,
    });

    if let Some(err) = extraction.failure.take() {
        return Err(CommentsError::Output(err));
    }
    match parsed {
        Ok(flow) => {
            if flow.is_continue() {
                de.end()?;
            }
            Ok(flow)
        }
        // Stopping at the cap leaves the array unterminated, which serde_json
        // reports as an error once the visitor returns.
        Err(_) if extraction.is_full() => Ok(ControlFlow::Break(())),
        Err(err) => Err(err.into()),
    }
}

/// Walk `base_dir` for `.json` files and write up to `cap` rows of
/// `repo,number,summary` to `out_csv`.
///
/// Unreadable or malformed files are logged and skipped; failures writing
/// the output are returned.
#[instrument(skip(base_dir, out_csv), fields(base_dir = %base_dir.display(), out_csv = %out_csv.display()))]
pub fn extract_comments(base_dir: &Path, out_csv: &Path, cap: usize) -> Result<ExtractOutcome, CommentsError> {
    if let Some(parent) = out_csv.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(out_csv)?;
    writer.write_record(HEADER)?;
    let mut extraction = Extraction {
        writer,
        written: 0,
        cap,
        failure: None,
    };
    let mut outcome = ExtractOutcome::default();

    for entry in WalkDir::new(base_dir).sort_by_file_name() {
        if extraction.is_full() {
            outcome.capped = true;
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "error walking directory");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        debug!(path = %path.display(), "reading comments file");
        match stream_file(path, &mut extraction) {
            Ok(flow) => {
                outcome.files_read += 1;
                if flow.is_break() {
                    outcome.capped = true;
                    break;
                }
            }
            Err(CommentsError::Output(err)) => return Err(CommentsError::Output(err)),
            Err(err) => {
                outcome.files_failed += 1;
                warn!("error reading {}: {}", path.display(), err);
            }
        }
    }

    extraction.writer.flush()?;
    outcome.written = extraction.written;
    info!("Collected {} records -> {}", outcome.written, out_csv.display());
    Ok(outcome)
}
