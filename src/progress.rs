//! Scan progress reporting.
//!
//! Reports what `docsift scan` is doing so users see which file is being
//! analyzed and how much is left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for a scan.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanProgressEvent {
    /// Walking the folder. Total unknown.
    Discovering { folder: String },
    /// Starting file `n` of `total` (1-based).
    Processing { n: u64, total: u64, file: String },
    /// Loop ended, either exhausted or cancelled.
    Finished {
        completed: u64,
        failed: u64,
        cancelled: bool,
    },
}

/// Reports scan progress. Implementations write to stderr (human or JSON).
pub trait ScanProgressReporter: Send + Sync {
    fn report(&self, event: ScanProgressEvent);
}

/// Human-friendly progress on stderr: "scan  analyzing  12 / 1,340  report.pdf".
pub struct StderrProgress;

impl ScanProgressReporter for StderrProgress {
    fn report(&self, event: ScanProgressEvent) {
        let line = match &event {
            ScanProgressEvent::Discovering { folder } => {
                format!("scan {}  discovering...\n", folder)
            }
            ScanProgressEvent::Processing { n, total, file } => format!(
                "scan  analyzing  {} / {}  {}\n",
                format_number(*n),
                format_number(*total),
                file
            ),
            ScanProgressEvent::Finished {
                completed,
                failed,
                cancelled,
            } => format!(
                "scan  {}  {} completed, {} failed\n",
                if *cancelled { "cancelled" } else { "done" },
                format_number(*completed),
                format_number(*failed)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// One JSON object per line on stderr, for wrappers and GUIs.
pub struct JsonProgress;

impl ScanProgressReporter for JsonProgress {
    fn report(&self, event: ScanProgressEvent) {
        let obj = match &event {
            ScanProgressEvent::Discovering { folder } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "folder": folder
            }),
            ScanProgressEvent::Processing { n, total, file } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "n": n,
                "total": total,
                "file": file
            }),
            ScanProgressEvent::Finished {
                completed,
                failed,
                cancelled,
            } => serde_json::json!({
                "event": "finished",
                "completed": completed,
                "failed": failed,
                "cancelled": cancelled
            }),
        };
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", obj);
        let _ = err.flush();
    }
}

/// Discards every event.
pub struct NoProgress;

impl ScanProgressReporter for NoProgress {
    fn report(&self, _event: ScanProgressEvent) {}
}

/// Thousands separators: `1340` -> `"1,340"`.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, d) in digits.char_indices() {
        if i != 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(d);
    }
    out
}

/// Value of `docsift scan --progress`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human output on an interactive stderr, nothing when piped.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ScanProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            ),
        }
    }
}
