//! Chunk aggregation: the two ways a document's chunks become one
//! [`AnalysisOutcome`].
//!
//! - **Combine-then-analyze** ([`analyze_combined`]): chunk texts are packed
//!   into one bounded blob by [`combine_chunks`] and analyzed once (four
//!   requests). Confidence is the fraction of the four operations that
//!   succeeded.
//! - **Per-chunk-then-merge** ([`analyze_per_chunk`]): every chunk is
//!   analyzed on its own (4×N requests) and the successes are merged:
//!   numbered summaries, case-insensitive deduplicated keywords and
//!   categories, mean sentiment. Confidence is the fraction of chunks that
//!   succeeded.
//!
//! Sub-operation failures never abort aggregation; they are collected in
//! [`AnalysisOutcome::failures`].

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use crate::llm::{AnalysisClient, AnalysisOp};
use crate::normalize::{truncate_chars, PARAGRAPH_BREAK};

/// Summary stored when no chunk produced one.
pub const NO_SUMMARY_PLACEHOLDER: &str = "Could not summarize the document.";

const ELLIPSIS: &str = "...";

/// Number of operations run per analyzed text.
pub const OPS_PER_TEXT: usize = AnalysisOp::ALL.len();

/// One failed sub-operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpFailure {
    /// Chunk index in per-chunk mode; `None` for the combined blob.
    pub chunk: Option<usize>,
    pub op: AnalysisOp,
    pub message: String,
}

impl fmt::Display for OpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(i) => write!(f, "chunk {} {}: {}", i, self.op, self.message),
            None => write!(f, "{}: {}", self.op, self.message),
        }
    }
}

/// Document-level result of one aggregation run.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub summary: String,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub sentiment: f64,
    pub confidence: f64,
    pub elapsed: Duration,
    pub failures: Vec<OpFailure>,
    /// Texts (the blob, or chunks) counted as successful.
    pub succeeded: usize,
    pub total: usize,
    /// Too many failures to trust the result.
    pub unreliable: bool,
}

impl AnalysisOutcome {
    /// All failure messages in one line.
    pub fn error_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// The four operation results for one text.
#[derive(Debug, Default)]
struct TextAnalysis {
    summary: Option<String>,
    keywords: Option<Vec<String>>,
    categories: Option<Vec<String>>,
    sentiment: Option<f64>,
    failures: Vec<(AnalysisOp, String)>,
}

async fn analyze_text(client: &AnalysisClient, text: &str) -> TextAnalysis {
    let mut out = TextAnalysis::default();

    match client.summarize(text).await {
        Ok(summary) => out.summary = Some(summary),
        Err(e) => out.failures.push((AnalysisOp::Summary, e.to_string())),
    }
    match client.extract_keywords(text).await {
        Ok(keywords) => out.keywords = Some(keywords),
        Err(e) => out.failures.push((AnalysisOp::Keywords, e.to_string())),
    }
    match client.categorize(text).await {
        Ok(categories) => out.categories = Some(categories),
        Err(e) => out.failures.push((AnalysisOp::Categories, e.to_string())),
    }
    match client.score_sentiment(text).await {
        Ok(score) => out.sentiment = Some(score.score),
        Err(e) => out.failures.push((AnalysisOp::Sentiment, e.to_string())),
    }

    out
}

/// Pack chunk texts into one blob of at most `budget` characters.
///
/// Whole chunks are joined with `"\n\n"` while they fit. The first chunk
/// that does not fit is cut to the remaining space minus the ellipsis and
/// suffixed with `...`, but only when more than `min_tail` characters
/// (and more than the ellipsis itself) remain; everything after it is
/// dropped.
pub fn combine_chunks(chunks: &[String], budget: usize, min_tail: usize) -> String {
    let joiner_chars = PARAGRAPH_BREAK.chars().count();
    let mut out = String::new();
    let mut used = 0usize;

    for chunk in chunks {
        let joiner = if out.is_empty() { 0 } else { joiner_chars };
        let chunk_chars = chunk.chars().count();

        if used + joiner + chunk_chars <= budget {
            if joiner > 0 {
                out.push_str(PARAGRAPH_BREAK);
            }
            out.push_str(chunk);
            used += joiner + chunk_chars;
            continue;
        }

        let remaining = budget.saturating_sub(used + joiner);
        if remaining > min_tail && remaining > ELLIPSIS.len() {
            let keep = remaining - ELLIPSIS.len();
            if joiner > 0 {
                out.push_str(PARAGRAPH_BREAK);
            }
            out.push_str(truncate_chars(chunk, keep));
            out.push_str(ELLIPSIS);
        }
        break;
    }

    out
}

/// Numbered list of chunk summaries. One summary is returned verbatim; none
/// yields [`NO_SUMMARY_PLACEHOLDER`].
pub fn merge_summaries(summaries: &[String]) -> String {
    let summaries: Vec<&str> = summaries
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    match summaries.as_slice() {
        [] => NO_SUMMARY_PLACEHOLDER.to_string(),
        [only] => only.to_string(),
        many => many
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Case-insensitive dedup keeping first-seen casing and order, at most
/// `cap` items.
pub fn dedup_terms<I, S>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for item in items {
        if out.len() >= cap {
            break;
        }
        let term = item.as_ref().trim();
        if term.is_empty() {
            continue;
        }
        if seen.insert(term.to_lowercase()) {
            out.push(term.to_string());
        }
    }

    out
}

/// Arithmetic mean of `scores`, 0.0 when empty, clamped to `[min, max]`.
pub fn mean_sentiment(scores: &[f64], min: f64, max: f64) -> f64 {
    if scores.is_empty() {
        return 0.0_f64.clamp(min, max);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    mean.clamp(min, max)
}

/// `succeeded / total`, 0.0 when `total` is zero.
pub fn confidence(succeeded: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (succeeded as f64 / total as f64).clamp(0.0, 1.0)
}

/// Combine-then-analyze over an already combined blob.
pub async fn analyze_combined(
    client: &AnalysisClient,
    text: &str,
    failure_threshold: usize,
) -> AnalysisOutcome {
    let limits = client.limits().clone();
    let started = Instant::now();
    let analysis = analyze_text(client, text).await;
    let elapsed = started.elapsed();

    let failed = analysis.failures.len();
    let succeeded_ops = OPS_PER_TEXT - failed;

    AnalysisOutcome {
        summary: analysis.summary.unwrap_or_default(),
        keywords: dedup_terms(analysis.keywords.unwrap_or_default(), limits.max_keywords),
        categories: dedup_terms(
            analysis.categories.unwrap_or_default(),
            limits.max_categories,
        ),
        sentiment: analysis
            .sentiment
            .unwrap_or(0.0)
            .clamp(limits.sentiment_min, limits.sentiment_max),
        confidence: confidence(succeeded_ops, OPS_PER_TEXT),
        elapsed,
        failures: analysis
            .failures
            .into_iter()
            .map(|(op, message)| OpFailure {
                chunk: None,
                op,
                message,
            })
            .collect(),
        succeeded: usize::from(failed < failure_threshold),
        total: 1,
        unreliable: failed >= failure_threshold,
    }
}

/// Per-chunk-then-merge. A chunk succeeds when fewer than
/// `failure_threshold` of its operations failed; the outcome is unreliable
/// when no chunk succeeded.
pub async fn analyze_per_chunk(
    client: &AnalysisClient,
    chunks: &[String],
    failure_threshold: usize,
) -> AnalysisOutcome {
    let limits = client.limits().clone();
    let started = Instant::now();

    let mut summaries = Vec::new();
    let mut keywords = Vec::new();
    let mut categories = Vec::new();
    let mut sentiments = Vec::new();
    let mut failures = Vec::new();
    let mut succeeded = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        let analysis = analyze_text(client, chunk).await;
        let failed = analysis.failures.len();
        if failed < failure_threshold {
            succeeded += 1;
        }
        tracing::debug!(chunk = i, failed_ops = failed, "chunk analyzed");

        summaries.extend(analysis.summary);
        keywords.extend(analysis.keywords.into_iter().flatten());
        categories.extend(analysis.categories.into_iter().flatten());
        sentiments.extend(analysis.sentiment);
        failures.extend(analysis.failures.into_iter().map(|(op, message)| OpFailure {
            chunk: Some(i),
            op,
            message,
        }));
    }

    AnalysisOutcome {
        summary: merge_summaries(&summaries),
        keywords: dedup_terms(keywords, limits.max_keywords),
        categories: dedup_terms(categories, limits.max_categories),
        sentiment: mean_sentiment(&sentiments, limits.sentiment_min, limits.sentiment_max),
        confidence: confidence(succeeded, chunks.len()),
        elapsed: started.elapsed(),
        failures,
        succeeded,
        total: chunks.len(),
        unreliable: succeeded == 0,
    }
}
