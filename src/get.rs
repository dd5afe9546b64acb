//! Document retrieval by ID.
//!
//! Fetches a document, its latest analysis result, and its chunks. Used by
//! the `docsift get` and `docsift status` commands.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::models::{Chunk, DocumentWithAnalysis};
use crate::normalize::preview;
use crate::orchestrator::{analysis_status, AnalysisStatus};
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

const CHUNK_PREVIEW_CHARS: usize = 200;

/// Core get function returning structured data.
pub async fn get_document(
    store: &dyn Store,
    id: i64,
) -> Result<(DocumentWithAnalysis, Vec<Chunk>)> {
    let doc = match store.get_document_with_analysis(id).await? {
        Some(doc) => doc,
        None => bail!("document not found: {}", id),
    };
    let chunks = store.get_chunks(id).await?;
    Ok((doc, chunks))
}

/// CLI entry point: calls [`get_document`] and prints to stdout.
pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let result = get_document(&store, id).await;
    pool.close().await;
    let (found, chunks) = result?;

    let doc = &found.document;
    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("name:         {}", doc.name);
    println!("path:         {}", doc.path);
    println!("type:         {}", doc.file_type);
    println!("size:         {}", crate::stats::format_bytes(doc.size.max(0) as u64));
    println!("status:       {}", doc.status);
    if let Some(ref error) = doc.error_message {
        println!("error:        {}", error);
    }
    println!("created_at:   {}", format_ts_iso(doc.created_at));
    if let Some(ts) = doc.modified_at {
        println!("modified_at:  {}", format_ts_iso(ts));
    }
    if let Some(ts) = doc.processed_at {
        println!("processed_at: {}", format_ts_iso(ts));
    }
    println!();

    match &found.analysis {
        Some(analysis) => {
            println!("--- Analysis ---");
            println!("keywords:     {}", analysis.keywords.join(", "));
            println!("categories:   {}", analysis.categories.join(", "));
            println!("sentiment:    {:.2}", analysis.sentiment_score);
            println!("confidence:   {:.0}%", analysis.confidence_score * 100.0);
            println!(
                "took:         {}",
                crate::stats::format_duration(analysis.processing_time)
            );
            println!();
            println!("{}", analysis.summary);
            println!();
        }
        None => {
            println!("--- Analysis ---");
            println!("(none)");
            println!();
        }
    }

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        println!("[chunk {}, {} words]", chunk.index, chunk.word_count);
        println!("{}", preview(&chunk.content, CHUNK_PREVIEW_CHARS));
        println!();
    }

    Ok(())
}

/// CLI entry point for `docsift status`: one short block describing where
/// the document is in its lifecycle.
pub async fn run_status(config: &Config, id: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let status = analysis_status(&store, id).await;
    pool.close().await;

    for line in status_lines(&status?) {
        println!("{}", line);
    }
    Ok(())
}

fn status_lines(status: &AnalysisStatus) -> Vec<String> {
    let mut lines = vec![format!("document {}: {}", status.document_id, status.status)];
    if !status.status.is_terminal() {
        lines.push("analysis:   in progress".to_string());
    } else if !status.has_analysis {
        lines.push("analysis:   none".to_string());
    }
    if let Some(ts) = status.processed_at {
        lines.push(format!("processed:  {}", format_ts_iso(ts)));
    }
    if let Some(seconds) = status.processing_time {
        lines.push(format!("took:       {}", crate::stats::format_duration(seconds)));
    }
    if let Some(confidence) = status.confidence {
        lines.push(format!("confidence: {:.0}%", confidence * 100.0));
    }
    if let Some(ref error) = status.error_message {
        lines.push(format!("error:      {}", error));
    }
    lines
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
