//! Scan pipeline.
//!
//! Drives every discovered file through, in order:
//!
//! 1. `add_document` and status `processing`
//! 2. extraction → normalization → chunking
//! 3. `add_chunks`
//! 4. analysis via the [`Orchestrator`]
//!
//! Files are processed strictly one at a time. A failure in any step marks
//! that document `failed` and the loop moves on to the next file. The
//! cancellation flag in [`ScanControl`] is checked before each file.

use anyhow::{Context, Result};
use std::path::PathBuf;
use thiserror::Error;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::control::ScanControl;
use crate::extract::{extract_file, ExtractError, ExtractionMethod};
use crate::llm::AnalysisClient;
use crate::models::{Chunk, DocumentStatus, FileDescriptor, NewDocument};
use crate::normalize::normalize_text;
use crate::orchestrator::{AnalysisMode, DocumentOutcome, Orchestrator};
use crate::progress::{ProgressMode, ScanProgressEvent, ScanProgressReporter};
use crate::scanner::{scan_folder, ScanOptions};
use crate::sqlite_store::SqliteStore;
use crate::store::Store;
use crate::{db, migrate};

/// Totals for one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub discovered: u64,
    pub processed: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: bool,
}

/// Normalized, chunked text of one file.
#[derive(Debug, Clone)]
pub struct PreparedText {
    pub chunks: Vec<Chunk>,
    pub raw_chars: usize,
    pub normalized_chars: usize,
    pub word_count: i64,
    pub method: ExtractionMethod,
}

/// Why a file produced no chunks. The display text is what ends up in the
/// document's error message.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("file is not readable: {0}")]
    Unreadable(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("no text could be extracted")]
    NoText,

    #[error("no chunks produced from extracted text")]
    NoChunks,

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Extract, normalize, and chunk a file. Blocking: extraction may parse a
/// PDF or spawn the OCR tool.
pub fn prepare_text(file: &FileDescriptor, config: &Config) -> Result<PreparedText, PrepareError> {
    if !file.readable {
        return Err(PrepareError::Unreadable(file.path.display().to_string()));
    }
    let method = ExtractionMethod::for_extension(&file.extension)
        .ok_or_else(|| ExtractError::UnsupportedType(file.extension.clone()))?;

    let raw = extract_file(file, &config.extraction)?;
    let normalized = normalize_text(&raw);
    if normalized.is_empty() {
        return Err(PrepareError::NoText);
    }

    let chunks = chunk_document(&normalized, config.chunking.max_chunk_size);
    if chunks.is_empty() {
        return Err(PrepareError::NoChunks);
    }

    Ok(PreparedText {
        word_count: chunks.iter().map(|c| c.word_count).sum(),
        raw_chars: raw.chars().count(),
        normalized_chars: normalized.chars().count(),
        chunks,
        method,
    })
}

/// Run the pipeline over `files` in order.
pub async fn run_scan(
    store: &dyn Store,
    client: &AnalysisClient,
    config: &Config,
    files: &[FileDescriptor],
    mode: AnalysisMode,
    control: &ScanControl,
    progress: &dyn ScanProgressReporter,
) -> ScanSummary {
    let total = files.len() as u64;
    let orchestrator = Orchestrator::new(store, client, &config.analysis);
    let mut summary = ScanSummary {
        discovered: total,
        ..ScanSummary::default()
    };

    control.begin(total);
    tracing::info!(files = total, mode = mode.as_str(), "starting scan");

    for (i, file) in files.iter().enumerate() {
        if !control.is_active() {
            tracing::info!(remaining = total - i as u64, "scan cancelled");
            summary.cancelled = true;
            break;
        }

        control.start_file(&file.name);
        progress.report(ScanProgressEvent::Processing {
            n: i as u64 + 1,
            total,
            file: file.name.clone(),
        });

        let completed = match process_file(store, &orchestrator, config, file, mode).await {
            Ok(outcome) => outcome.is_completed(),
            Err(e) => {
                let error = format!("{:#}", e);
                tracing::error!(path = %file.path.display(), error = %error, "document could not be processed");
                false
            }
        };

        summary.processed += 1;
        if completed {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }
        control.finish_file();
    }

    progress.report(ScanProgressEvent::Finished {
        completed: summary.completed,
        failed: summary.failed,
        cancelled: summary.cancelled,
    });
    tracing::info!(
        processed = summary.processed,
        completed = summary.completed,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "scan finished"
    );
    summary
}

/// Parameters of a `docsift scan` invocation.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub folder: PathBuf,
    pub mode: AnalysisMode,
    pub recursive: bool,
    /// Type groups (`pdf`, `docx`, `txt`, `images`); `None` uses the
    /// configured extensions.
    pub types: Option<Vec<String>>,
    pub limit: Option<usize>,
    pub progress: ProgressMode,
}

/// CLI entry point for `docsift scan`: discover, then run the pipeline
/// against the SQLite store.
pub async fn run_scan_command(
    config: &Config,
    request: &ScanRequest,
    control: &ScanControl,
) -> Result<ScanSummary> {
    let reporter = request.progress.reporter();
    reporter.report(ScanProgressEvent::Discovering {
        folder: request.folder.display().to_string(),
    });

    let mut options = ScanOptions::from_config(&config.scanner);
    options.recursive = request.recursive;
    if let Some(ref types) = request.types {
        options = options.with_types(types)?;
    }
    let mut files = scan_folder(&request.folder, &options)?;
    if let Some(limit) = request.limit {
        files.truncate(limit);
    }

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let client = AnalysisClient::from_config(&config.llm, &config.analysis)?;

    let summary = run_scan(
        &store,
        &client,
        config,
        &files,
        request.mode,
        control,
        reporter.as_ref(),
    )
    .await;

    pool.close().await;
    Ok(summary)
}

/// CLI entry point for `docsift reanalyze`.
pub async fn run_reanalyze_command(
    config: &Config,
    id: i64,
    mode: AnalysisMode,
) -> Result<DocumentOutcome> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let client = AnalysisClient::from_config(&config.llm, &config.analysis)?;

    let outcome = Orchestrator::new(&store, &client, &config.analysis)
        .reanalyze(id, mode)
        .await;

    pool.close().await;
    Ok(outcome?)
}

/// One file end to end. `Err` only when the document could not be
/// registered, or could not be marked failed afterwards.
async fn process_file(
    store: &dyn Store,
    orchestrator: &Orchestrator<'_>,
    config: &Config,
    file: &FileDescriptor,
    mode: AnalysisMode,
) -> Result<DocumentOutcome> {
    let id = store
        .add_document(&NewDocument::from(file))
        .await
        .context("Failed to register document")?;
    if let Err(e) = store
        .update_status(id, DocumentStatus::Processing, None)
        .await
    {
        let error = format!("failed to mark document as processing: {:#}", e);
        return fail(store, id, error).await;
    }

    let owned_file = file.clone();
    let owned_config = config.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_text(&owned_file, &owned_config))
        .await
        .unwrap_or_else(|e| Err(PrepareError::Task(e.to_string())));

    let prepared = match prepared {
        Ok(prepared) => prepared,
        Err(error) => return fail(store, id, error.to_string()).await,
    };

    tracing::info!(
        document_id = id,
        method = prepared.method.as_str(),
        raw_chars = prepared.raw_chars,
        normalized_chars = prepared.normalized_chars,
        chunks = prepared.chunks.len(),
        words = prepared.word_count,
        "text extracted"
    );

    if let Err(e) = store.add_chunks(id, &prepared.chunks).await {
        return fail(store, id, format!("failed to save chunks: {}", e)).await;
    }

    let texts: Vec<String> = prepared.chunks.into_iter().map(|c| c.content).collect();
    Ok(orchestrator.analyze_document(id, &texts, mode).await)
}

async fn fail(store: &dyn Store, id: i64, error: String) -> Result<DocumentOutcome> {
    tracing::warn!(document_id = id, error = %error, "document failed");
    store
        .update_status(id, DocumentStatus::Failed, Some(&error))
        .await
        .context("Failed to mark document as failed")?;
    Ok(DocumentOutcome::Failed { error })
}
