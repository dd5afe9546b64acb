//! Document-level analysis state machine.
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!                  │
//!                  └───────▶ failed
//! ```
//!
//! [`Orchestrator::analyze_document`] probes the model endpoint, runs the
//! selected [`AnalysisMode`], applies the failure threshold, persists the
//! result, and writes the terminal status. Every failure ends in `failed`
//! with a human-readable message; callers receive a [`DocumentOutcome`]
//! rather than an error.

use thiserror::Error;

use crate::aggregate::{self, AnalysisOutcome, OPS_PER_TEXT};
use crate::config::AnalysisConfig;
use crate::llm::{AnalysisClient, LlmError};
use crate::models::{AnalysisResult, DocumentStatus};
use crate::store::Store;

/// How a document's chunks are fed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    /// One bounded blob, four requests.
    #[default]
    Combined,
    /// Four requests per chunk, merged afterwards.
    PerChunk,
}

impl AnalysisMode {
    pub fn from_detailed(detailed: bool) -> Self {
        if detailed {
            AnalysisMode::PerChunk
        } else {
            AnalysisMode::Combined
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Combined => "combined",
            AnalysisMode::PerChunk => "per-chunk",
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("connection test failed: {0}")]
    Connectivity(#[source] LlmError),

    #[error("no text to analyze")]
    NoText,

    #[error("too many analysis operations failed ({failed} of {total}): {details}")]
    TooManyFailures {
        failed: usize,
        total: usize,
        details: String,
    },

    #[error("failed to save analysis result: {0}")]
    Persistence(String),

    #[error("no chunks found for document {0}")]
    NoChunks(i64),

    #[error("document {0} not found")]
    NotFound(i64),

    #[error("store error: {0}")]
    Store(String),
}

/// Terminal state of one analysis attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Completed(AnalysisResult),
    Failed { error: String },
}

impl DocumentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DocumentOutcome::Completed(_))
    }
}

/// Snapshot returned by [`Orchestrator::get_analysis_status`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisStatus {
    pub document_id: i64,
    pub status: DocumentStatus,
    pub has_analysis: bool,
    pub processed_at: Option<i64>,
    pub processing_time: Option<f64>,
    pub confidence: Option<f64>,
    pub error_message: Option<String>,
}

pub struct Orchestrator<'a> {
    store: &'a dyn Store,
    client: &'a AnalysisClient,
    config: &'a AnalysisConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a dyn Store, client: &'a AnalysisClient, config: &'a AnalysisConfig) -> Self {
        Self {
            store,
            client,
            config,
        }
    }

    /// Analyze a document whose chunks have already been persisted, and
    /// leave it `completed` or `failed`.
    pub async fn analyze_document(
        &self,
        id: i64,
        chunks: &[String],
        mode: AnalysisMode,
    ) -> DocumentOutcome {
        match self.run(id, chunks, mode).await {
            Ok(result) => {
                tracing::info!(
                    document_id = id,
                    chunks = chunks.len(),
                    mode = mode.as_str(),
                    confidence = result.confidence_score,
                    elapsed_ms = (result.processing_time * 1000.0) as u64,
                    "analysis completed"
                );
                DocumentOutcome::Completed(result)
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(document_id = id, error = %error, "analysis failed");
                if let Err(status_err) = self
                    .store
                    .update_status(id, DocumentStatus::Failed, Some(&error))
                    .await
                {
                    tracing::error!(
                        document_id = id,
                        error = %status_err,
                        "could not mark document as failed"
                    );
                }
                DocumentOutcome::Failed { error }
            }
        }
    }

    /// Re-run analysis over the chunks already stored for `id`.
    ///
    /// Returns [`AnalysisError::NoChunks`] without contacting the model or
    /// touching the status when nothing is stored.
    pub async fn reanalyze(
        &self,
        id: i64,
        mode: AnalysisMode,
    ) -> Result<DocumentOutcome, AnalysisError> {
        let exists = self
            .store
            .get_document_with_analysis(id)
            .await
            .map_err(|e| AnalysisError::Store(e.to_string()))?;
        if exists.is_none() {
            return Err(AnalysisError::NotFound(id));
        }

        let chunks = self
            .store
            .get_chunks(id)
            .await
            .map_err(|e| AnalysisError::Store(e.to_string()))?;
        if chunks.is_empty() {
            return Err(AnalysisError::NoChunks(id));
        }

        tracing::info!(document_id = id, chunks = chunks.len(), "re-analyzing document");
        let texts: Vec<String> = chunks.into_iter().map(|c| c.content).collect();
        Ok(self.analyze_document(id, &texts, mode).await)
    }

    pub async fn get_analysis_status(&self, id: i64) -> Result<AnalysisStatus, AnalysisError> {
        analysis_status(self.store, id).await
    }

    async fn run(
        &self,
        id: i64,
        chunks: &[String],
        mode: AnalysisMode,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.store
            .update_status(id, DocumentStatus::Processing, None)
            .await
            .map_err(|e| AnalysisError::Store(e.to_string()))?;

        self.client
            .test_connection()
            .await
            .map_err(AnalysisError::Connectivity)?;

        let outcome = self.aggregate(chunks, mode).await?;

        if outcome.unreliable {
            let total = match mode {
                AnalysisMode::Combined => OPS_PER_TEXT,
                AnalysisMode::PerChunk => OPS_PER_TEXT * chunks.len(),
            };
            return Err(AnalysisError::TooManyFailures {
                failed: outcome.failures.len(),
                total,
                details: outcome.error_summary(),
            });
        }
        if !outcome.failures.is_empty() {
            tracing::warn!(
                document_id = id,
                failed_ops = outcome.failures.len(),
                errors = %outcome.error_summary(),
                "analysis completed with partial failures"
            );
        }

        let result = AnalysisResult {
            summary: outcome.summary,
            keywords: outcome.keywords,
            categories: outcome.categories,
            sentiment_score: outcome.sentiment,
            confidence_score: outcome.confidence,
            processing_time: outcome.elapsed.as_secs_f64(),
        };

        self.store
            .add_analysis_result(id, &result)
            .await
            .map_err(|e| AnalysisError::Persistence(e.to_string()))?;
        self.store
            .update_status(id, DocumentStatus::Completed, None)
            .await
            .map_err(|e| AnalysisError::Persistence(e.to_string()))?;

        Ok(result)
    }

    async fn aggregate(
        &self,
        chunks: &[String],
        mode: AnalysisMode,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        if chunks.iter().all(|c| c.trim().is_empty()) {
            return Err(AnalysisError::NoText);
        }

        let threshold = self.config.failure_threshold;
        let outcome = match mode {
            AnalysisMode::Combined => {
                let text = aggregate::combine_chunks(
                    chunks,
                    self.config.combine_budget,
                    self.config.combine_min_tail,
                );
                if text.trim().is_empty() {
                    return Err(AnalysisError::NoText);
                }
                aggregate::analyze_combined(self.client, &text, threshold).await
            }
            AnalysisMode::PerChunk => {
                aggregate::analyze_per_chunk(self.client, chunks, threshold).await
            }
        };
        Ok(outcome)
    }
}

/// Status of a document's analysis. Needs only the store, so read-only
/// commands can call it without a model client.
pub async fn analysis_status(store: &dyn Store, id: i64) -> Result<AnalysisStatus, AnalysisError> {
    let found = store
        .get_document_with_analysis(id)
        .await
        .map_err(|e| AnalysisError::Store(e.to_string()))?
        .ok_or(AnalysisError::NotFound(id))?;

    let doc = found.document;
    Ok(AnalysisStatus {
        document_id: doc.id,
        status: doc.status,
        has_analysis: found.analysis.is_some(),
        processed_at: doc.processed_at,
        processing_time: found.analysis.as_ref().map(|a| a.processing_time),
        confidence: found.analysis.as_ref().map(|a| a.confidence_score),
        error_message: doc.error_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{canned_reply, client_for, ScriptedGenerator};
    use crate::llm::AnalysisOp;
    use crate::models::{Chunk, Document, DocumentWithAnalysis, NewDocument, StoreStatistics};
    use crate::store::memory::InMemoryStore;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Delegates to an [`InMemoryStore`] but refuses to save results.
    struct ResultRejectingStore(InMemoryStore);

    #[async_trait]
    impl Store for ResultRejectingStore {
        async fn add_document(&self, doc: &NewDocument) -> Result<i64> {
            self.0.add_document(doc).await
        }
        async fn update_status(
            &self,
            id: i64,
            status: DocumentStatus,
            error: Option<&str>,
        ) -> Result<()> {
            self.0.update_status(id, status, error).await
        }
        async fn add_chunks(&self, id: i64, chunks: &[Chunk]) -> Result<()> {
            self.0.add_chunks(id, chunks).await
        }
        async fn add_analysis_result(&self, _id: i64, _result: &AnalysisResult) -> Result<i64> {
            Err(anyhow!("disk I/O error"))
        }
        async fn get_chunks(&self, id: i64) -> Result<Vec<Chunk>> {
            self.0.get_chunks(id).await
        }
        async fn get_document_with_analysis(
            &self,
            id: i64,
        ) -> Result<Option<DocumentWithAnalysis>> {
            self.0.get_document_with_analysis(id).await
        }
        async fn list_documents(
            &self,
            status: Option<DocumentStatus>,
            limit: Option<i64>,
        ) -> Result<Vec<Document>> {
            self.0.list_documents(status, limit).await
        }
        async fn search_documents(&self, query: &str, limit: i64) -> Result<Vec<Document>> {
            self.0.search_documents(query, limit).await
        }
        async fn statistics(&self) -> Result<StoreStatistics> {
            self.0.statistics().await
        }
    }

    async fn seed(store: &dyn Store, chunks: &[&str]) -> (i64, Vec<String>) {
        let id = store
            .add_document(&NewDocument::new("/docs/report.txt", "report.txt", 100, "txt"))
            .await
            .unwrap();
        let stored: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| Chunk::new(i as i64, *c))
            .collect();
        store.add_chunks(id, &stored).await.unwrap();
        (id, chunks.iter().map(|c| c.to_string()).collect())
    }

    async fn status_of(store: &dyn Store, id: i64) -> (DocumentStatus, Option<String>) {
        let doc = store.get_document_with_analysis(id).await.unwrap().unwrap();
        (doc.document.status, doc.document.error_message)
    }

    #[tokio::test]
    async fn healthy_combined_analysis_completes() {
        let store = InMemoryStore::new();
        let generator = Arc::new(ScriptedGenerator::healthy());
        let client = client_for(generator.clone());
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["First chunk.", "Second chunk."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;

        let DocumentOutcome::Completed(result) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(result.summary, canned_reply(AnalysisOp::Summary));
        assert_eq!(result.confidence_score, 1.0);
        assert_eq!(generator.analysis_calls(), 4);
        assert!(generator.prompts()[0].contains("First chunk.\n\nSecond chunk."));

        let full = store.get_document_with_analysis(id).await.unwrap().unwrap();
        assert_eq!(full.document.status, DocumentStatus::Completed);
        assert!(full.document.processed_at.is_some());
        assert_eq!(full.analysis.unwrap(), result);
    }

    #[tokio::test]
    async fn failed_summary_still_completes_with_reduced_confidence() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::new(|op, _| match op {
            AnalysisOp::Summary => Err(LlmError::Timeout),
            other => Ok(canned_reply(other).to_string()),
        })));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["Some text."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;

        let DocumentOutcome::Completed(result) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(result.confidence_score, 0.75);
        assert_eq!(result.summary, "");
        assert_eq!(status_of(&store, id).await.0, DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn three_failed_operations_fail_the_document() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::new(|op, _| match op {
            AnalysisOp::Sentiment => Ok("0.9".to_string()),
            _ => Err(LlmError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
        })));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["Some text."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;

        assert!(!outcome.is_completed());
        let (status, error) = status_of(&store, id).await;
        assert_eq!(status, DocumentStatus::Failed);
        let error = error.unwrap();
        assert!(error.contains("3 of 4"), "{error}");
        assert!(error.contains("overloaded"), "{error}");
        assert_eq!(store.result_count(id), 0);
    }

    #[tokio::test]
    async fn failure_threshold_is_configurable() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::new(|op, _| match op {
            AnalysisOp::Summary | AnalysisOp::Keywords => Err(LlmError::Timeout),
            other => Ok(canned_reply(other).to_string()),
        })));
        let config = AnalysisConfig {
            failure_threshold: 2,
            ..AnalysisConfig::default()
        };
        let (id, chunks) = seed(&store, &["Some text."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;
        assert!(!outcome.is_completed());
    }

    #[tokio::test]
    async fn probe_failure_fails_before_any_analysis() {
        let store = InMemoryStore::new();
        let generator = Arc::new(
            ScriptedGenerator::healthy().with_models(Ok(vec!["mistral:7b".to_string()])),
        );
        let client = client_for(generator.clone());
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["One.", "Two."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;

        assert!(!outcome.is_completed());
        assert_eq!(generator.analysis_calls(), 0);
        let (status, error) = status_of(&store, id).await;
        assert_eq!(status, DocumentStatus::Failed);
        let error = error.unwrap();
        assert!(error.contains("not loaded"), "{error}");
        assert!(error.contains("mistral:7b"), "{error}");
        // Chunks from the extraction step are untouched.
        assert_eq!(store.get_chunks(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persistence_failure_marks_document_failed() {
        let store = ResultRejectingStore(InMemoryStore::new());
        let client = client_for(Arc::new(ScriptedGenerator::healthy()));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["Some text."]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;

        match outcome {
            DocumentOutcome::Failed { error } => assert!(error.contains("disk I/O error")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(status_of(&store, id).await.0, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn blank_chunks_are_no_text() {
        let store = InMemoryStore::new();
        let generator = Arc::new(ScriptedGenerator::healthy());
        let client = client_for(generator.clone());
        let config = AnalysisConfig::default();
        let (id, _) = seed(&store, &["x"]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &["   ".to_string()], AnalysisMode::Combined)
            .await;

        assert_eq!(
            outcome,
            DocumentOutcome::Failed {
                error: "no text to analyze".to_string()
            }
        );
        assert_eq!(generator.analysis_calls(), 0);
    }

    #[tokio::test]
    async fn detailed_mode_analyzes_every_chunk() {
        let store = InMemoryStore::new();
        let generator = Arc::new(ScriptedGenerator::new(|op, prompt| {
            if prompt.contains("bad chunk") {
                return Err(LlmError::Timeout);
            }
            Ok(canned_reply(op).to_string())
        }));
        let client = client_for(generator.clone());
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["good chunk", "bad chunk", "good again", "fine"]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::PerChunk)
            .await;

        let DocumentOutcome::Completed(result) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(generator.analysis_calls(), 16);
        assert_eq!(result.confidence_score, 0.75);
        assert_eq!(result.keywords, vec!["rust", "chunking", "analysis"]);
        assert!(result.summary.starts_with("1. "));
    }

    #[tokio::test]
    async fn detailed_mode_with_no_successful_chunk_fails() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::new(|_, _| Err(LlmError::Timeout))));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["a", "b"]).await;

        let outcome = Orchestrator::new(&store, &client, &config)
            .analyze_document(id, &chunks, AnalysisMode::PerChunk)
            .await;

        match outcome {
            DocumentOutcome::Failed { error } => assert!(error.contains("8 of 8"), "{error}"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reanalyze_without_chunks_never_calls_the_model() {
        let store = InMemoryStore::new();
        let generator = Arc::new(ScriptedGenerator::healthy());
        let client = client_for(generator.clone());
        let config = AnalysisConfig::default();
        let id = store
            .add_document(&NewDocument::new("/empty.txt", "empty.txt", 0, "txt"))
            .await
            .unwrap();
        store
            .update_status(id, DocumentStatus::Failed, Some("no text"))
            .await
            .unwrap();

        let err = Orchestrator::new(&store, &client, &config)
            .reanalyze(id, AnalysisMode::Combined)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::NoChunks(i) if i == id));
        assert_eq!(err.to_string(), format!("no chunks found for document {}", id));
        assert_eq!(generator.analysis_calls(), 0);
        assert_eq!(status_of(&store, id).await.0, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn reanalyze_appends_a_new_result() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::healthy()));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["Body text."]).await;
        let orchestrator = Orchestrator::new(&store, &client, &config);

        orchestrator
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;
        let outcome = orchestrator
            .reanalyze(id, AnalysisMode::PerChunk)
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(store.result_count(id), 2);

        let missing = orchestrator.reanalyze(999, AnalysisMode::Combined).await;
        assert!(matches!(missing, Err(AnalysisError::NotFound(999))));
    }

    #[tokio::test]
    async fn analysis_status_reports_latest_state() {
        let store = InMemoryStore::new();
        let client = client_for(Arc::new(ScriptedGenerator::healthy()));
        let config = AnalysisConfig::default();
        let (id, chunks) = seed(&store, &["Body text."]).await;
        let orchestrator = Orchestrator::new(&store, &client, &config);

        let before = orchestrator.get_analysis_status(id).await.unwrap();
        assert_eq!(before.status, DocumentStatus::Pending);
        assert!(!before.has_analysis);

        orchestrator
            .analyze_document(id, &chunks, AnalysisMode::Combined)
            .await;
        let after = orchestrator.get_analysis_status(id).await.unwrap();
        assert_eq!(after.status, DocumentStatus::Completed);
        assert!(after.has_analysis);
        assert_eq!(after.confidence, Some(1.0));
        assert!(after.processed_at.is_some());

        assert!(matches!(
            orchestrator.get_analysis_status(404).await,
            Err(AnalysisError::NotFound(404))
        ));
    }
}
