//! Storage abstraction for docsift.
//!
//! The [`Store`] trait defines every persistence operation the scan
//! pipeline and the analysis orchestrator need, so backends are pluggable:
//! [`SqliteStore`](crate::sqlite_store::SqliteStore) for the CLI and
//! [`InMemoryStore`](memory::InMemoryStore) for tests.
//!
//! Every call is a fallible, self-contained unit of work. Callers map
//! errors to a `failed` document status rather than aborting.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`add_document`](Store::add_document) | Register a file, resetting it to `pending` |
//! | [`update_status`](Store::update_status) | Move a document through its lifecycle |
//! | [`add_chunks`](Store::add_chunks) | Replace a document's chunks |
//! | [`add_analysis_result`](Store::add_analysis_result) | Append an analysis result |
//! | [`get_chunks`](Store::get_chunks) | Chunks in index order |
//! | [`get_document_with_analysis`](Store::get_document_with_analysis) | Document plus latest result |
//! | [`list_documents`](Store::list_documents) | Newest first, optionally by status |
//! | [`search_documents`](Store::search_documents) | Substring search |
//! | [`statistics`](Store::statistics) | Aggregate counts |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    AnalysisResult, Chunk, Document, DocumentStatus, DocumentWithAnalysis, NewDocument,
    StoreStatistics,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document, or refresh the metadata of the one already at
    /// the same path and reset it to `pending`. Returns its id.
    async fn add_document(&self, doc: &NewDocument) -> Result<i64>;

    /// Set the status and error message. `completed` also stamps the
    /// processed time. Fails for unknown ids.
    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Replace all chunks of a document atomically.
    async fn add_chunks(&self, id: i64, chunks: &[Chunk]) -> Result<()>;

    /// Append an analysis result. Earlier results are kept.
    async fn add_analysis_result(&self, id: i64, result: &AnalysisResult) -> Result<i64>;

    /// Chunks ordered by index.
    async fn get_chunks(&self, id: i64) -> Result<Vec<Chunk>>;

    async fn get_document_with_analysis(&self, id: i64) -> Result<Option<DocumentWithAnalysis>>;

    async fn list_documents(
        &self,
        status: Option<DocumentStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>>;

    /// Case-insensitive substring match over file name, summary, keywords,
    /// and chunk content.
    async fn search_documents(&self, query: &str, limit: i64) -> Result<Vec<Document>>;

    async fn statistics(&self) -> Result<StoreStatistics>;
}
