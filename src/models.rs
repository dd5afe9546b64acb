//! Core data models used throughout docsift.
//!
//! These types represent the documents, chunks, and analysis results that
//! flow from the scanner through extraction, chunking, and AI analysis into
//! the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => anyhow::bail!(
                "Unknown document status: '{}'. Must be pending, processing, completed, or failed.",
                other
            ),
        }
    }
}

/// A file produced by the scanner, before anything is stored.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    /// Lowercase extension without the leading dot.
    pub extension: String,
    pub readable: bool,
    pub mime_type: String,
    pub modified_at: DateTime<Utc>,
}

/// Fields needed to register a document with the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub path: String,
    pub name: String,
    pub size: i64,
    pub file_type: String,
    pub modified_at: Option<i64>,
}

impl NewDocument {
    pub fn new(
        path: impl Into<String>,
        name: impl Into<String>,
        size: i64,
        file_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            file_type: file_type.into(),
            modified_at: None,
        }
    }
}

impl From<&FileDescriptor> for NewDocument {
    fn from(file: &FileDescriptor) -> Self {
        Self {
            path: file.path.display().to_string(),
            name: file.name.clone(),
            size: i64::try_from(file.size).unwrap_or(i64::MAX),
            file_type: file.extension.clone(),
            modified_at: Some(file.modified_at.timestamp()),
        }
    }
}

/// A document row as held by the store.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size: i64,
    pub file_type: String,
    pub status: DocumentStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub modified_at: Option<i64>,
    pub processed_at: Option<i64>,
}

/// A chunk of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub index: i64,
    pub content: String,
    pub word_count: i64,
}

impl Chunk {
    pub fn new(index: i64, content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = content.split_whitespace().count() as i64;
        Self {
            index,
            content,
            word_count,
        }
    }
}

/// Document-level outcome of one completed analysis attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub sentiment_score: f64,
    pub confidence_score: f64,
    /// Seconds spent in the analysis calls.
    pub processing_time: f64,
}

/// A document joined with its most recent analysis result, if any.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithAnalysis {
    pub document: Document,
    pub analysis: Option<AnalysisResult>,
}

/// Aggregate counts for the `stats` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStatistics {
    pub total_documents: i64,
    pub total_chunks: i64,
    pub total_results: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_type: Vec<(String, i64)>,
}
