//! SQLite-backed [`Store`] implementation.
//!
//! Wraps a [`SqlitePool`] and translates every `Store` method into one or
//! more SQL statements against the schema created by
//! [`migrate`](crate::migrate) (`documents`, `analysis_results`,
//! `document_chunks`). Each method is its own unit of work; chunk
//! replacement runs inside a transaction.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{
    AnalysisResult, Chunk, Document, DocumentStatus, DocumentWithAnalysis, NewDocument,
    StoreStatistics,
};
use crate::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn document_exists(&self, id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    Ok(Document {
        id: row.get("id"),
        path: row.get("path"),
        name: row.get("name"),
        size: row.get("size"),
        file_type: row.get("file_type"),
        status: status.parse()?,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        modified_at: row.get("modified_at"),
        processed_at: row.get("processed_at"),
    })
}

fn row_to_result(row: &SqliteRow) -> Result<AnalysisResult> {
    let keywords: String = row.get("keywords_json");
    let categories: String = row.get("categories_json");
    Ok(AnalysisResult {
        summary: row.get("summary"),
        keywords: serde_json::from_str(&keywords).context("Corrupt keywords_json")?,
        categories: serde_json::from_str(&categories).context("Corrupt categories_json")?,
        sentiment_score: row.get("sentiment_score"),
        confidence_score: row.get("confidence_score"),
        processing_time: row.get("processing_time"),
    })
}

/// `%query%` with LIKE wildcards escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

const DOCUMENT_COLUMNS: &str = "d.id, d.path, d.name, d.size, d.file_type, d.status, \
     d.error_message, d.created_at, d.modified_at, d.processed_at";

#[async_trait]
impl Store for SqliteStore {
    async fn add_document(&self, doc: &NewDocument) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO documents (path, name, size, file_type, created_at, modified_at,
                                   status, error_message)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', NULL)
            ON CONFLICT(path) DO UPDATE SET
                name = excluded.name,
                size = excluded.size,
                file_type = excluded.file_type,
                modified_at = excluded.modified_at,
                status = 'pending',
                error_message = NULL
            RETURNING id
            "#,
        )
        .bind(&doc.path)
        .bind(&doc.name)
        .bind(doc.size)
        .bind(&doc.file_type)
        .bind(now)
        .bind(doc.modified_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to add document {}", doc.path))?;

        Ok(id)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE documents SET
                status = ?,
                error_message = ?,
                processed_at = CASE WHEN ? THEN ? ELSE processed_at END
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(status == DocumentStatus::Completed)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("document {} not found", id);
        }
        Ok(())
    }

    async fn add_chunks(&self, id: i64, chunks: &[Chunk]) -> Result<()> {
        if !self.document_exists(id).await? {
            bail!("document {} not found", id);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_chunks (document_id, chunk_index, content, word_count) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(chunk.index)
            .bind(&chunk.content)
            .bind(chunk.word_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn add_analysis_result(&self, id: i64, result: &AnalysisResult) -> Result<i64> {
        if !self.document_exists(id).await? {
            bail!("document {} not found", id);
        }

        let now = chrono::Utc::now().timestamp();
        let inserted = sqlx::query(
            r#"
            INSERT INTO analysis_results (document_id, summary, keywords_json, categories_json,
                                          sentiment_score, confidence_score, processing_time,
                                          created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&result.summary)
        .bind(serde_json::to_string(&result.keywords)?)
        .bind(serde_json::to_string(&result.categories)?)
        .bind(result.sentiment_score)
        .bind(result.confidence_score)
        .bind(result.processing_time)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    async fn get_chunks(&self, id: i64) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT chunk_index, content, word_count FROM document_chunks \
             WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Chunk {
                index: row.get("chunk_index"),
                content: row.get("content"),
                word_count: row.get("word_count"),
            })
            .collect())
    }

    async fn get_document_with_analysis(&self, id: i64) -> Result<Option<DocumentWithAnalysis>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents d WHERE d.id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let document = match row {
            Some(row) => row_to_document(&row)?,
            None => return Ok(None),
        };

        let latest = sqlx::query(
            "SELECT summary, keywords_json, categories_json, sentiment_score, confidence_score, \
             processing_time FROM analysis_results WHERE document_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let analysis = latest.as_ref().map(row_to_result).transpose()?;
        Ok(Some(DocumentWithAnalysis { document, analysis }))
    }

    async fn list_documents(
        &self,
        status: Option<DocumentStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents d WHERE (?1 IS NULL OR d.status = ?1) \
             ORDER BY d.created_at DESC, d.id DESC LIMIT ?2",
            DOCUMENT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn search_documents(&self, query: &str, limit: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM documents d
            WHERE d.name LIKE ?1 ESCAPE '\'
               OR EXISTS (SELECT 1 FROM analysis_results r
                          WHERE r.document_id = d.id
                            AND (r.summary LIKE ?1 ESCAPE '\' OR r.keywords_json LIKE ?1 ESCAPE '\'))
               OR EXISTS (SELECT 1 FROM document_chunks c
                          WHERE c.document_id = d.id AND c.content LIKE ?1 ESCAPE '\')
            ORDER BY d.created_at DESC, d.id DESC
            LIMIT ?2
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await?;
        let total_results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results")
            .fetch_one(&self.pool)
            .await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM documents GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_type: Vec<(String, i64)> = sqlx::query_as(
            "SELECT file_type, COUNT(*) FROM documents GROUP BY file_type ORDER BY file_type",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(StoreStatistics {
            total_documents,
            total_chunks,
            total_results,
            by_status,
            by_type,
        })
    }
}
