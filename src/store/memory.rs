//! In-memory [`Store`] implementation for tests.
//!
//! Uses `BTreeMap` and `Vec` behind `std::sync::RwLock`. Ids are assigned
//! sequentially from 1, matching SQLite's rowid behaviour.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{
    AnalysisResult, Chunk, Document, DocumentStatus, DocumentWithAnalysis, NewDocument,
    StoreStatistics,
};

use super::Store;

#[derive(Default)]
struct State {
    docs: BTreeMap<i64, Document>,
    chunks: HashMap<i64, Vec<Chunk>>,
    results: Vec<(i64, i64, AnalysisResult)>,
    next_doc_id: i64,
    next_result_id: i64,
    clock: i64,
}

impl State {
    /// Strictly increasing timestamp so "newest first" is deterministic.
    fn tick(&mut self) -> i64 {
        self.clock = self.clock.max(chrono::Utc::now().timestamp()) + 1;
        self.clock
    }

    fn latest_result(&self, id: i64) -> Option<&AnalysisResult> {
        self.results
            .iter()
            .filter(|(doc_id, _, _)| *doc_id == id)
            .max_by_key(|(_, result_id, _)| *result_id)
            .map(|(_, _, r)| r)
    }
}

/// In-memory store for tests.
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    /// Number of analysis results stored for a document.
    pub fn result_count(&self, id: i64) -> usize {
        self.read()
            .map(|s| s.results.iter().filter(|(d, _, _)| *d == id).count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn add_document(&self, doc: &NewDocument) -> Result<i64> {
        let mut state = self.write()?;
        let now = state.tick();

        if let Some(existing) = state.docs.values_mut().find(|d| d.path == doc.path) {
            existing.name = doc.name.clone();
            existing.size = doc.size;
            existing.file_type = doc.file_type.clone();
            existing.modified_at = doc.modified_at;
            existing.status = DocumentStatus::Pending;
            existing.error_message = None;
            return Ok(existing.id);
        }

        state.next_doc_id += 1;
        let id = state.next_doc_id;
        state.docs.insert(
            id,
            Document {
                id,
                path: doc.path.clone(),
                name: doc.name.clone(),
                size: doc.size,
                file_type: doc.file_type.clone(),
                status: DocumentStatus::Pending,
                error_message: None,
                created_at: now,
                modified_at: doc.modified_at,
                processed_at: None,
            },
        );
        Ok(id)
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut state = self.write()?;
        let now = state.tick();
        let doc = state
            .docs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("document {} not found", id))?;

        doc.status = status;
        doc.error_message = error.map(str::to_string);
        if status == DocumentStatus::Completed {
            doc.processed_at = Some(now);
        }
        Ok(())
    }

    async fn add_chunks(&self, id: i64, chunks: &[Chunk]) -> Result<()> {
        let mut state = self.write()?;
        if !state.docs.contains_key(&id) {
            return Err(anyhow!("document {} not found", id));
        }
        state.chunks.insert(id, chunks.to_vec());
        Ok(())
    }

    async fn add_analysis_result(&self, id: i64, result: &AnalysisResult) -> Result<i64> {
        let mut state = self.write()?;
        if !state.docs.contains_key(&id) {
            return Err(anyhow!("document {} not found", id));
        }
        state.next_result_id += 1;
        let result_id = state.next_result_id;
        state.results.push((id, result_id, result.clone()));
        Ok(result_id)
    }

    async fn get_chunks(&self, id: i64) -> Result<Vec<Chunk>> {
        let state = self.read()?;
        let mut chunks = state.chunks.get(&id).cloned().unwrap_or_default();
        chunks.sort_by_key(|c| c.index);
        Ok(chunks)
    }

    async fn get_document_with_analysis(&self, id: i64) -> Result<Option<DocumentWithAnalysis>> {
        let state = self.read()?;
        Ok(state.docs.get(&id).map(|doc| DocumentWithAnalysis {
            document: doc.clone(),
            analysis: state.latest_result(id).cloned(),
        }))
    }

    async fn list_documents(
        &self,
        status: Option<DocumentStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Document>> {
        let state = self.read()?;
        let mut docs: Vec<Document> = state
            .docs
            .values()
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            docs.truncate(limit.max(0) as usize);
        }
        Ok(docs)
    }

    async fn search_documents(&self, query: &str, limit: i64) -> Result<Vec<Document>> {
        let needle = query.to_lowercase();
        let state = self.read()?;

        let mut hits: Vec<Document> = state
            .docs
            .values()
            .filter(|doc| {
                let in_name = doc.name.to_lowercase().contains(&needle);
                let in_result = state.results.iter().any(|(d, _, r)| {
                    *d == doc.id
                        && (r.summary.to_lowercase().contains(&needle)
                            || r.keywords.iter().any(|k| k.to_lowercase().contains(&needle)))
                });
                let in_chunks = state.chunks.get(&doc.id).is_some_and(|chunks| {
                    chunks
                        .iter()
                        .any(|c| c.content.to_lowercase().contains(&needle))
                });
                in_name || in_result || in_chunks
            })
            .cloned()
            .collect();

        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn statistics(&self) -> Result<StoreStatistics> {
        let state = self.read()?;

        let mut by_status: BTreeMap<String, i64> = BTreeMap::new();
        let mut by_type: BTreeMap<String, i64> = BTreeMap::new();
        for doc in state.docs.values() {
            *by_status.entry(doc.status.to_string()).or_default() += 1;
            *by_type.entry(doc.file_type.clone()).or_default() += 1;
        }

        Ok(StoreStatistics {
            total_documents: state.docs.len() as i64,
            total_chunks: state.chunks.values().map(|c| c.len() as i64).sum(),
            total_results: state.results.len() as i64,
            by_status: by_status.into_iter().collect(),
            by_type: by_type.into_iter().collect(),
        })
    }
}
