//! Document search and listing.
//!
//! `docsift search` runs a substring match over file names, summaries,
//! keywords, and chunk text; `docsift list` shows the newest documents,
//! optionally filtered by status. Both print one block per document.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::get::format_ts_iso;
use crate::models::{Document, DocumentStatus};
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

const DEFAULT_LIMIT: i64 = 20;

pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let results = store
        .search_documents(query, limit.unwrap_or(DEFAULT_LIMIT))
        .await;
    pool.close().await;

    print_documents(&results?);
    Ok(())
}

pub async fn run_list(
    config: &Config,
    status: Option<DocumentStatus>,
    limit: Option<i64>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let docs = store
        .list_documents(status, Some(limit.unwrap_or(DEFAULT_LIMIT)))
        .await;
    pool.close().await;

    print_documents(&docs?);
    Ok(())
}

fn print_documents(docs: &[Document]) {
    if docs.is_empty() {
        println!("No results.");
        return;
    }

    for (i, doc) in docs.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, doc.status, doc.name);
        println!("    path: {}", doc.path);
        println!("    added: {}", format_ts_iso(doc.created_at));
        if let Some(ref error) = doc.error_message {
            println!("    error: {}", error);
        }
        println!("    id: {}", doc.id);
        println!();
    }
}
