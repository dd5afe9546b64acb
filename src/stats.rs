//! Database statistics and health overview.
//!
//! Provides a quick summary of what has been scanned: document, chunk, and
//! analysis counts plus per-status and per-type breakdowns. Used by
//! `docsift stats`.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let stats = store.statistics().await;
    pool.close().await;
    let stats = stats?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docsift Database Stats");
    println!("======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", stats.total_documents);
    println!("  Chunks:      {}", stats.total_chunks);
    println!("  Analyses:    {}", stats.total_results);

    if !stats.by_status.is_empty() {
        println!();
        println!("  By status:");
        for (status, count) in &stats.by_status {
            println!("    {:<12} {:>6}", status, count);
        }
    }

    if !stats.by_type.is_empty() {
        println!();
        println!("  By type:");
        for (file_type, count) in &stats.by_type {
            println!("    {:<12} {:>6}", file_type, count);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format seconds as `850ms`, `12.3s`, or `4m 05s`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-".to_string();
    }
    if seconds < 1.0 {
        format!("{}ms", (seconds * 1000.0).round() as u64)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else {
        let total = seconds.round() as u64;
        format!("{}m {:02}s", total / 60, total % 60)
    }
}
