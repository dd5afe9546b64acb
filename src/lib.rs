//! # docsift
//!
//! A local-first document analyzer. docsift walks a folder, extracts text
//! from PDF, DOCX, plain-text, and image files, splits it into bounded
//! chunks, and asks a local language model (Ollama) for a summary,
//! keywords, categories, and a sentiment score. Everything is stored in
//! SQLite for later browsing and search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌──────────────┐
//! │ Scanner  │──▶│  Extract   │──▶│ Normalize │──▶│   Chunker    │
//! │ walkdir  │   │ pdf/docx/… │   │           │   │ para→sent→wd │
//! └──────────┘   └────────────┘   └───────────┘   └──────┬───────┘
//!                                                        ▼
//!                 ┌──────────┐   ┌────────────┐   ┌──────────────┐
//!                 │  SQLite  │◀──│Orchestrator│──▶│  Aggregator  │
//!                 │  Store   │   │ per doc    │   │ + LLM client │
//!                 └──────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsift init                   # create database
//! docsift probe                  # check the model endpoint
//! docsift scan ~/Documents       # extract, chunk, analyze
//! docsift scan ~/Contracts --detailed
//! docsift search "invoice"
//! docsift get 42
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scanner`] | Folder discovery |
//! | [`extract`] | Per-format text extraction |
//! | [`normalize`] | Whitespace and control-character cleanup |
//! | [`chunk`] | Paragraph → sentence → word chunking |
//! | [`llm`] | Model endpoint client and analysis operations |
//! | [`aggregate`] | Combine-then-analyze and per-chunk merging |
//! | [`orchestrator`] | Per-document analysis state machine |
//! | [`pipeline`] | Scan loop |
//! | [`control`] | Cancellation flag and scan counters |
//! | [`progress`] | Progress reporting on stderr |
//! | [`store`] | Storage trait and in-memory backend |
//! | [`sqlite_store`] | SQLite backend |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | tracing subscriber setup |
//! | [`get`], [`search`], [`stats`] | Read-only commands |

pub mod aggregate;
pub mod chunk;
pub mod config;
pub mod control;
pub mod db;
pub mod extract;
pub mod get;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod search;
pub mod sqlite_store;
pub mod stats;
pub mod store;
