//! TOML configuration.
//!
//! Only `[db]` is required. Every other section falls back to defaults
//! that match a stock Ollama install on the local machine.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upper bound for `analysis.max_keywords`.
pub const MAX_KEYWORDS: usize = 10;
/// Upper bound for `analysis.max_categories`.
pub const MAX_CATEGORIES: usize = 3;
const SENTIMENT_FLOOR: f64 = -1.0;
const SENTIMENT_CEILING: f64 = 1.0;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Character budget per chunk.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    4000
}

/// Budgets and thresholds used by the aggregator and the orchestrator.
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_combine_budget")]
    pub combine_budget: usize,
    #[serde(default = "default_combine_min_tail")]
    pub combine_min_tail: usize,
    #[serde(default = "default_text_cap")]
    pub summary_cap: usize,
    #[serde(default = "default_text_cap")]
    pub keywords_cap: usize,
    #[serde(default = "default_text_cap")]
    pub categories_cap: usize,
    #[serde(default = "default_sentiment_cap")]
    pub sentiment_cap: usize,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_max_categories")]
    pub max_categories: usize,
    /// Number of failed sub-operations (out of four) at which an
    /// analysis is rejected.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "default_sentiment_min")]
    pub sentiment_min: f64,
    #[serde(default = "default_sentiment_max")]
    pub sentiment_max: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            combine_budget: default_combine_budget(),
            combine_min_tail: default_combine_min_tail(),
            summary_cap: default_text_cap(),
            keywords_cap: default_text_cap(),
            categories_cap: default_text_cap(),
            sentiment_cap: default_sentiment_cap(),
            max_keywords: default_max_keywords(),
            max_categories: default_max_categories(),
            failure_threshold: default_failure_threshold(),
            sentiment_min: default_sentiment_min(),
            sentiment_max: default_sentiment_max(),
        }
    }
}

fn default_combine_budget() -> usize {
    8000
}
fn default_combine_min_tail() -> usize {
    100
}
fn default_text_cap() -> usize {
    2000
}
fn default_sentiment_cap() -> usize {
    1500
}
fn default_max_keywords() -> usize {
    MAX_KEYWORDS
}
fn default_max_categories() -> usize {
    MAX_CATEGORIES
}
fn default_failure_threshold() -> usize {
    3
}
fn default_sentiment_min() -> f64 {
    -1.0
}
fn default_sentiment_max() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Send a one-line prompt during the connectivity probe.
    #[serde(default = "default_true")]
    pub probe_generation: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            probe_generation: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_probe_timeout_secs() -> u64 {
    10
}
fn default_temperature() -> f32 {
    0.3
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> u32 {
    40
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            max_depth: default_max_depth(),
            include_hidden: false,
        }
    }
}

fn default_extensions() -> Vec<String> {
    ["pdf", "docx", "txt", "png", "jpg", "jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}
fn default_max_depth() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_ocr_command")]
    pub ocr_command: String,
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_command: default_ocr_command(),
            ocr_languages: default_ocr_languages(),
        }
    }
}

fn default_ocr_command() -> String {
    "tesseract".to_string()
}
fn default_ocr_languages() -> String {
    "ell+eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration with every section at its default, rooted at `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            chunking: ChunkingConfig::default(),
            analysis: AnalysisConfig::default(),
            llm: LlmConfig::default(),
            scanner: ScannerConfig::default(),
            extraction: ExtractionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chunk_size == 0 {
            bail!("chunking.max_chunk_size must be > 0");
        }
        if self.analysis.combine_budget == 0 {
            bail!("analysis.combine_budget must be > 0");
        }
        if self.analysis.combine_min_tail >= self.analysis.combine_budget {
            bail!("analysis.combine_min_tail must be < analysis.combine_budget");
        }
        if !(1..=MAX_KEYWORDS).contains(&self.analysis.max_keywords) {
            bail!("analysis.max_keywords must be in [1, {}]", MAX_KEYWORDS);
        }
        if !(1..=MAX_CATEGORIES).contains(&self.analysis.max_categories) {
            bail!("analysis.max_categories must be in [1, {}]", MAX_CATEGORIES);
        }
        if !(1..=4).contains(&self.analysis.failure_threshold) {
            bail!("analysis.failure_threshold must be in [1, 4]");
        }
        if self.analysis.sentiment_min >= self.analysis.sentiment_max {
            bail!("analysis.sentiment_min must be < analysis.sentiment_max");
        }
        if self.analysis.sentiment_min < SENTIMENT_FLOOR
            || self.analysis.sentiment_max > SENTIMENT_CEILING
        {
            bail!(
                "analysis.sentiment_min and analysis.sentiment_max must lie within [{:.1}, {:.1}]",
                SENTIMENT_FLOOR,
                SENTIMENT_CEILING
            );
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.timeout_secs == 0 {
            bail!("llm.timeout_secs must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
