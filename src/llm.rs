//! Local language-model client.
//!
//! Two layers:
//! - **[`TextGenerator`]**: the endpoint seam, "generate text from a
//!   prompt" and "list available models". [`OllamaGenerator`] implements it
//!   over the Ollama HTTP API (`POST /api/generate`, `GET /api/tags`).
//! - **[`AnalysisClient`]**: the four analysis operations (summary,
//!   keywords, categories, sentiment) plus the connectivity probe. Each
//!   operation truncates its input to its own character cap, issues one
//!   request, and parses the reply. Operations are independent: one
//!   failing never affects another.
//!
//! # Failure modes
//!
//! A request fails on a non-2xx status, a timeout, a connection error, or
//! an unparseable body. The probe separates "endpoint unreachable" from
//! "model not loaded" and lists the models that *are* loaded.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{AnalysisConfig, LlmConfig};
use crate::normalize::truncate_chars;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("could not connect to the model endpoint: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("model endpoint is unreachable: {0}")]
    Unreachable(String),

    #[error("model {model} is not loaded. Available: {}", format_models(.available))]
    ModelNotLoaded {
        model: String,
        available: Vec<String>,
    },

    #[error("model test failed: {0}")]
    ProbeFailed(String),
}

fn format_models(models: &[String]) -> String {
    if models.is_empty() {
        "none".to_string()
    } else {
        models.join(", ")
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_connect() {
            LlmError::Connection(e.to_string())
        } else if e.is_decode() {
            LlmError::Parse(e.to_string())
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

/// The four independent analysis operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisOp {
    Summary,
    Keywords,
    Categories,
    Sentiment,
}

impl AnalysisOp {
    pub const ALL: [AnalysisOp; 4] = [
        AnalysisOp::Summary,
        AnalysisOp::Keywords,
        AnalysisOp::Categories,
        AnalysisOp::Sentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisOp::Summary => "summary",
            AnalysisOp::Keywords => "keywords",
            AnalysisOp::Categories => "categories",
            AnalysisOp::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for AnalysisOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generative text endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier sent with every request.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Names of the models the endpoint currently serves.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

// ============ Ollama ============

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// [`TextGenerator`] backed by an Ollama server.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    options: SamplingOptions,
    client: reqwest::Client,
    probe_client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let probe_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: SamplingOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
            },
            client,
            probe_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        tracing::debug!(
            model = %self.model,
            eval_count = parsed.eval_count.unwrap_or(0),
            total_duration_ns = parsed.total_duration.unwrap_or(0),
            "generation finished"
        );
        parsed
            .response
            .map(|text| text.trim().to_string())
            .ok_or_else(|| LlmError::Parse("missing 'response' field".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .probe_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

// ============ Analysis operations ============

const SUMMARY_PROMPT: &str = "Summarize the following text in 2-3 sentences, covering its main points.";
const KEYWORDS_PROMPT: &str = "Extract the 10 most important keywords from the following text. \
Reply with a single comma-separated list and nothing else.";
const CATEGORIES_PROMPT: &str = "Categorize the following text. Choose up to 3 categories from: \
Legal, Financial, Technology, Education, Medical, Scientific, Administrative, Marketing, Personal, Other. \
Reply with a comma-separated list and nothing else.";
const SENTIMENT_PROMPT: &str = "Rate the emotional tone of the following text on a scale from -1.0 \
(very negative) to 1.0 (very positive). Reply with the number only, for example: 0.3";
const PROBE_PROMPT: &str = "Hello! Reply with 'Hello!'";

fn build_prompt(instruction: &str, text: &str, answer_label: &str) -> String {
    format!("{}\n\nText:\n{}\n\n{}:", instruction, text, answer_label)
}

/// A parsed sentiment reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    pub score: f64,
    /// `false` when the reply held no number and the score defaulted.
    pub parsed: bool,
}

/// Character caps, list limits, and clamp bounds for the four operations.
#[derive(Debug, Clone)]
pub struct OperationLimits {
    pub summary_cap: usize,
    pub keywords_cap: usize,
    pub categories_cap: usize,
    pub sentiment_cap: usize,
    pub max_keywords: usize,
    pub max_categories: usize,
    pub sentiment_min: f64,
    pub sentiment_max: f64,
}

impl From<&AnalysisConfig> for OperationLimits {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            summary_cap: config.summary_cap,
            keywords_cap: config.keywords_cap,
            categories_cap: config.categories_cap,
            sentiment_cap: config.sentiment_cap,
            max_keywords: config.max_keywords,
            max_categories: config.max_categories,
            sentiment_min: config.sentiment_min,
            sentiment_max: config.sentiment_max,
        }
    }
}

impl Default for OperationLimits {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

/// The analysis operations over a [`TextGenerator`].
pub struct AnalysisClient {
    generator: Box<dyn TextGenerator>,
    limits: OperationLimits,
    probe_generation: bool,
}

impl AnalysisClient {
    pub fn new(generator: Box<dyn TextGenerator>, limits: OperationLimits) -> Self {
        Self {
            generator,
            limits,
            probe_generation: true,
        }
    }

    /// Build an Ollama-backed client from configuration.
    pub fn from_config(llm: &LlmConfig, analysis: &AnalysisConfig) -> Result<Self, LlmError> {
        let generator = OllamaGenerator::new(llm)?;
        Ok(Self::new(Box::new(generator), OperationLimits::from(analysis))
            .with_probe_generation(llm.probe_generation))
    }

    pub fn with_probe_generation(mut self, enabled: bool) -> Self {
        self.probe_generation = enabled;
        self
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub fn limits(&self) -> &OperationLimits {
        &self.limits
    }

    pub async fn summarize(&self, text: &str) -> Result<String, LlmError> {
        let prompt = build_prompt(
            SUMMARY_PROMPT,
            truncate_chars(text, self.limits.summary_cap),
            "Summary",
        );
        self.request(AnalysisOp::Summary, &prompt).await
    }

    pub async fn extract_keywords(&self, text: &str) -> Result<Vec<String>, LlmError> {
        let prompt = build_prompt(
            KEYWORDS_PROMPT,
            truncate_chars(text, self.limits.keywords_cap),
            "Keywords",
        );
        let reply = self.request(AnalysisOp::Keywords, &prompt).await?;
        Ok(parse_list(&reply, self.limits.max_keywords))
    }

    pub async fn categorize(&self, text: &str) -> Result<Vec<String>, LlmError> {
        let prompt = build_prompt(
            CATEGORIES_PROMPT,
            truncate_chars(text, self.limits.categories_cap),
            "Categories",
        );
        let reply = self.request(AnalysisOp::Categories, &prompt).await?;
        Ok(parse_list(&reply, self.limits.max_categories))
    }

    pub async fn score_sentiment(&self, text: &str) -> Result<SentimentScore, LlmError> {
        let prompt = build_prompt(
            SENTIMENT_PROMPT,
            truncate_chars(text, self.limits.sentiment_cap),
            "Sentiment score",
        );
        let reply = self.request(AnalysisOp::Sentiment, &prompt).await?;
        let score = parse_sentiment(&reply, self.limits.sentiment_min, self.limits.sentiment_max);
        if !score.parsed {
            tracing::warn!(reply = %reply, "no sentiment score in model reply, defaulting to 0.0");
        }
        Ok(score)
    }

    /// Check endpoint liveness, then model availability, then (optionally)
    /// that the model answers a trivial prompt.
    pub async fn test_connection(&self) -> Result<(), LlmError> {
        let models = self
            .generator
            .list_models()
            .await
            .map_err(|e| LlmError::Unreachable(e.to_string()))?;

        let model = self.generator.model_name();
        if !models.iter().any(|m| m == model) {
            return Err(LlmError::ModelNotLoaded {
                model: model.to_string(),
                available: models,
            });
        }

        if self.probe_generation {
            self.generator
                .generate(PROBE_PROMPT)
                .await
                .map_err(|e| LlmError::ProbeFailed(e.to_string()))?;
        }

        tracing::debug!(model = %model, "model endpoint is healthy");
        Ok(())
    }

    async fn request(&self, op: AnalysisOp, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(op = %op, prompt_chars = prompt.chars().count(), "sending prompt");
        self.generator.generate(prompt).await.map_err(|e| {
            tracing::error!(op = %op, error = %e, "analysis request failed");
            e
        })
    }
}

/// Comma-separated reply → trimmed, non-empty items in emitted order,
/// at most `limit` of them. No deduplication at this layer.
pub fn parse_list(reply: &str, limit: usize) -> Vec<String> {
    reply
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)").expect("static number regex"))
}

/// First numeric token in `reply`, clamped to `[min, max]`; `0.0` (also
/// clamped) with `parsed = false` when there is none.
pub fn parse_sentiment(reply: &str, min: f64, max: f64) -> SentimentScore {
    let value = number_re()
        .find(reply)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite());

    match value {
        Some(v) => SentimentScore {
            score: v.clamp(min, max),
            parsed: true,
        },
        None => SentimentScore {
            score: 0.0_f64.clamp(min, max),
            parsed: false,
        },
    }
}
