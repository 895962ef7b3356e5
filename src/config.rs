use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use antiplag_core::compare::CompareParams;
use antiplag_core::lifecycle::RunSettings;
use antiplag_core::models::PreprocessOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Submissions processed at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}
fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComparisonConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            candidate_limit: default_candidate_limit(),
            decimal_places: default_decimal_places(),
        }
    }
}

fn default_threshold() -> f64 {
    0.5
}
fn default_candidate_limit() -> usize {
    10
}
fn default_decimal_places() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreprocessConfig {
    #[serde(default = "default_true")]
    pub words_to_numbers: bool,
    #[serde(default)]
    pub remove_numbers: bool,
    #[serde(default)]
    pub tokenize_words: bool,
    #[serde(default)]
    pub lemmatize: bool,
    #[serde(default = "default_true")]
    pub remove_stopwords: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            words_to_numbers: true,
            remove_numbers: false,
            tokenize_words: false,
            lemmatize: false,
            remove_stopwords: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// `sqlite`, `elastic`, or `disabled`.
    #[serde(default = "default_corpus_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_text_field")]
    pub text_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            provider: default_corpus_provider(),
            url: None,
            index: default_index(),
            text_field: default_text_field(),
            name_field: default_name_field(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_corpus_provider() -> String {
    "sqlite".to_string()
}
fn default_index() -> String {
    "documents".to_string()
}
fn default_text_field() -> String {
    "text_preprocessed".to_string()
}
fn default_name_field() -> String {
    "name".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    /// `local` or `http`.
    #[serde(default = "default_similarity_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Words per shingle for the local engine.
    #[serde(default = "default_shingle_size")]
    pub shingle_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            provider: default_similarity_provider(),
            url: None,
            shingle_size: default_shingle_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_similarity_provider() -> String {
    "local".to_string()
}
fn default_shingle_size() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// `disabled`, `log`, or `webhook`.
    #[serde(default = "default_notify_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_sender")]
    pub sender: String,
    /// Base URL of the results page; the submission id is appended.
    #[serde(default = "default_results_url")]
    pub results_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            provider: default_notify_provider(),
            url: None,
            sender: default_sender(),
            results_url: default_results_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_notify_provider() -> String {
    "disabled".to_string()
}
fn default_sender() -> String {
    "noreply@antiplag.sk".to_string()
}
fn default_results_url() -> String {
    "https://antiplag.sk/submission/".to_string()
}

impl Config {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            compare: CompareParams {
                threshold: self.comparison.threshold,
                candidate_limit: self.comparison.candidate_limit,
                decimal_places: self.comparison.decimal_places,
            },
            preprocess: self.preprocess_options(),
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            words_to_numbers: self.preprocess.words_to_numbers,
            remove_numbers: self.preprocess.remove_numbers,
            tokenize_words: self.preprocess.tokenize_words,
            lemmatize: self.preprocess.lemmatize,
            remove_stopwords: self.preprocess.remove_stopwords,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if !(0.0..=1.0).contains(&config.comparison.threshold) {
        anyhow::bail!("comparison.threshold must be in [0.0, 1.0]");
    }
    if config.comparison.candidate_limit == 0 {
        anyhow::bail!("comparison.candidate_limit must be >= 1");
    }
    if config.comparison.decimal_places > 6 {
        anyhow::bail!("comparison.decimal_places must be <= 6");
    }
    if config.worker.concurrency == 0 {
        anyhow::bail!("worker.concurrency must be >= 1");
    }
    if config.worker.queue_capacity == 0 {
        anyhow::bail!("worker.queue_capacity must be >= 1");
    }

    match config.corpus.provider.as_str() {
        "sqlite" | "disabled" => {}
        "elastic" => {
            if config.corpus.url.is_none() {
                anyhow::bail!("corpus.url must be specified when provider is 'elastic'");
            }
        }
        other => anyhow::bail!(
            "Unknown corpus provider: '{}'. Must be sqlite, elastic, or disabled.",
            other
        ),
    }

    match config.similarity.provider.as_str() {
        "local" => {
            if config.similarity.shingle_size == 0 {
                anyhow::bail!("similarity.shingle_size must be > 0");
            }
        }
        "http" => {
            if config.similarity.url.is_none() {
                anyhow::bail!("similarity.url must be specified when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown similarity provider: '{}'. Must be local or http.",
            other
        ),
    }

    match config.notify.provider.as_str() {
        "disabled" | "log" => {}
        "webhook" => {
            if config.notify.url.is_none() {
                anyhow::bail!("notify.url must be specified when provider is 'webhook'");
            }
        }
        other => anyhow::bail!(
            "Unknown notify provider: '{}'. Must be disabled, log, or webhook.",
            other
        ),
    }

    Ok(())
}
