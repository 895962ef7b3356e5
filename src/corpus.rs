//! Reference corpus backends.
//!
//! - [`SqliteCorpus`]: the local `corpus` table, searched through the
//!   `corpus_fts` FTS5 index. Filled with `antiplag corpus add`.
//! - [`ElasticCorpus`]: an Elasticsearch index queried with `more_like_this`.
//!
//! Both store preprocessed text, so candidates can be handed to the
//! similarity engine as they are.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use antiplag_core::collaborators::{CollabResult, CollaboratorError, CorpusSearch, Services};
use antiplag_core::models::{CorpusCandidate, PreprocessOptions};

use crate::config::CorpusConfig;
use crate::extract::content_type_for_path;
use crate::http;

/// Upper bound on distinct terms put into one FTS query.
const MAX_QUERY_TERMS: usize = 64;

/// Builds an FTS5 OR-query from the distinct words of `text`.
///
/// Each term is double-quoted so FTS5 operators in the input are inert.
/// Returns `None` when the text has no usable terms.
pub fn fts_query(text: &str) -> Option<String> {
    let mut seen = HashSet::new();
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .take(MAX_QUERY_TERMS)
        .map(|t| format!("\"{}\"", t))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

pub struct SqliteCorpus {
    pool: SqlitePool,
}

impl SqliteCorpus {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CorpusCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.text_preprocessed
            FROM corpus_fts f
            JOIN corpus c ON c.id = f.corpus_id
            WHERE corpus_fts MATCH ?
            ORDER BY f.rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CorpusCandidate {
                id: row.get("id"),
                name: row.get("name"),
                text_preprocessed: row.get("text_preprocessed"),
            })
            .collect())
    }
}

#[async_trait]
impl CorpusSearch for SqliteCorpus {
    async fn find_similar(&self, text: &str, limit: usize) -> CollabResult<Vec<CorpusCandidate>> {
        let Some(query) = fts_query(text) else {
            return Ok(Vec::new());
        };
        self.search(&query, limit)
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))
    }
}

pub struct ElasticCorpus {
    client: reqwest::Client,
    search_url: String,
    text_field: String,
    name_field: String,
    max_retries: u32,
}

impl ElasticCorpus {
    pub fn new(config: &CorpusConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("corpus.url required"))?;
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            search_url: format!("{}/{}/_search", url.trim_end_matches('/'), config.index),
            text_field: config.text_field.clone(),
            name_field: config.name_field.clone(),
            max_retries: config.max_retries,
        })
    }

    fn query_body(&self, text: &str, limit: usize) -> Value {
        json!({
            "size": limit,
            "_source": [&self.name_field, &self.text_field],
            "query": {
                "more_like_this": {
                    "fields": [&self.text_field],
                    "like": text,
                    "min_term_freq": 1,
                    "min_doc_freq": 1
                }
            }
        })
    }

    fn parse_hits(&self, body: &Value) -> CollabResult<Vec<CorpusCandidate>> {
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| CollaboratorError::InvalidResponse("missing hits.hits".into()))?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| CollaboratorError::InvalidResponse("hit without _id".into()))?;
            let source = hit.get("_source");
            let text = source
                .and_then(|s| s.get(&self.text_field))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let name = source
                .and_then(|s| s.get(&self.name_field))
                .and_then(Value::as_str)
                .map(str::to_string);
            out.push(CorpusCandidate {
                id: id.to_string(),
                name,
                text_preprocessed: text.to_string(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl CorpusSearch for ElasticCorpus {
    async fn find_similar(&self, text: &str, limit: usize) -> CollabResult<Vec<CorpusCandidate>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body: Value = http::post_json(
            &self.client,
            &self.search_url,
            &self.query_body(text, limit),
            self.max_retries,
        )
        .await?;
        let mut hits = self.parse_hits(&body)?;
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Outcome of [`add_paths`].
#[derive(Debug, Default, Clone, Serialize)]
pub struct CorpusAddReport {
    pub added: usize,
    pub duplicates: usize,
    pub failed: usize,
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Inserts one preprocessed text. Returns `false` when an identical text is
/// already in the corpus.
pub async fn insert_item(pool: &SqlitePool, name: Option<&str>, text: &str) -> Result<bool> {
    let id = uuid::Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    let done = sqlx::query(
        "INSERT OR IGNORE INTO corpus (id, name, text_preprocessed, text_hash, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(text)
    .bind(text_hash(text))
    .bind(chrono::Utc::now().timestamp())
    .execute(&mut *tx)
    .await?;

    if done.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("INSERT INTO corpus_fts (corpus_id, text) VALUES (?, ?)")
        .bind(&id)
        .bind(text)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in paths {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    Ok(files)
}

fn prepare_file(
    path: &Path,
    services: &Services,
    options: &PreprocessOptions,
) -> std::result::Result<String, String> {
    let content_type =
        content_type_for_path(path).ok_or_else(|| "unknown file extension".to_string())?;
    let data = std::fs::read(path).map_err(|e| e.to_string())?;
    let raw = services
        .extractor
        .extract_text(&data, content_type)
        .map_err(|e| e.to_string())?;
    let language = services.detector.detect(&raw).map_err(|e| e.to_string())?;
    services
        .preprocessor
        .normalize(&raw, &language, options)
        .map_err(|e| e.to_string())
}

/// Walks `paths`, extracts and normalizes every file, and adds it to the
/// local corpus. Files that cannot be read or processed are counted and
/// skipped.
pub async fn add_paths(
    pool: &SqlitePool,
    services: &Services,
    options: &PreprocessOptions,
    paths: &[PathBuf],
) -> Result<CorpusAddReport> {
    let mut report = CorpusAddReport::default();

    for path in collect_files(paths)? {
        let text = match prepare_file(&path, services, options) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(path = %path.display(), "no text after preprocessing, skipping");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot add to corpus");
                report.failed += 1;
                continue;
            }
        };

        let name = path.file_name().map(|n| n.to_string_lossy().to_string());
        if insert_item(pool, name.as_deref(), &text).await? {
            debug!(path = %path.display(), "added to corpus");
            report.added += 1;
        } else {
            report.duplicates += 1;
        }
    }

    info!(
        added = report.added,
        duplicates = report.duplicates,
        failed = report.failed,
        "corpus update finished"
    );
    Ok(report)
}
