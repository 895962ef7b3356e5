//! CLI command handlers. Each prints JSON to stdout.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use antiplag_core::lifecycle::{requeue, run_submission, RunOutcome};

use crate::config::Config;
use crate::corpus;
use crate::db;
use crate::intake::{create_submission, Upload, UploadedFile};
use crate::services::{build_services, text_services};
use crate::sqlite_store::SqliteStore;
use crate::status::{results_view, submission_view};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    Ok(SqliteStore::new(db::connect(config).await?))
}

async fn process(config: &Config, store: &SqliteStore, submission_id: &str) -> Result<RunOutcome> {
    let services = build_services(config, store.pool())?;
    run_submission(store, &services, &config.run_settings(), submission_id).await
}

fn read_upload(files: &[PathBuf], text: Option<String>) -> Result<Upload> {
    match (files.is_empty(), text) {
        (true, Some(text)) => Ok(Upload::Text(text.into_bytes())),
        (false, None) => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in files {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                uploads.push(UploadedFile {
                    name,
                    content_type: None,
                    data,
                });
            }
            Ok(Upload::Files(uploads))
        }
        (true, None) => bail!("nothing to submit: pass files or --text"),
        (false, Some(_)) => bail!("pass either files or --text, not both"),
    }
}

pub async fn run_submit(
    config: &Config,
    files: &[PathBuf],
    text: Option<String>,
    email: Option<String>,
    run_now: bool,
) -> Result<()> {
    let upload = read_upload(files, text)?;
    let store = open_store(config).await?;
    let view = create_submission(&store, upload, email).await?;

    if run_now {
        process(config, &store, &view.id).await?;
        match submission_view(&store, &view.id).await? {
            Some(done) => print_json(&done)?,
            None => bail!("submission not found: {}", view.id),
        }
    } else {
        print_json(&view)?;
    }
    Ok(())
}

pub async fn run_process(config: &Config, submission_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let outcome = process(config, &store, submission_id).await?;
    print_json(&outcome)
}

pub async fn run_requeue(config: &Config, submission_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    let requeued = requeue(&store, submission_id).await?;
    print_json(&serde_json::json!({
        "submission_id": submission_id,
        "requeued": requeued,
    }))
}

pub async fn run_status(config: &Config, submission_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    match submission_view(&store, submission_id).await? {
        Some(view) => print_json(&view),
        None => bail!("submission not found: {}", submission_id),
    }
}

pub async fn run_results(config: &Config, document_id: &str) -> Result<()> {
    let store = open_store(config).await?;
    match results_view(&store, document_id).await? {
        Some(view) => print_json(&view),
        None => bail!("document not found: {}", document_id),
    }
}

pub async fn run_corpus_add(config: &Config, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        bail!("no paths given");
    }
    let pool = db::connect(config).await?;
    let services = text_services()?;
    let report =
        corpus::add_paths(&pool, &services, &config.preprocess_options(), paths).await?;
    print_json(&report)
}

