//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Insertion order is kept, which
//! gives the same document and result ordering as the SQLite store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Document, MatchResult, Submission, SubmissionStatus};

use super::Store;

/// In-memory store.
pub struct InMemoryStore {
    submissions: RwLock<Vec<Submission>>,
    documents: RwLock<Vec<Document>>,
    results: RwLock<Vec<MatchResult>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            submissions: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
            results: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_submission(&self, submission: &Submission) -> Result<()> {
        let mut subs = write(&self.submissions)?;
        if subs.iter().any(|s| s.id == submission.id) {
            return Err(anyhow!("submission already exists: {}", submission.id));
        }
        subs.push(submission.clone());
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        Ok(read(&self.submissions)?.iter().find(|s| s.id == id).cloned())
    }

    async fn claim_submission(&self, id: &str) -> Result<bool> {
        let mut subs = write(&self.submissions)?;
        match subs.iter_mut().find(|s| s.id == id) {
            Some(s) if s.status == SubmissionStatus::Pending => {
                s.status = SubmissionStatus::Processing;
                s.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_submission_status(&self, id: &str, status: SubmissionStatus) -> Result<()> {
        let mut subs = write(&self.submissions)?;
        let s = subs
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("submission not found: {}", id))?;
        s.status = status;
        s.updated_at = now();
        Ok(())
    }

    async fn requeue_submission(&self, id: &str) -> Result<bool> {
        let mut subs = write(&self.submissions)?;
        match subs.iter_mut().find(|s| s.id == id) {
            Some(s) if s.status != SubmissionStatus::Pending => {
                s.status = SubmissionStatus::Pending;
                s.updated_at = now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn submissions_with_status(&self, status: SubmissionStatus) -> Result<Vec<String>> {
        Ok(read(&self.submissions)?
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.id.clone())
            .collect())
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        write(&self.documents)?.push(document.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(read(&self.documents)?.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents(&self, submission_id: &str) -> Result<Vec<Document>> {
        Ok(read(&self.documents)?
            .iter()
            .filter(|d| d.submission_id.as_deref() == Some(submission_id))
            .cloned()
            .collect())
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        let mut docs = write(&self.documents)?;
        let stored = docs
            .iter_mut()
            .find(|d| d.id == document.id)
            .ok_or_else(|| anyhow!("document not found: {}", document.id))?;
        stored.text_raw = document.text_raw.clone();
        stored.text = document.text.clone();
        stored.language = document.language.clone();
        stored.total_percentage = document.total_percentage;
        stored.updated_at = now();
        Ok(())
    }

    async fn create_result(&self, result: &MatchResult) -> Result<()> {
        write(&self.results)?.push(result.clone());
        Ok(())
    }

    async fn list_results(&self, document_id: &str) -> Result<Vec<MatchResult>> {
        Ok(read(&self.results)?
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect())
    }
}
