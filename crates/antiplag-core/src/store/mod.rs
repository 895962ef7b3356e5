//! Storage abstraction for submissions, documents, and results.
//!
//! The [`Store`] trait is everything the pipeline needs from persistence.
//! Writes are per entity (one document, one result) rather than one batch
//! transaction, so an interrupted run leaves the rows it already wrote.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Document, MatchResult, Submission, SubmissionStatus};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_submission`](Store::create_submission) | Insert a new submission |
/// | [`get_submission`](Store::get_submission) | Fetch a submission by id |
/// | [`claim_submission`](Store::claim_submission) | Atomic `PENDING → PROCESSING` |
/// | [`set_submission_status`](Store::set_submission_status) | Unconditional status write |
/// | [`requeue_submission`](Store::requeue_submission) | Reset to `PENDING` for reprocessing |
/// | [`submissions_with_status`](Store::submissions_with_status) | Ids in a given state |
/// | [`insert_document`](Store::insert_document) | Attach a new document |
/// | [`get_document`](Store::get_document) | Fetch a document by id |
/// | [`list_documents`](Store::list_documents) | Documents of a submission, in insertion order |
/// | [`save_document`](Store::save_document) | Persist texts, language and aggregate |
/// | [`create_result`](Store::create_result) | Append a match result |
/// | [`list_results`](Store::list_results) | Results of a document, in creation order |
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_submission(&self, submission: &Submission) -> Result<()>;

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>>;

    /// Moves the submission from `PENDING` to `PROCESSING` as one atomic
    /// step. Returns `false` when the submission is missing or in any other
    /// state, in which case nothing was written.
    async fn claim_submission(&self, id: &str) -> Result<bool>;

    async fn set_submission_status(&self, id: &str, status: SubmissionStatus) -> Result<()>;

    /// Puts a `PROCESSING` or `PROCESSED` submission back to `PENDING`.
    /// Returns `false` when the submission does not exist or is already pending.
    async fn requeue_submission(&self, id: &str) -> Result<bool>;

    async fn submissions_with_status(&self, status: SubmissionStatus) -> Result<Vec<String>>;

    async fn insert_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, submission_id: &str) -> Result<Vec<Document>>;

    /// Writes `text_raw`, `text`, `language` and `total_percentage`.
    async fn save_document(&self, document: &Document) -> Result<()>;

    async fn create_result(&self, result: &MatchResult) -> Result<()>;

    async fn list_results(&self, document_id: &str) -> Result<Vec<MatchResult>>;
}
