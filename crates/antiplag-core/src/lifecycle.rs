//! Submission lifecycle controller.
//!
//! One run takes a submission through `PENDING → PROCESSING → PROCESSED`:
//! claim, preprocess every document, compare the batch, mark processed,
//! notify. The claim is an atomic compare-and-swap on the status, so two
//! runs started for the same submission cannot both proceed.
//!
//! A run that dies half-way leaves the submission in `PROCESSING`; nothing
//! resumes it automatically. [`requeue`] puts it back to `PENDING`.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborators::Services;
use crate::compare::{compare_documents, CompareParams};
use crate::models::{PreprocessOptions, SubmissionStatus};
use crate::prepare::prepare_document;
use crate::store::Store;

/// Settings applied to every run.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub compare: CompareParams,
    pub preprocess: PreprocessOptions,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub submission_id: String,
    pub documents: usize,
    /// Documents whose preprocessing failed and were compared unprocessed.
    pub degraded: usize,
    pub results: usize,
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// No submission with that id.
    NotFound,
    /// Another run holds or already finished the submission.
    AlreadyClaimed { status: SubmissionStatus },
    Completed(RunReport),
}

/// Processes one submission end to end.
///
/// Unknown ids and submissions that are not `PENDING` are no-ops reported
/// through [`RunOutcome`]. Only store failures are returned as errors; they
/// abort the run and leave the submission in `PROCESSING`.
pub async fn run_submission<S: Store + ?Sized>(
    store: &S,
    services: &Services,
    settings: &RunSettings,
    submission_id: &str,
) -> Result<RunOutcome> {
    let Some(submission) = store.get_submission(submission_id).await? else {
        debug!(submission_id, "unknown submission, nothing to run");
        return Ok(RunOutcome::NotFound);
    };

    if !store.claim_submission(submission_id).await? {
        let status = store
            .get_submission(submission_id)
            .await?
            .map(|s| s.status)
            .unwrap_or(submission.status);
        info!(submission_id, status = %status, "submission not pending, skipping run");
        return Ok(RunOutcome::AlreadyClaimed { status });
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    info!(submission_id, run_id = %run_id, "processing submission");

    let mut documents = store.list_documents(submission_id).await?;
    let mut degraded = 0usize;
    for doc in documents.iter_mut() {
        if prepare_document(doc, services, &settings.preprocess).is_degraded() {
            degraded += 1;
        }
        store.save_document(doc).await?;
    }

    let scores = compare_documents(
        store,
        &mut documents,
        services.corpus.as_ref(),
        services.similarity.as_ref(),
        &run_id,
        &settings.compare,
    )
    .await?;
    let results = scores.iter().map(|s| s.matches.len()).sum();

    store
        .set_submission_status(submission_id, SubmissionStatus::Processed)
        .await?;
    info!(
        submission_id,
        run_id = %run_id,
        documents = documents.len(),
        degraded,
        results,
        "submission processed"
    );

    let mut notified = false;
    if let Some(address) = submission.email.as_deref() {
        match services.notifier.send_completion(address, submission_id).await {
            Ok(()) => notified = true,
            Err(e) => warn!(submission_id, error = %e, "completion notification failed"),
        }
    }

    Ok(RunOutcome::Completed(RunReport {
        run_id,
        submission_id: submission_id.to_string(),
        documents: documents.len(),
        degraded,
        results,
        notified,
    }))
}

/// Resets a processed or stuck submission to `PENDING`.
///
/// Returns `false` if the submission does not exist or is already pending.
pub async fn requeue<S: Store + ?Sized>(store: &S, submission_id: &str) -> Result<bool> {
    let reset = store.requeue_submission(submission_id).await?;
    if reset {
        info!(submission_id, "submission requeued");
    }
    Ok(reset)
}
