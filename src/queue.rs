//! Background processing of submissions.
//!
//! The HTTP intake enqueues a submission id and returns; a fixed pool of
//! worker tasks pulls ids from a bounded channel and calls
//! [`run_submission`]. Enqueueing the same id twice is harmless: the second
//! run finds the submission already claimed.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use antiplag_core::collaborators::Services;
use antiplag_core::lifecycle::{run_submission, RunOutcome, RunSettings};
use antiplag_core::models::SubmissionStatus;
use antiplag_core::store::Store;

/// Handle used to schedule submissions for processing.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<String>,
}

impl JobQueue {
    /// Spawns `workers` tasks consuming a channel of `capacity` ids.
    pub fn start(
        store: Arc<dyn Store>,
        services: Services,
        settings: RunSettings,
        workers: usize,
        capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel::<String>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let settings = Arc::new(settings);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = rx.clone();
            let store = store.clone();
            let services = services.clone();
            let settings = settings.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(submission_id) = next else {
                        debug!(worker_id, "queue closed, worker exiting");
                        break;
                    };

                    // A panicking run ends its own task, not the worker.
                    let run = tokio::spawn({
                        let store = store.clone();
                        let services = services.clone();
                        let settings = settings.clone();
                        let submission_id = submission_id.clone();
                        async move {
                            run_submission(store.as_ref(), &services, &settings, &submission_id)
                                .await
                        }
                    });

                    match run.await {
                        Ok(Ok(RunOutcome::Completed(report))) => info!(
                            worker_id,
                            submission_id = %report.submission_id,
                            run_id = %report.run_id,
                            results = report.results,
                            "submission processed"
                        ),
                        Ok(Ok(outcome)) => {
                            debug!(worker_id, %submission_id, ?outcome, "run skipped")
                        }
                        Ok(Err(e)) => error!(
                            worker_id,
                            %submission_id,
                            error = %e,
                            "run aborted, submission left in PROCESSING"
                        ),
                        Err(e) => error!(
                            worker_id,
                            %submission_id,
                            error = %e,
                            "run panicked, submission left in PROCESSING"
                        ),
                    }
                }
            }));
        }

        (Self { tx }, handles)
    }

    /// Schedules without waiting for room. Fails when the queue is full or
    /// closed; the submission then stays `PENDING` until the next
    /// [`recover_pending`](Self::recover_pending).
    pub fn try_enqueue(&self, submission_id: &str) -> Result<()> {
        self.tx
            .try_send(submission_id.to_string())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => anyhow::anyhow!("job queue is full"),
                mpsc::error::TrySendError::Closed(_) => anyhow::anyhow!("job queue is closed"),
            })
    }

    pub async fn enqueue(&self, submission_id: &str) -> Result<()> {
        self.tx
            .send(submission_id.to_string())
            .await
            .map_err(|_| anyhow::anyhow!("job queue is closed"))
    }

    /// Enqueues every submission still `PENDING`, e.g. after a restart.
    pub async fn recover_pending(&self, store: &dyn Store) -> Result<usize> {
        let pending = store.submissions_with_status(SubmissionStatus::Pending).await?;
        for id in &pending {
            self.enqueue(id).await?;
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "re-enqueued pending submissions");
        }
        Ok(pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use antiplag_core::collaborators::{CollabResult, NoCorpus, NoNotifier, Preprocessor};
    use antiplag_core::models::{Document, PreprocessOptions, Submission};
    use antiplag_core::store::memory::InMemoryStore;
    use std::time::Duration;

    use crate::extract::FileExtractor;
    use crate::nlp::{TextPreprocessor, WhatlangDetector};
    use crate::similarity::ShingleEngine;

    fn services() -> Services {
        Services {
            extractor: Arc::new(FileExtractor),
            detector: Arc::new(WhatlangDetector),
            preprocessor: Arc::new(TextPreprocessor::new().unwrap()),
            corpus: Arc::new(NoCorpus),
            similarity: Arc::new(ShingleEngine::new(2)),
            notifier: Arc::new(NoNotifier),
        }
    }

    async fn wait_processed(store: &dyn Store, id: &str) -> bool {
        for _ in 0..100 {
            let sub = store.get_submission(id).await.unwrap().unwrap();
            if sub.status == SubmissionStatus::Processed {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn workers_process_enqueued_and_recovered_submissions() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());

        let first = Submission::new(None);
        store.create_submission(&first).await.unwrap();
        store
            .insert_document(&Document::from_text(&first.id, "some text to check here"))
            .await
            .unwrap();
        let second = Submission::new(None);
        store.create_submission(&second).await.unwrap();

        let (queue, _handles) =
            JobQueue::start(store.clone(), services(), RunSettings::default(), 2, 8);

        queue.enqueue(&first.id).await.unwrap();
        // Duplicate enqueue is a no-op run.
        queue.enqueue(&first.id).await.unwrap();
        assert!(wait_processed(store.as_ref(), &first.id).await);

        assert_eq!(queue.recover_pending(store.as_ref()).await.unwrap(), 1);
        assert!(wait_processed(store.as_ref(), &second.id).await);
    }

    async fn text_submission(store: &dyn Store, text: &str) -> Submission {
        let sub = Submission::new(None);
        store.create_submission(&sub).await.unwrap();
        store
            .insert_document(&Document::from_text(&sub.id, text))
            .await
            .unwrap();
        sub
    }

    #[tokio::test]
    async fn long_number_word_chain_does_not_stall_a_single_worker() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let chain = vec!["hundred"; 12].join(" ");
        let heavy = text_submission(
            store.as_ref(),
            &format!("The committee wrote {} in the margin of the report before lunch.", chain),
        )
        .await;
        let plain = text_submission(store.as_ref(), "An ordinary essay about the river and the town.").await;

        let (queue, _handles) =
            JobQueue::start(store.clone(), services(), RunSettings::default(), 1, 8);
        queue.enqueue(&heavy.id).await.unwrap();
        queue.enqueue(&plain.id).await.unwrap();

        assert!(wait_processed(store.as_ref(), &heavy.id).await);
        assert!(wait_processed(store.as_ref(), &plain.id).await);
    }

    struct PanicsOnBoom;

    impl Preprocessor for PanicsOnBoom {
        fn normalize(&self, text: &str, _: &str, _: &PreprocessOptions) -> CollabResult<String> {
            if text.contains("boom") {
                panic!("normalizer blew up");
            }
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn panicking_run_does_not_take_the_worker_down() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let bad = text_submission(store.as_ref(), "this text goes boom when normalized").await;
        let good = text_submission(store.as_ref(), "this text is perfectly fine to normalize").await;

        let services = Services {
            preprocessor: Arc::new(PanicsOnBoom),
            ..services()
        };
        let (queue, _handles) = JobQueue::start(store.clone(), services, RunSettings::default(), 1, 8);
        queue.enqueue(&bad.id).await.unwrap();
        queue.enqueue(&good.id).await.unwrap();

        assert!(wait_processed(store.as_ref(), &good.id).await);
        let bad = store.get_submission(&bad.id).await.unwrap().unwrap();
        assert_eq!(bad.status, SubmissionStatus::Processing);
    }

    #[tokio::test]
    async fn try_enqueue_fails_fast_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = JobQueue { tx };

        queue.try_enqueue("first").unwrap();
        let err = queue.try_enqueue("second").unwrap_err();
        assert!(err.to_string().contains("full"));
    }
}
