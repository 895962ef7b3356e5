//! Contracts for the services the pipeline consumes as black boxes.
//!
//! Every call returns an explicit `Result<_, CollaboratorError>` so that the
//! containment boundaries of the pipeline (one document, one pair) are
//! visible in the types: the pipeline matches on these results and never
//! lets them escape a run. Storage failures travel on a different channel
//! (`anyhow::Error` from [`Store`](crate::store::Store)) and are fatal.
//!
//! | Trait | Called by | Failure effect |
//! |-------|-----------|----------------|
//! | [`TextExtractor`] | prepare | document downgraded |
//! | [`LanguageDetector`] | prepare | document downgraded |
//! | [`Preprocessor`] | prepare | document downgraded |
//! | [`CorpusSearch`] | compare | no corpus candidates |
//! | [`SimilarityEngine`] | compare | pair skipped |
//! | [`Notifier`] | lifecycle | logged only |

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CorpusCandidate, PreprocessOptions, Similarity};

/// Failure kinds a collaborator can report.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The input cannot be handled at all (unknown format, empty text).
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// The two texts cannot be compared.
    #[error("texts are not comparable: {0}")]
    Incomparable(String),

    /// The backing service could not be reached or answered with an error.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered but the answer was unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// Turns a stored file payload into plain text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, data: &[u8], content_type: &str) -> CollabResult<String>;
}

/// Detects the language of a text, returning a short language code.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> CollabResult<String>;
}

/// Normalizes raw text into comparison-ready text.
pub trait Preprocessor: Send + Sync {
    fn normalize(
        &self,
        text: &str,
        language: &str,
        options: &PreprocessOptions,
    ) -> CollabResult<String>;
}

/// Finds reference documents similar to a text.
#[async_trait]
pub trait CorpusSearch: Send + Sync {
    /// Returns at most `limit` candidates in relevance order.
    async fn find_similar(&self, text: &str, limit: usize) -> CollabResult<Vec<CorpusCandidate>>;
}

/// Scores the overlap of `first` relative to `second`.
#[async_trait]
pub trait SimilarityEngine: Send + Sync {
    async fn compare(&self, first: &str, second: &str) -> CollabResult<Similarity>;
}

/// Tells the submitter that a check has finished.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_completion(&self, address: &str, submission_id: &str) -> CollabResult<()>;
}

/// The full set of collaborators a processing run needs.
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn TextExtractor>,
    pub detector: Arc<dyn LanguageDetector>,
    pub preprocessor: Arc<dyn Preprocessor>,
    pub corpus: Arc<dyn CorpusSearch>,
    pub similarity: Arc<dyn SimilarityEngine>,
    pub notifier: Arc<dyn Notifier>,
}

/// Corpus search that never returns candidates.
pub struct NoCorpus;

#[async_trait]
impl CorpusSearch for NoCorpus {
    async fn find_similar(&self, _text: &str, _limit: usize) -> CollabResult<Vec<CorpusCandidate>> {
        Ok(Vec::new())
    }
}

/// Notifier that drops every notification.
pub struct NoNotifier;

#[async_trait]
impl Notifier for NoNotifier {
    async fn send_completion(&self, _address: &str, _submission_id: &str) -> CollabResult<()> {
        Ok(())
    }
}
