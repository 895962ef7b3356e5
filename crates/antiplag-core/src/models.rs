//! Core data models shared by the pipeline, the stores, and the HTTP layer.
//!
//! A [`Submission`] owns an ordered set of [`Document`]s; each document owns
//! the append-only [`MatchResult`]s produced by comparison runs.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// Processing state of a submission.
///
/// Moves forward only: `Pending → Processing → Processed`. The single way
/// back is an explicit requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Pending,
    Processing,
    Processed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Processing => "PROCESSING",
            SubmissionStatus::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "PENDING" => Ok(SubmissionStatus::Pending),
            "PROCESSING" => Ok(SubmissionStatus::Processing),
            "PROCESSED" => Ok(SubmissionStatus::Processed),
            other => bail!("unknown submission status: {}", other),
        }
    }
}

/// One user-initiated check.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub id: String,
    pub status: SubmissionStatus,
    /// Address notified when processing finishes.
    pub email: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Submission {
    pub fn new(email: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: SubmissionStatus::Pending,
            email,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    File,
    Text,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::File => "FILE",
            DocumentType::Text => "TEXT",
        }
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "FILE" => Ok(DocumentType::File),
            "TEXT" => Ok(DocumentType::Text),
            other => bail!("unknown document type: {}", other),
        }
    }
}

/// One unit of text checked for overlap.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub submission_id: Option<String>,
    pub doc_type: DocumentType,
    /// Original filename for uploads; `None` for pasted text.
    pub name: Option<String>,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub file_data: Option<Vec<u8>>,
    pub text_raw: Option<String>,
    /// Normalized, comparison-ready text.
    pub text: Option<String>,
    pub language: Option<String>,
    pub total_percentage: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// A pasted-text document attached to `submission_id`.
    pub fn from_text(submission_id: &str, text_raw: impl Into<String>) -> Self {
        let mut doc = Self::empty(submission_id, DocumentType::Text);
        doc.text_raw = Some(text_raw.into());
        doc
    }

    /// An uploaded-file document; text is extracted during the run.
    pub fn from_file(
        submission_id: &str,
        name: impl Into<String>,
        content_type: Option<String>,
        data: Vec<u8>,
    ) -> Self {
        let mut doc = Self::empty(submission_id, DocumentType::File);
        doc.name = Some(name.into());
        doc.content_type = content_type;
        doc.file_data = Some(data);
        doc
    }

    fn empty(submission_id: &str, doc_type: DocumentType) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission_id: Some(submission_id.to_string()),
            doc_type,
            name: None,
            content_type: None,
            file_data: None,
            text_raw: None,
            text: None,
            language: None,
            total_percentage: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Text fed to corpus search and the similarity engine.
    pub fn comparison_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// Matched an item of the external corpus.
    Corpus,
    /// Matched a sibling document of the same submission.
    Uploaded,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Corpus => "CORPUS",
            MatchType::Uploaded => "UPLOADED",
        }
    }
}

impl FromStr for MatchType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "CORPUS" => Ok(MatchType::Corpus),
            "UPLOADED" => Ok(MatchType::Uploaded),
            other => bail!("unknown match type: {}", other),
        }
    }
}

/// Half-open `[start, end)` character interval; serialized as `[start, end]`.
pub type Interval = (usize, usize);

/// One recorded match between a document and a corpus item or sibling.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub id: String,
    pub document_id: String,
    /// Processing run that created this result.
    pub run_id: String,
    pub match_type: MatchType,
    pub match_id: String,
    pub match_name: Option<String>,
    pub percentage: f64,
    pub ranges: Vec<Interval>,
    pub created_at: i64,
}

/// A corpus item returned by [`CorpusSearch`](crate::collaborators::CorpusSearch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusCandidate {
    pub id: String,
    pub name: Option<String>,
    pub text_preprocessed: String,
}

/// Output of one successful pairwise comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Similarity {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Overlapping intervals in the first text.
    pub ranges: Vec<Interval>,
}

/// Options passed to the preprocessing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOptions {
    pub words_to_numbers: bool,
    pub remove_numbers: bool,
    pub tokenize_words: bool,
    pub lemmatize: bool,
    pub remove_stopwords: bool,
}

impl Default for PreprocessOptions {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            SubmissionStatus::Pending,
            SubmissionStatus::Processing,
            SubmissionStatus::Processed,
        ] {
            assert_eq!(s.as_str().parse::<SubmissionStatus>().unwrap(), s);
        }
        assert!("DONE".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn status_orders_forward() {
        assert!(SubmissionStatus::Pending < SubmissionStatus::Processing);
        assert!(SubmissionStatus::Processing < SubmissionStatus::Processed);
    }

    #[test]
    fn file_document_has_no_text_until_extracted() {
        let doc = Document::from_file("s1", "essay.pdf", None, vec![1, 2, 3]);
        assert_eq!(doc.doc_type, DocumentType::File);
        assert!(doc.text_raw.is_none());
        assert_eq!(doc.comparison_text(), "");
    }

    #[test]
    fn interval_serializes_as_pair() {
        let json = serde_json::to_string(&vec![(0usize, 4usize), (10, 12)]).unwrap();
        assert_eq!(json, "[[0,4],[10,12]]");
    }
}
