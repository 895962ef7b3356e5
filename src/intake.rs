//! Submission intake: turns an upload into a `PENDING` submission with its
//! documents. Processing is scheduled separately.

use antiplag_core::models::{Document, Submission};
use antiplag_core::store::Store;
use thiserror::Error;
use tracing::info;

use crate::extract::content_type_for_path;
use crate::status::{submission_view, SubmissionView};

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Uses the declared content type unless it is missing or generic, in
    /// which case the file extension decides.
    pub fn effective_content_type(&self) -> Option<String> {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => Some(ct.to_string()),
            declared => content_type_for_path(std::path::Path::new(&self.name))
                .map(str::to_string)
                .or_else(|| declared.map(str::to_string)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Upload {
    Files(Vec<UploadedFile>),
    Text(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("no files in upload")]
    NoDocuments,
    #[error("text body is not valid UTF-8")]
    NotUtf8,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Creates the submission and its documents, in upload order.
pub async fn create_submission(
    store: &dyn Store,
    upload: Upload,
    email: Option<String>,
) -> Result<SubmissionView, IntakeError> {
    let email = email.filter(|e| !e.trim().is_empty());

    let submission = Submission::new(email);
    let documents: Vec<Document> = match upload {
        Upload::Files(files) => {
            if files.is_empty() {
                return Err(IntakeError::NoDocuments);
            }
            files
                .into_iter()
                .map(|f| {
                    let content_type = f.effective_content_type();
                    Document::from_file(&submission.id, f.name, content_type, f.data)
                })
                .collect()
        }
        Upload::Text(body) => {
            let text = String::from_utf8(body).map_err(|_| IntakeError::NotUtf8)?;
            vec![Document::from_text(&submission.id, text)]
        }
    };

    store.create_submission(&submission).await?;
    for doc in &documents {
        store.insert_document(doc).await?;
    }
    info!(
        submission_id = %submission.id,
        documents = documents.len(),
        "submission created"
    );

    submission_view(store, &submission.id)
        .await?
        .ok_or_else(|| IntakeError::Storage(anyhow::anyhow!("submission vanished after insert")))
}
