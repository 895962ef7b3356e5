//! Read-side views of submissions, documents and results, shared by the
//! CLI and the HTTP server.

use anyhow::Result;
use serde::Serialize;

use antiplag_core::models::{DocumentType, MatchResult, SubmissionStatus};
use antiplag_core::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub total_percentage: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub id: String,
    pub status: SubmissionStatus,
    pub email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub documents: Vec<DocumentSummary>,
}

/// A single document including its texts.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub summary: DocumentSummary,
    pub submission_id: Option<String>,
    pub text_raw: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultsView {
    pub document_id: String,
    pub total_percentage: Option<f64>,
    pub results: Vec<MatchResult>,
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn summarize(doc: &antiplag_core::models::Document) -> DocumentSummary {
    DocumentSummary {
        id: doc.id.clone(),
        doc_type: doc.doc_type,
        name: doc.name.clone(),
        content_type: doc.content_type.clone(),
        language: doc.language.clone(),
        total_percentage: doc.total_percentage,
        created_at: format_ts_iso(doc.created_at),
        updated_at: format_ts_iso(doc.updated_at),
    }
}

pub async fn submission_view(store: &dyn Store, id: &str) -> Result<Option<SubmissionView>> {
    let Some(sub) = store.get_submission(id).await? else {
        return Ok(None);
    };
    let documents = store.list_documents(id).await?;
    Ok(Some(SubmissionView {
        id: sub.id,
        status: sub.status,
        email: sub.email,
        created_at: format_ts_iso(sub.created_at),
        updated_at: format_ts_iso(sub.updated_at),
        documents: documents.iter().map(summarize).collect(),
    }))
}

pub async fn document_view(store: &dyn Store, id: &str) -> Result<Option<DocumentView>> {
    Ok(store.get_document(id).await?.map(|doc| DocumentView {
        summary: summarize(&doc),
        submission_id: doc.submission_id,
        text_raw: doc.text_raw,
        text: doc.text,
    }))
}

pub async fn results_view(store: &dyn Store, document_id: &str) -> Result<Option<ResultsView>> {
    let Some(doc) = store.get_document(document_id).await? else {
        return Ok(None);
    };
    Ok(Some(ResultsView {
        document_id: doc.id,
        total_percentage: doc.total_percentage,
        results: store.list_results(document_id).await?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_ts_iso(1_700_000_000), "2023-11-14T22:13:20Z");
    }
}
