//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the tables created by
//! [`migrate`](crate::migrate). Documents and results are returned in
//! insertion order (`rowid`).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use antiplag_core::models::{Document, Interval, MatchResult, Submission, SubmissionStatus};
use antiplag_core::store::Store;

const DOCUMENT_COLUMNS: &str = "id, submission_id, type, name, content_type, file_data, \
     text_raw, text, language, total_percentage, created_at, updated_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn row_to_submission(row: &SqliteRow) -> Result<Submission> {
    let status: String = row.get("status");
    Ok(Submission {
        id: row.get("id"),
        status: status.parse()?,
        email: row.get("email"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let doc_type: String = row.get("type");
    Ok(Document {
        id: row.get("id"),
        submission_id: row.get("submission_id"),
        doc_type: doc_type.parse()?,
        name: row.get("name"),
        content_type: row.get("content_type"),
        file_data: row.get("file_data"),
        text_raw: row.get("text_raw"),
        text: row.get("text"),
        language: row.get("language"),
        total_percentage: row.get("total_percentage"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_result(row: &SqliteRow) -> Result<MatchResult> {
    let match_type: String = row.get("match_type");
    let ranges_json: String = row.get("ranges_json");
    let ranges: Vec<Interval> = serde_json::from_str(&ranges_json)?;
    Ok(MatchResult {
        id: row.get("id"),
        document_id: row.get("document_id"),
        run_id: row.get("run_id"),
        match_type: match_type.parse()?,
        match_id: row.get("match_id"),
        match_name: row.get("match_name"),
        percentage: row.get("percentage"),
        ranges,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_submission(&self, submission: &Submission) -> Result<()> {
        sqlx::query(
            "INSERT INTO submissions (id, status, email, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&submission.id)
        .bind(submission.status.as_str())
        .bind(&submission.email)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query(
            "SELECT id, status, email, created_at, updated_at FROM submissions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_submission).transpose()
    }

    async fn claim_submission(&self, id: &str) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE submissions SET status = 'PROCESSING', updated_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn set_submission_status(&self, id: &str, status: SubmissionStatus) -> Result<()> {
        let done = sqlx::query("UPDATE submissions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(anyhow!("submission not found: {}", id));
        }
        Ok(())
    }

    async fn requeue_submission(&self, id: &str) -> Result<bool> {
        let done = sqlx::query(
            "UPDATE submissions SET status = 'PENDING', updated_at = ? WHERE id = ? AND status != 'PENDING'",
        )
        .bind(now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn submissions_with_status(&self, status: SubmissionStatus) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM submissions WHERE status = ? ORDER BY rowid")
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn insert_document(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, submission_id, type, name, content_type, file_data,
                                   text_raw, text, language, total_percentage,
                                   created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.submission_id)
        .bind(document.doc_type.as_str())
        .bind(&document.name)
        .bind(&document.content_type)
        .bind(&document.file_data)
        .bind(&document.text_raw)
        .bind(&document.text)
        .bind(&document.language)
        .bind(document.total_percentage)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?", DOCUMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self, submission_id: &str) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE submission_id = ? ORDER BY rowid",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(submission_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE documents
            SET text_raw = ?, text = ?, language = ?, total_percentage = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&document.text_raw)
        .bind(&document.text)
        .bind(&document.language)
        .bind(document.total_percentage)
        .bind(now())
        .bind(&document.id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(anyhow!("document not found: {}", document.id));
        }
        Ok(())
    }

    async fn create_result(&self, result: &MatchResult) -> Result<()> {
        let ranges_json = serde_json::to_string(&result.ranges)?;
        sqlx::query(
            r#"
            INSERT INTO results (id, document_id, run_id, match_type, match_id, match_name,
                                 percentage, ranges_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.id)
        .bind(&result.document_id)
        .bind(&result.run_id)
        .bind(result.match_type.as_str())
        .bind(&result.match_id)
        .bind(&result.match_name)
        .bind(result.percentage)
        .bind(&ranges_json)
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_results(&self, document_id: &str) -> Result<Vec<MatchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, run_id, match_type, match_id, match_name,
                   percentage, ranges_json, created_at
            FROM results
            WHERE document_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_result).collect()
    }
}
