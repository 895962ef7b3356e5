//! Comparison and aggregation engine.
//!
//! For every document of a batch:
//!
//! 1. Fetch up to `candidate_limit` corpus candidates for the document text.
//! 2. Score the document against each candidate, then against every other
//!    document of the batch (siblings, excluded by id).
//! 3. Add every successfully scored pair to `similarity_sum`; pairs scoring
//!    strictly above `threshold` also count as matches and become results.
//! 4. `average = similarity_sum / match_count` (0 without matches), stored
//!    rounded up as the document's `total_percentage`.
//!
//! The numerator sums *all* scored pairs while the denominator counts only
//! the pairs above the threshold, so the aggregate can exceed 1.0. Whether
//! that is intended is an open question; the behaviour is kept as is.
//!
//! Scoring ([`score_document`]) does not touch the store and is idempotent
//! for unchanged inputs. [`compare_documents`] persists the results in
//! iteration order: corpus candidates by rank, then siblings by batch order.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborators::{CorpusSearch, SimilarityEngine};
use crate::models::{Document, Interval, MatchResult, MatchType};
use crate::store::Store;

/// Scaled values closer than this to a whole unit are not rounded up.
const ROUNDING_TOLERANCE: f64 = 1e-9;

/// Tuning parameters for one comparison run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareParams {
    /// Scores strictly above this value count as matches.
    pub threshold: f64,
    /// Maximum number of corpus candidates per document.
    pub candidate_limit: usize,
    /// Decimal places kept when rounding up percentages.
    pub decimal_places: u32,
}

impl Default for CompareParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            candidate_limit: 10,
            decimal_places: 2,
        }
    }
}

/// A match found while scoring, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingMatch {
    pub match_type: MatchType,
    pub match_id: String,
    pub match_name: Option<String>,
    pub percentage: f64,
    pub ranges: Vec<Interval>,
}

/// Scoring outcome for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentScore {
    pub document_id: String,
    /// Sum of every successfully scored pair.
    pub similarity_sum: f64,
    /// Pairs the similarity engine could score.
    pub scored_pairs: usize,
    /// Pairs scoring above the threshold.
    pub match_count: usize,
    pub total_percentage: f64,
    pub matches: Vec<PendingMatch>,
}

/// Rounds `value` up to `decimal_places` decimals.
///
/// Floating-point noise is ignored: `1.1000000000000001` rounds to `1.10`.
pub fn round_up(value: f64, decimal_places: u32) -> f64 {
    let factor = 10f64.powi(decimal_places as i32);
    let scaled = value * factor;
    let nearest = scaled.round();
    let units = if (scaled - nearest).abs() < ROUNDING_TOLERANCE {
        nearest
    } else {
        scaled.ceil()
    };
    units / factor
}

/// A document or corpus item the current document is compared with.
struct Opponent<'a> {
    match_type: MatchType,
    id: &'a str,
    name: Option<&'a str>,
    text: &'a str,
}

/// Scores `doc` against the corpus and its siblings in `batch`.
///
/// `batch` may contain `doc` itself; it is skipped by id. Collaborator
/// failures never escape: a failed search yields no corpus candidates and a
/// failed pair is left out of both the sum and the match count.
pub async fn score_document(
    doc: &Document,
    batch: &[Document],
    corpus: &dyn CorpusSearch,
    engine: &dyn SimilarityEngine,
    params: &CompareParams,
) -> DocumentScore {
    let text = doc.comparison_text();

    let mut candidates = match corpus.find_similar(text, params.candidate_limit).await {
        Ok(found) => found,
        Err(e) => {
            warn!(document_id = %doc.id, error = %e, "corpus search failed, no corpus candidates");
            Vec::new()
        }
    };
    candidates.truncate(params.candidate_limit);

    let opponents = candidates
        .iter()
        .map(|c| Opponent {
            match_type: MatchType::Corpus,
            id: &c.id,
            name: c.name.as_deref(),
            text: &c.text_preprocessed,
        })
        .chain(batch.iter().filter(|s| s.id != doc.id).map(|s| Opponent {
            match_type: MatchType::Uploaded,
            id: &s.id,
            name: s.name.as_deref(),
            text: s.comparison_text(),
        }));

    let mut score = DocumentScore {
        document_id: doc.id.clone(),
        similarity_sum: 0.0,
        scored_pairs: 0,
        match_count: 0,
        total_percentage: 0.0,
        matches: Vec::new(),
    };

    for opponent in opponents {
        let similarity = match engine.compare(text, opponent.text).await {
            Ok(s) => s,
            Err(e) => {
                debug!(
                    document_id = %doc.id,
                    match_id = %opponent.id,
                    match_type = opponent.match_type.as_str(),
                    error = %e,
                    "pair skipped"
                );
                continue;
            }
        };

        score.similarity_sum += similarity.score;
        score.scored_pairs += 1;

        if similarity.score > params.threshold {
            score.match_count += 1;
            score.matches.push(PendingMatch {
                match_type: opponent.match_type,
                match_id: opponent.id.to_string(),
                match_name: opponent.name.map(str::to_string),
                percentage: round_up(similarity.score, params.decimal_places),
                ranges: similarity.ranges,
            });
        }
    }

    let average = if score.match_count > 0 {
        score.similarity_sum / score.match_count as f64
    } else {
        0.0
    };
    score.total_percentage = round_up(average, params.decimal_places);

    score
}

/// Compares every document of `documents` and persists the outcome.
///
/// Creates one [`MatchResult`] per match, tagged with `run_id`, then writes
/// the document's `total_percentage`. Store errors abort the remaining work
/// and are returned; rows written for earlier documents stay in place.
pub async fn compare_documents<S: Store + ?Sized>(
    store: &S,
    documents: &mut [Document],
    corpus: &dyn CorpusSearch,
    engine: &dyn SimilarityEngine,
    run_id: &str,
    params: &CompareParams,
) -> Result<Vec<DocumentScore>> {
    let mut scores = Vec::with_capacity(documents.len());

    for i in 0..documents.len() {
        let score = score_document(&documents[i], documents, corpus, engine, params).await;

        for m in &score.matches {
            store
                .create_result(&MatchResult {
                    id: uuid::Uuid::new_v4().to_string(),
                    document_id: score.document_id.clone(),
                    run_id: run_id.to_string(),
                    match_type: m.match_type,
                    match_id: m.match_id.clone(),
                    match_name: m.match_name.clone(),
                    percentage: m.percentage,
                    ranges: m.ranges.clone(),
                    created_at: chrono::Utc::now().timestamp(),
                })
                .await?;
        }

        let doc = &mut documents[i];
        doc.total_percentage = Some(score.total_percentage);
        store.save_document(doc).await?;

        info!(
            document_id = %doc.id,
            scored_pairs = score.scored_pairs,
            matches = score.match_count,
            total_percentage = score.total_percentage,
            "document compared"
        );
        scores.push(score);
    }

    Ok(scores)
}
