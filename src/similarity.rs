//! Pairwise similarity engines.
//!
//! [`ShingleEngine`] works locally on word shingles. [`HttpSimilarityEngine`]
//! delegates to a remote comparison service.

use std::collections::HashSet;

use antiplag_core::collaborators::{
    CollabResult, CollaboratorError, SimilarityEngine,
};
use antiplag_core::models::{Interval, Similarity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SimilarityConfig;
use crate::http;

/// A whitespace-delimited word and its `[start, end)` char offsets.
#[derive(Debug, Clone, PartialEq)]
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    let mut chars = 0usize;
    for (byte, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some((b, s)) = start.take() {
                tokens.push(Token {
                    text: &text[b..byte],
                    start: s,
                    end: chars,
                });
            }
        } else if start.is_none() {
            start = Some((byte, chars));
        }
        chars += 1;
    }
    if let Some((b, s)) = start {
        tokens.push(Token {
            text: &text[b..],
            start: s,
            end: chars,
        });
    }
    tokens
}

fn shingle_key(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .map(|t| t.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word-shingle overlap.
///
/// The score is the share of the first text's word characters covered by
/// shingles that also occur in the second text. Ranges are char intervals
/// of the first text, with adjacent covered words merged.
#[derive(Debug, Clone)]
pub struct ShingleEngine {
    size: usize,
}

impl ShingleEngine {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn similarity(&self, first: &str, second: &str) -> CollabResult<Similarity> {
        let left = tokenize(first);
        let right = tokenize(second);
        if left.is_empty() || right.is_empty() {
            return Err(CollaboratorError::Incomparable("empty text".into()));
        }

        let k = self.size.min(left.len()).min(right.len());
        let known: HashSet<String> = right.windows(k).map(shingle_key).collect();

        let mut covered = vec![false; left.len()];
        for (i, window) in left.windows(k).enumerate() {
            if known.contains(&shingle_key(window)) {
                covered[i..i + k].iter_mut().for_each(|c| *c = true);
            }
        }

        let total: usize = left.iter().map(|t| t.end - t.start).sum();
        let mut hit = 0usize;
        let mut ranges: Vec<Interval> = Vec::new();
        let mut prev_covered = false;
        for (token, &is_covered) in left.iter().zip(&covered) {
            if is_covered {
                hit += token.end - token.start;
                match ranges.last_mut() {
                    Some(last) if prev_covered => last.1 = token.end,
                    _ => ranges.push((token.start, token.end)),
                }
            }
            prev_covered = is_covered;
        }

        Ok(Similarity {
            score: hit as f64 / total as f64,
            ranges,
        })
    }
}

#[async_trait]
impl SimilarityEngine for ShingleEngine {
    async fn compare(&self, first: &str, second: &str) -> CollabResult<Similarity> {
        self.similarity(first, second)
    }
}

#[derive(Serialize)]
struct CompareRequest<'a> {
    first: &'a str,
    second: &'a str,
}

#[derive(Deserialize)]
struct CompareResponse {
    score: f64,
    #[serde(default)]
    ranges: Vec<Interval>,
}

/// Remote engine: `POST {url}` with `{"first", "second"}`, answering
/// `{"score", "ranges"}`.
pub struct HttpSimilarityEngine {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl HttpSimilarityEngine {
    pub fn new(config: &SimilarityConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("similarity.url required"))?;
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            url,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl SimilarityEngine for HttpSimilarityEngine {
    async fn compare(&self, first: &str, second: &str) -> CollabResult<Similarity> {
        let resp: CompareResponse = http::post_json(
            &self.client,
            &self.url,
            &CompareRequest { first, second },
            self.max_retries,
        )
        .await?;

        if !(0.0..=1.0).contains(&resp.score) {
            return Err(CollaboratorError::InvalidResponse(format!(
                "score out of range: {}",
                resp.score
            )));
        }
        Ok(Similarity {
            score: resp.score,
            ranges: resp.ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_tracks_char_offsets() {
        let toks = tokenize("  žltý kôň\tbeží ");
        let spans: Vec<(&str, usize, usize)> =
            toks.iter().map(|t| (t.text, t.start, t.end)).collect();
        assert_eq!(spans, vec![("žltý", 2, 6), ("kôň", 7, 10), ("beží", 11, 15)]);
    }

    #[test]
    fn identical_texts_score_one() {
        let engine = ShingleEngine::new(3);
        let sim = engine
            .similarity("a b c d e", "a b c d e")
            .unwrap();
        assert_eq!(sim.score, 1.0);
        assert_eq!(sim.ranges, vec![(0, 9)]);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let engine = ShingleEngine::new(2);
        let sim = engine.similarity("alpha beta gamma", "delta epsilon").unwrap();
        assert_eq!(sim.score, 0.0);
        assert!(sim.ranges.is_empty());
    }

    #[test]
    fn partial_overlap_is_relative_to_first_text() {
        let engine = ShingleEngine::new(2);
        // "aa bb" is shared; "cc dd" is not.
        let sim = engine.similarity("aa bb cc dd", "xx aa bb yy").unwrap();
        assert_eq!(sim.score, 0.5);
        assert_eq!(sim.ranges, vec![(0, 5)]);

        // Same pair the other way round: 2 of 4 words again, different range.
        let back = engine.similarity("xx aa bb yy", "aa bb cc dd").unwrap();
        assert_eq!(back.score, 0.5);
        assert_eq!(back.ranges, vec![(3, 8)]);
    }

    #[test]
    fn separate_matches_give_separate_ranges() {
        let engine = ShingleEngine::new(1);
        let sim = engine.similarity("one two three", "three one").unwrap();
        assert_eq!(sim.ranges, vec![(0, 3), (8, 13)]);
    }

    #[test]
    fn empty_text_is_incomparable() {
        let engine = ShingleEngine::new(3);
        assert!(matches!(
            engine.similarity("", "anything"),
            Err(CollaboratorError::Incomparable(_))
        ));
        assert!(matches!(
            engine.similarity("anything", "   "),
            Err(CollaboratorError::Incomparable(_))
        ));
    }

    #[test]
    fn short_texts_shrink_the_shingle() {
        let engine = ShingleEngine::new(5);
        let sim = engine.similarity("hello", "hello world again").unwrap();
        assert_eq!(sim.score, 1.0);
    }
}
