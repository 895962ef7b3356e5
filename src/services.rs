//! Builds the collaborator set selected by the configuration.

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use antiplag_core::collaborators::{
    CorpusSearch, NoCorpus, NoNotifier, Notifier, Services, SimilarityEngine,
};

use crate::config::Config;
use crate::corpus::{ElasticCorpus, SqliteCorpus};
use crate::extract::FileExtractor;
use crate::nlp::{TextPreprocessor, WhatlangDetector};
use crate::notify::{LogNotifier, WebhookNotifier};
use crate::similarity::{HttpSimilarityEngine, ShingleEngine};

/// Collaborators for extraction and normalization only. Used by
/// `corpus add`, which needs neither search nor notification.
pub fn text_services() -> Result<Services> {
    Ok(Services {
        extractor: Arc::new(FileExtractor),
        detector: Arc::new(WhatlangDetector),
        preprocessor: Arc::new(TextPreprocessor::with_all_stopwords()?),
        corpus: Arc::new(NoCorpus),
        similarity: Arc::new(ShingleEngine::new(3)),
        notifier: Arc::new(NoNotifier),
    })
}

pub fn build_services(config: &Config, pool: &SqlitePool) -> Result<Services> {
    let corpus: Arc<dyn CorpusSearch> = match config.corpus.provider.as_str() {
        "sqlite" => Arc::new(SqliteCorpus::new(pool.clone())),
        "elastic" => Arc::new(ElasticCorpus::new(&config.corpus)?),
        "disabled" => Arc::new(NoCorpus),
        other => anyhow::bail!("Unknown corpus provider: {}", other),
    };

    let similarity: Arc<dyn SimilarityEngine> = match config.similarity.provider.as_str() {
        "local" => Arc::new(ShingleEngine::new(config.similarity.shingle_size)),
        "http" => Arc::new(HttpSimilarityEngine::new(&config.similarity)?),
        other => anyhow::bail!("Unknown similarity provider: {}", other),
    };

    let notifier: Arc<dyn Notifier> = match config.notify.provider.as_str() {
        "disabled" => Arc::new(NoNotifier),
        "log" => Arc::new(LogNotifier::new(&config.notify)),
        "webhook" => Arc::new(WebhookNotifier::new(&config.notify)?),
        other => anyhow::bail!("Unknown notify provider: {}", other),
    };

    Ok(Services {
        corpus,
        similarity,
        notifier,
        ..text_services()?
    })
}
