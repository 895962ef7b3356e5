//! Ingestion and preprocessing stage.
//!
//! Turns a stored document into comparison-ready text:
//!
//! 1. FILE documents: extract raw text from the stored payload.
//! 2. Detect the language of the raw text.
//! 3. Normalize the raw text with the configured [`PreprocessOptions`].
//!
//! A failure in any step downgrades the document instead of failing the
//! run: FILE documents lose their raw text, and the normalized text becomes
//! whatever raw text is left, so the document still takes part in the
//! comparison.

use std::fmt;

use tracing::warn;

use crate::collaborators::{CollaboratorError, Services};
use crate::models::{Document, DocumentType, PreprocessOptions};

/// Content type assumed when an upload did not carry one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Step of the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStage {
    Extraction,
    LanguageDetection,
    Normalization,
}

impl fmt::Display for PrepareStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrepareStage::Extraction => "extraction",
            PrepareStage::LanguageDetection => "language_detection",
            PrepareStage::Normalization => "normalization",
        })
    }
}

/// What happened to one document.
#[derive(Debug)]
pub enum PrepareOutcome {
    Prepared,
    Degraded {
        stage: PrepareStage,
        error: CollaboratorError,
    },
}

impl PrepareOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PrepareOutcome::Degraded { .. })
    }
}

/// Runs extraction, detection and normalization on `doc` in place.
///
/// Never fails: collaborator errors are folded into
/// [`PrepareOutcome::Degraded`] and the document is downgraded. The caller
/// persists the document afterwards.
pub fn prepare_document(
    doc: &mut Document,
    services: &Services,
    options: &PreprocessOptions,
) -> PrepareOutcome {
    match run_steps(doc, services, options) {
        Ok(()) => PrepareOutcome::Prepared,
        Err((stage, error)) => {
            warn!(
                document_id = %doc.id,
                stage = %stage,
                error = %error,
                "preprocessing failed, comparing unprocessed text"
            );
            if doc.doc_type == DocumentType::File {
                doc.text_raw = Some(String::new());
            }
            doc.text = doc.text_raw.clone();
            PrepareOutcome::Degraded { stage, error }
        }
    }
}

fn run_steps(
    doc: &mut Document,
    services: &Services,
    options: &PreprocessOptions,
) -> Result<(), (PrepareStage, CollaboratorError)> {
    if doc.doc_type == DocumentType::File {
        let data = doc.file_data.as_deref().ok_or_else(|| {
            (
                PrepareStage::Extraction,
                CollaboratorError::Unsupported("document has no stored file".to_string()),
            )
        })?;
        let content_type = doc.content_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE);
        let raw = services
            .extractor
            .extract_text(data, content_type)
            .map_err(|e| (PrepareStage::Extraction, e))?;
        doc.text_raw = Some(raw);
    }

    let raw = doc.text_raw.clone().unwrap_or_default();

    let language = services
        .detector
        .detect(&raw)
        .map_err(|e| (PrepareStage::LanguageDetection, e))?;
    doc.language = Some(language.clone());

    let text = services
        .preprocessor
        .normalize(&raw, &language, options)
        .map_err(|e| (PrepareStage::Normalization, e))?;
    doc.text = Some(text);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CollabResult, LanguageDetector, NoCorpus, NoNotifier, Preprocessor, SimilarityEngine,
        TextExtractor,
    };
    use crate::models::Similarity;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedExtractor(Option<&'static str>);

    impl TextExtractor for FixedExtractor {
        fn extract_text(&self, _data: &[u8], content_type: &str) -> CollabResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| CollaboratorError::Unsupported(content_type.to_string()))
        }
    }

    struct FixedDetector(bool);

    impl LanguageDetector for FixedDetector {
        fn detect(&self, _text: &str) -> CollabResult<String> {
            if self.0 {
                Ok("en".to_string())
            } else {
                Err(CollaboratorError::Unsupported("too short".to_string()))
            }
        }
    }

    /// Uppercases so tests can tell normalized text from raw text.
    struct Upper;

    impl Preprocessor for Upper {
        fn normalize(
            &self,
            text: &str,
            _language: &str,
            _options: &PreprocessOptions,
        ) -> CollabResult<String> {
            Ok(text.to_uppercase())
        }
    }

    struct NeverCompared;

    #[async_trait]
    impl SimilarityEngine for NeverCompared {
        async fn compare(&self, _a: &str, _b: &str) -> CollabResult<Similarity> {
            Err(CollaboratorError::Incomparable("unused".to_string()))
        }
    }

    fn services(extract: Option<&'static str>, detect_ok: bool) -> Services {
        Services {
            extractor: Arc::new(FixedExtractor(extract)),
            detector: Arc::new(FixedDetector(detect_ok)),
            preprocessor: Arc::new(Upper),
            corpus: Arc::new(NoCorpus),
            similarity: Arc::new(NeverCompared),
            notifier: Arc::new(NoNotifier),
        }
    }

    #[test]
    fn text_document_is_normalized() {
        let mut doc = Document::from_text("s", "hello world");
        let outcome = prepare_document(&mut doc, &services(None, true), &Default::default());
        assert!(!outcome.is_degraded());
        assert_eq!(doc.text.as_deref(), Some("HELLO WORLD"));
        assert_eq!(doc.text_raw.as_deref(), Some("hello world"));
        assert_eq!(doc.language.as_deref(), Some("en"));
    }

    #[test]
    fn file_document_is_extracted_then_normalized() {
        let mut doc = Document::from_file("s", "a.pdf", Some("application/pdf".into()), vec![1]);
        let outcome =
            prepare_document(&mut doc, &services(Some("from pdf"), true), &Default::default());
        assert!(!outcome.is_degraded());
        assert_eq!(doc.text_raw.as_deref(), Some("from pdf"));
        assert_eq!(doc.text.as_deref(), Some("FROM PDF"));
    }

    #[test]
    fn failed_extraction_empties_file_text() {
        let mut doc = Document::from_file("s", "a.bin", None, vec![0, 1]);
        let outcome = prepare_document(&mut doc, &services(None, true), &Default::default());
        match outcome {
            PrepareOutcome::Degraded { stage, .. } => assert_eq!(stage, PrepareStage::Extraction),
            other => panic!("expected degraded, got {:?}", other),
        }
        assert_eq!(doc.text_raw.as_deref(), Some(""));
        assert_eq!(doc.text.as_deref(), Some(""));
    }

    #[test]
    fn failed_detection_keeps_raw_text_for_text_documents() {
        let mut doc = Document::from_text("s", "ok");
        let outcome = prepare_document(&mut doc, &services(None, false), &Default::default());
        assert!(outcome.is_degraded());
        assert_eq!(doc.text_raw.as_deref(), Some("ok"));
        assert_eq!(doc.text.as_deref(), Some("ok"));
        assert!(doc.language.is_none());
    }

    #[test]
    fn failed_detection_discards_extracted_file_text() {
        let mut doc = Document::from_file("s", "a.pdf", Some("application/pdf".into()), vec![1]);
        let outcome =
            prepare_document(&mut doc, &services(Some("extracted"), false), &Default::default());
        assert!(outcome.is_degraded());
        assert_eq!(doc.text_raw.as_deref(), Some(""));
        assert_eq!(doc.text.as_deref(), Some(""));
    }
}
