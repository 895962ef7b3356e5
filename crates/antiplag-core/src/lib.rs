//! # Antiplag Core
//!
//! Runtime-agnostic logic for Antiplag: data models, collaborator traits,
//! the store abstraction, and the processing pipeline.
//!
//! ```text
//! run_submission ──▶ prepare_document (per document)
//!                └─▶ compare_documents ──▶ CorpusSearch + SimilarityEngine
//! ```
//!
//! This crate contains no tokio, sqlx, or network dependencies. The
//! `antiplag` crate provides the SQLite store and the concrete
//! collaborators.

pub mod collaborators;
pub mod compare;
pub mod lifecycle;
pub mod models;
pub mod prepare;
pub mod store;
