//! # Antiplag
//!
//! A plagiarism checker. Users submit files or pasted text; every document
//! is extracted, normalized, and compared against a reference corpus and
//! against the other documents of the same submission.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────────────────┐
//! │ HTTP / CLI   │──▶│  SQLite   │◀──│ workers (JobQueue)   │
//! │ intake       │   │ store     │   │ run_submission       │
//! └──────────────┘   └──────────┘   └─────────┬────────────┘
//!                                             │
//!                      ┌──────────────┬───────┴──────┬──────────────┐
//!                      ▼              ▼              ▼              ▼
//!                 extract+nlp     corpus FTS5    similarity      notify
//!                                 / Elastic      local / HTTP    log / webhook
//! ```
//!
//! The pipeline itself (claim, preprocess, compare, aggregate) lives in
//! `antiplag-core`; this crate supplies storage, collaborators, and the
//! outer surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! antiplag init
//! antiplag corpus add ./reference-papers
//! antiplag submit essay.docx notes.pdf --run
//! antiplag serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`extract`] | Text extraction from uploads |
//! | [`nlp`] | Language detection and normalization |
//! | [`similarity`] | Pairwise similarity engines |
//! | [`corpus`] | Reference corpus search and loading |
//! | [`notify`] | Completion notifications |
//! | [`services`] | Collaborator wiring |
//! | [`intake`] | Submission creation |
//! | [`queue`] | Background workers |
//! | [`status`] | Read views |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command handlers |

pub mod commands;
pub mod config;
pub mod corpus;
pub mod db;
pub mod extract;
pub mod http;
pub mod intake;
pub mod migrate;
pub mod nlp;
pub mod notify;
pub mod queue;
pub mod server;
pub mod services;
pub mod similarity;
pub mod sqlite_store;
pub mod status;
