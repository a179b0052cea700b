//! # scrivener - multi-source literature review pipeline
//!
//! Plans a literature review with an LLM, screens three information sources
//! concurrently (PubMed, ClinicalTrials.gov, web search), gathers full texts
//! for the selected articles and synthesizes a cited Markdown report.
//!
//! ## Overview
//!
//! scrivener can be used in two ways:
//!
//! 1. **As a CLI** - Run the `scrivener` binary
//! 2. **As a library** - Drive the [`orchestrator::Orchestrator`] from your
//!    own code with typed [`types::Command`]s
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scrivener::config::Config;
//! use scrivener::orchestrator::Orchestrator;
//! use scrivener::session::{JsonFileStore, SessionStore};
//! use scrivener::types::Command;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("scrivener.toml")?;
//!     let store = Arc::new(
//!         SessionStore::open(Box::new(JsonFileStore::new(&config.storage.path))).await?,
//!     );
//!     let orchestrator = Orchestrator::from_config(&config, Arc::clone(&store))?;
//!
//!     let session = store.create("gut microbiome and mood disorders").await?;
//!     orchestrator
//!         .handle(&session.id, Command::StartResearch {
//!             topic: session.topic.clone(),
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! A session walks a fixed stage sequence: `IDLE` (plan negotiation) →
//! `PLANNING` (plan drafted, refinable) → `SCREENING` (three concurrent
//! search-critique-score pipelines) → `GATHERING` (one full text at a time)
//! → `SYNTHESIZING` → `DONE`. A failed step records its error and, where
//! replayable, the exact command on the session; retry is always
//! user-initiated.

/// Command-line interface: argument parsing and subcommand handlers.
pub mod cli;
/// TOML configuration loaded from `scrivener.toml`.
pub mod config;
/// Generic search-critique-score screening engine.
pub mod engine;
/// Full-text gathering (page scraping with a time bound).
pub mod gather;
/// Judge (LLM) clients: OpenAI-compatible and Gemini.
pub mod llm;
/// Command dispatch over the session state machine.
pub mod orchestrator;
/// Prompt builders for every judge call.
pub mod prompts;
/// Session lifecycle and the persisted session store.
pub mod session;
/// Source clients: PubMed, ClinicalTrials.gov, web search.
pub mod sources;
/// Final report synthesis.
pub mod synthesis;
/// Core types (sessions, plans, commands, errors).
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use engine::{run_screening, EngineObserver, ScreeningLimits};
pub use llm::{JudgeClient, JudgeProvider};
pub use orchestrator::Orchestrator;
pub use session::{JsonFileStore, MemoryStore, SessionStore};
pub use sources::{SourceClient, SourceItem};
pub use types::{AppError, Command, ResearchSession, Result, Stage};
