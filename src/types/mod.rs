//! Core types: research sessions, plans, source items, commands and errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Research Plan Types =============

/// A single facet of the research topic, phrased as a question to answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubQuestion {
    /// Unique within the plan. The judge may omit or duplicate ids; they are
    /// reconciled after every plan-producing call.
    pub id: String,
    pub question: String,
    /// Search keywords (MeSH terms and common phrases) for this facet.
    pub keywords: Vec<String>,
}

/// Structured research plan negotiated with the user before any search runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchPlan {
    #[serde(rename = "subQuestions")]
    pub sub_questions: Vec<SubQuestion>,
    /// The judge's clarifying restatement of the topic, shown to the user
    /// and reused as the main-topic line in downstream prompts.
    #[serde(default)]
    pub clarification: String,
    /// Short natural-language query for the web source.
    #[serde(rename = "webQuery", default)]
    pub web_query: String,
}

// ============= Source Item Types =============

/// A PubMed abstract record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub pmid: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// A ClinicalTrials.gov study record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicalTrial {
    #[serde(rename = "nctId")]
    pub nct_id: String,
    pub title: String,
    pub status: String,
    pub summary: String,
    pub conditions: Vec<String>,
    pub interventions: Vec<String>,
    pub url: String,
}

/// A web search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// An item after relevance screening by the judge.
///
/// `score` is 1-10 as stated by the judge; items the judge omitted from its
/// response carry 0 and a placeholder reason, and are never dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scored<T> {
    #[serde(flatten)]
    pub item: T,
    pub score: u8,
    pub reason: String,
}

/// Full text gathered for one selected article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FullText {
    pub pmid: String,
    pub text: String,
}

// ============= Session Types =============

/// Pipeline stage of a research session.
///
/// Error display is not a stage: a non-null `error` with an unchanged stage
/// represents a failed step awaiting user-initiated retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Idle,
    Planning,
    Screening,
    Gathering,
    Synthesizing,
    Done,
}

/// One user-visible research task and all of its accumulated state.
///
/// Sessions are mutated by whole-record replacement through the
/// [`SessionStore`](crate::session::SessionStore); the three concurrent
/// screening pipelines each write only their own fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchSession {
    pub id: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub topic: String,
    #[serde(rename = "researchPlan")]
    pub research_plan: Option<ResearchPlan>,

    /// Query snapshot for the literature source; supplemental queries are
    /// appended as they are issued.
    #[serde(rename = "pubmedQuery")]
    pub pubmed_query: Option<String>,
    #[serde(rename = "clinicalTrialsQuery")]
    pub clinical_trials_query: Option<String>,

    /// Pre-score literature results, visible while screening is in flight.
    /// Cleared once scoring completes.
    #[serde(rename = "rawArticles")]
    pub raw_articles: Vec<Article>,
    #[serde(rename = "scoredAbstracts")]
    pub scored_abstracts: Vec<Scored<Article>>,
    #[serde(rename = "clinicalTrials")]
    pub clinical_trials: Vec<Scored<ClinicalTrial>>,
    #[serde(rename = "webResults")]
    pub web_results: Vec<Scored<WebResult>>,

    #[serde(rename = "articlesToFetch")]
    pub articles_to_fetch: Vec<Scored<Article>>,
    #[serde(rename = "fullTexts")]
    pub full_texts: Vec<FullText>,
    /// Cursor into `articles_to_fetch`; monotonically increasing and never
    /// exceeding its length.
    #[serde(rename = "gatheringIndex")]
    pub gathering_index: usize,

    #[serde(rename = "finalReport")]
    pub final_report: String,

    /// Transient UI-facing progress indicators, not business state.
    pub loading: bool,
    #[serde(rename = "loadingMessage")]
    pub loading_message: Option<String>,

    pub error: Option<String>,
    /// The command that last failed, enabling exact user-initiated replay.
    #[serde(rename = "lastFailedAction")]
    pub last_failed_action: Option<Command>,

    /// Append-only, timestamped audit trail. Never truncated or reordered.
    pub log: Vec<String>,
}

// ============= Commands =============

/// Typed inbound commands consumed by the orchestrator.
///
/// Serialized with an external `type`/`payload` envelope so a failed command
/// can be persisted on the session and replayed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartResearch { topic: String },
    RefinePlan { feedback: String },
    ExecuteSearch { plan: ResearchPlan },
    StartGathering { articles: Vec<Scored<Article>> },
    ScrapeOne { pmid: String },
    SkipOne { pmid: String },
    SynthesizeReport,
    AppendLog { message: String },
    Reset,
}

impl Command {
    /// Whether a failure of this command is recorded as `last_failed_action`.
    ///
    /// Scraping is tied to transient page context and is retried by simply
    /// re-issuing the command; log appends and resets have nothing to replay.
    pub fn replayable(&self) -> bool {
        !matches!(
            self,
            Command::ScrapeOne { .. }
                | Command::SkipOne { .. }
                | Command::AppendLog { .. }
                | Command::Reset
        )
    }
}

// ============= Error Types =============

/// Application error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or invalid configuration (e.g. an unset API key). Fatal until
    /// the configuration is fixed; no retry path.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The judge's structured output could not be parsed into the expected
    /// fields. Kept distinct from provider errors so the user sees a
    /// "could not parse model output" class of failure.
    #[error("Could not parse model output: {0}")]
    MalformedResponse(String),

    /// Non-success response from the judge provider.
    #[error("Judge error: {0}")]
    Judge(String),

    /// Network or provider error from a source client.
    #[error("Source error: {0}")]
    Source(String),

    /// Full-text extraction failed for the current item.
    #[error("Scrape error: {0}")]
    Scrape(String),

    /// An operation exceeded its time bound (full-text scrape only).
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A state-machine precondition was not met (e.g. synthesis without any
    /// gathered full text).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Session persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_item_flattens_on_serialization() {
        let scored = Scored {
            item: Article {
                pmid: "123".to_string(),
                title: "T".to_string(),
                abstract_text: "A".to_string(),
            },
            score: 8,
            reason: "relevant".to_string(),
        };

        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["pmid"], "123");
        assert_eq!(value["abstract"], "A");
        assert_eq!(value["score"], 8);
    }

    #[test]
    fn command_envelope_round_trips() {
        let command = Command::StartResearch {
            topic: "gut microbiota".to_string(),
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["type"], "START_RESEARCH");
        assert_eq!(value["payload"]["topic"], "gut microbiota");

        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn replayable_excludes_page_bound_and_bookkeeping_commands() {
        assert!(Command::SynthesizeReport.replayable());
        assert!(!Command::ScrapeOne {
            pmid: "1".to_string()
        }
        .replayable());
        assert!(!Command::Reset.replayable());
    }

    #[test]
    fn stage_uses_wire_naming() {
        assert_eq!(
            serde_json::to_value(Stage::Screening).unwrap(),
            serde_json::json!("SCREENING")
        );
    }
}
