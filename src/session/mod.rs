//! Session lifecycle: creation, reset and plan-id reconciliation.
//!
//! The persistence side lives in [`store`]; this module owns the pure
//! mutations applied to a [`ResearchSession`] record.

pub mod store;

pub use store::{JsonFileStore, MemoryStore, SessionPersistence, SessionStore};

use chrono::{Local, Utc};
use uuid::Uuid;

use crate::types::{ResearchPlan, ResearchSession, Stage};

/// Maximum session name length derived from the topic.
const MAX_NAME_LEN: usize = 50;

impl ResearchSession {
    /// Create an empty session at stage IDLE, named after the topic.
    pub fn new(topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            name: truncate_name(&topic),
            created_at: Utc::now(),
            stage: Stage::Idle,
            topic,
            research_plan: None,
            pubmed_query: None,
            clinical_trials_query: None,
            raw_articles: Vec::new(),
            scored_abstracts: Vec::new(),
            clinical_trials: Vec::new(),
            web_results: Vec::new(),
            articles_to_fetch: Vec::new(),
            full_texts: Vec::new(),
            gathering_index: 0,
            final_report: String::new(),
            loading: false,
            loading_message: None,
            error: None,
            last_failed_action: None,
            log: Vec::new(),
        };
        session.push_log(format!("Session created: \"{}\"", session.topic));
        session
    }

    /// Return the session to stage IDLE, clearing all plan, result, gathering
    /// and report fields while preserving identity, name and topic.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.research_plan = None;
        self.pubmed_query = None;
        self.clinical_trials_query = None;
        self.raw_articles.clear();
        self.scored_abstracts.clear();
        self.clinical_trials.clear();
        self.web_results.clear();
        self.articles_to_fetch.clear();
        self.full_texts.clear();
        self.gathering_index = 0;
        self.final_report.clear();
        self.loading = false;
        self.loading_message = None;
        self.error = None;
        self.last_failed_action = None;
        self.push_log("Session reset.");
    }

    /// Append a timestamped entry to the audit trail.
    pub fn push_log(&mut self, message: impl AsRef<str>) {
        self.log.push(format!(
            "[{}] {}",
            Local::now().format("%H:%M:%S"),
            message.as_ref()
        ));
    }
}

fn truncate_name(topic: &str) -> String {
    if topic.chars().count() > MAX_NAME_LEN {
        let head: String = topic.chars().take(MAX_NAME_LEN - 3).collect();
        format!("{head}...")
    } else {
        topic.to_string()
    }
}

/// Enforce the sub-question id uniqueness invariant on a judge-produced plan.
///
/// Walks sub-questions in order, keeping an id only if it is non-empty and not
/// already seen in this pass; otherwise a fresh UUID is minted. This holds
/// regardless of how sloppy the judge was about the placeholder ids.
pub fn reconcile_sub_question_ids(mut plan: ResearchPlan) -> ResearchPlan {
    let mut seen = std::collections::HashSet::new();
    for sub_question in &mut plan.sub_questions {
        if sub_question.id.is_empty() || seen.contains(&sub_question.id) {
            sub_question.id = Uuid::new_v4().to_string();
        }
        seen.insert(sub_question.id.clone());
    }
    plan
}
