//! Generic screening engine: broad search, self-critique, supplemental
//! searches, merge, relevance scoring.
//!
//! The engine is generic over [`SourceClient`] and runs once per source;
//! the three instantiations execute concurrently and report progress
//! through their own [`EngineObserver`] so each writes disjoint session
//! fields.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm::{parse_structured, JudgeClient, ResponseFormat};
use crate::prompts;
use crate::sources::{SourceClient, SourceItem};
use crate::types::{ResearchPlan, Result, Scored};

/// Reason attached to items the judge left out of its review.
const UNREVIEWED_REASON: &str = "Not reviewed by the model.";

/// Result-set sizes for the two search phases.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningLimits {
    pub broad: usize,
    pub supplemental: usize,
}

/// Progress sink for one engine run.
///
/// Implementations write to the session record; the engine itself never
/// touches session state.
#[async_trait]
pub trait EngineObserver<T: SourceItem>: Send + Sync {
    /// The broad search finished; `items` is the pre-score working set.
    async fn raw_results(&self, items: &[T]);

    /// A supplemental query is about to run.
    async fn supplemental_query(&self, query: &str);

    /// Human-readable progress line.
    async fn progress(&self, message: &str);
}

/// Observer that discards everything.
pub struct NoopObserver;

#[async_trait]
impl<T: SourceItem> EngineObserver<T> for NoopObserver {
    async fn raw_results(&self, _items: &[T]) {}
    async fn supplemental_query(&self, _query: &str) {}
    async fn progress(&self, _message: &str) {}
}

#[derive(Debug, Deserialize)]
struct CritiqueResponse {
    #[serde(default)]
    new_queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    #[serde(default)]
    reviews: Vec<Review>,
}

#[derive(Debug, Deserialize)]
struct Review {
    id: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    reason: String,
}

/// Run the full screening pipeline for one source.
///
/// An empty broad result is not an error: it yields an empty scored list
/// and the critique step is skipped. A failed supplemental search degrades
/// the result set instead of failing the run; critique and scoring calls
/// are fatal on failure, as is any unparseable judge response.
pub async fn run_screening<S, O>(
    source: &S,
    judge: &dyn JudgeClient,
    plan: &ResearchPlan,
    query: &str,
    limits: ScreeningLimits,
    observer: &O,
) -> Result<Vec<Scored<S::Item>>>
where
    S: SourceClient + ?Sized,
    O: EngineObserver<S::Item>,
{
    let label = source.label();

    observer
        .progress(&format!("Searching {label}: {query}"))
        .await;
    let mut working = source.search(query, limits.broad).await?;
    let mut known: HashSet<String> = working.iter().map(|i| i.id().to_string()).collect();
    debug!(source = label, count = working.len(), "broad search done");
    observer.raw_results(&working).await;

    // Nothing found means nothing to critique against; the other sources
    // may still contribute.
    if working.is_empty() {
        observer
            .progress(&format!("No {label} results for the broad query"))
            .await;
        return Ok(Vec::new());
    }

    // Self-critique: ask for gap-filling queries against the plan.
    observer
        .progress(&format!("Reviewing {label} coverage"))
        .await;
    let new_queries = critique(source, judge, plan, &working).await?;
    for supplemental in new_queries {
        observer.supplemental_query(&supplemental).await;
        observer
            .progress(&format!("Supplemental {label} search: {supplemental}"))
            .await;
        match source
            .supplemental_search(&supplemental, &known, limits.supplemental)
            .await
        {
            Ok(items) => {
                for item in items {
                    if known.insert(item.id().to_string()) {
                        working.push(item);
                    }
                }
            }
            Err(e) => {
                warn!(source = label, error = %e, "supplemental search failed");
                observer
                    .progress(&format!("Supplemental {label} search failed: {e}"))
                    .await;
            }
        }
    }

    observer
        .progress(&format!("Scoring {} {label} results", working.len()))
        .await;
    score(judge, plan, label, working).await
}

async fn critique<S: SourceClient + ?Sized>(
    source: &S,
    judge: &dyn JudgeClient,
    plan: &ResearchPlan,
    working: &[S::Item],
) -> Result<Vec<String>> {
    let blocks = render_blocks(working);
    let prompt = prompts::search_refiner(plan, &blocks, source.label(), source.query_grammar());
    let raw = judge.complete(&prompt, ResponseFormat::Json).await?;
    let parsed: CritiqueResponse = parse_structured(&raw)?;
    Ok(parsed.new_queries)
}

/// Score the merged working set. Every input item comes back exactly once:
/// reviewed items carry the judge's clamped score, omitted items carry 0
/// and a placeholder reason. Equal scores keep their input order.
async fn score<T: SourceItem>(
    judge: &dyn JudgeClient,
    plan: &ResearchPlan,
    label: &str,
    working: Vec<T>,
) -> Result<Vec<Scored<T>>> {
    let blocks = render_blocks(&working);
    let prompt = prompts::relevance_reviewer(plan, &blocks, label);
    let raw = judge.complete(&prompt, ResponseFormat::Json).await?;
    let parsed: ReviewResponse = parse_structured(&raw)?;

    let mut by_id: HashMap<String, Review> = parsed
        .reviews
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut scored: Vec<Scored<T>> = working
        .into_iter()
        .map(|item| match by_id.remove(item.id()) {
            Some(review) => Scored {
                item,
                score: review.score.clamp(1, 10) as u8,
                reason: review.reason,
            },
            None => Scored {
                item,
                score: 0,
                reason: UNREVIEWED_REASON.to_string(),
            },
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(scored)
}

fn render_blocks<T: SourceItem>(items: &[T]) -> String {
    items
        .iter()
        .map(SourceItem::prompt_block)
        .collect::<Vec<_>>()
        .join("\n")
}
