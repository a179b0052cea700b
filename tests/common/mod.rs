//! Shared stubs for pipeline integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use scrivener::gather::PageScraper;
use scrivener::llm::{JudgeClient, ResponseFormat};
use scrivener::session::{MemoryStore, SessionStore};
use scrivener::sources::{SourceClient, SourceItem};
use scrivener::types::{AppError, Article, ClinicalTrial, Result, WebResult};
use scrivener::Orchestrator;

/// Judge stub that routes on prompt content.
///
/// The three screening pipelines run concurrently, so responses cannot be a
/// simple queue; each rule fires when all of its substrings appear in the
/// prompt and the first matching rule wins.
pub struct MatchJudge {
    rules: Vec<(Vec<&'static str>, String)>,
}

impl MatchJudge {
    pub fn new(rules: Vec<(Vec<&'static str>, &str)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(needles, response)| (needles, response.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl JudgeClient for MatchJudge {
    async fn complete(&self, prompt: &str, _format: ResponseFormat) -> Result<String> {
        self.rules
            .iter()
            .find(|(needles, _)| needles.iter().all(|n| prompt.contains(n)))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| AppError::Judge(format!("no stub rule matches prompt: {prompt:.80}")))
    }

    fn model_name(&self) -> &str {
        "match-judge"
    }
}

/// Source stub returning fixed broad results and one fixed supplemental pool.
pub struct StubSource<T> {
    label: &'static str,
    pub broad: Vec<T>,
    pub supplemental: Vec<T>,
}

impl<T> StubSource<T> {
    pub fn new(label: &'static str, broad: Vec<T>) -> Self {
        Self {
            label,
            broad,
            supplemental: Vec::new(),
        }
    }

    pub fn with_supplemental(mut self, supplemental: Vec<T>) -> Self {
        self.supplemental = supplemental;
        self
    }
}

#[async_trait]
impl<T: SourceItem> SourceClient for StubSource<T> {
    type Item = T;

    fn label(&self) -> &'static str {
        self.label
    }

    fn query_grammar(&self) -> &'static str {
        "stub queries"
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<T>> {
        if query.contains("supplemental") {
            return Ok(self.supplemental.clone());
        }
        Ok(self.broad.clone())
    }
}

/// Scraper stub: named PMIDs fail, everything else returns canned text.
pub struct StubScraper {
    pub texts: HashMap<String, String>,
    pub failing: Vec<String>,
}

impl StubScraper {
    pub fn new() -> Self {
        Self {
            texts: HashMap::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_text(mut self, pmid: &str, text: &str) -> Self {
        self.texts.insert(pmid.to_string(), text.to_string());
        self
    }

    pub fn failing_on(mut self, pmid: &str) -> Self {
        self.failing.push(pmid.to_string());
        self
    }
}

#[async_trait]
impl PageScraper for StubScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        if self.failing.iter().any(|pmid| url.contains(pmid)) {
            return Err(AppError::Scrape(format!("paywalled page at {url}")));
        }
        let text = self
            .texts
            .iter()
            .find(|(pmid, _)| url.contains(pmid.as_str()))
            .map(|(_, text)| text.clone());
        Ok(text.unwrap_or_else(|| "generic full text".to_string()))
    }
}

pub fn article(pmid: &str, title: &str) -> Article {
    Article {
        pmid: pmid.to_string(),
        title: title.to_string(),
        abstract_text: format!("Abstract of {title}."),
    }
}

pub fn trial(nct_id: &str, title: &str) -> ClinicalTrial {
    ClinicalTrial {
        nct_id: nct_id.to_string(),
        title: title.to_string(),
        status: "RECRUITING".to_string(),
        summary: format!("Summary of {title}."),
        conditions: vec!["Condition".to_string()],
        interventions: vec!["Intervention".to_string()],
        url: format!("https://clinicaltrials.gov/study/{nct_id}"),
    }
}

pub fn web_hit(url: &str, title: &str) -> WebResult {
    WebResult {
        url: url.to_string(),
        title: title.to_string(),
        snippet: format!("Snippet of {title}."),
    }
}

/// Orchestrator over a memory store with explicit stub dependencies.
pub async fn orchestrator_with(
    judge: MatchJudge,
    literature: StubSource<Article>,
    trials: StubSource<ClinicalTrial>,
    web: StubSource<WebResult>,
    scraper: StubScraper,
) -> (Arc<SessionStore>, Orchestrator) {
    let store = Arc::new(
        SessionStore::open(Box::new(MemoryStore))
            .await
            .expect("memory store"),
    );
    let judge: Arc<dyn JudgeClient> = Arc::new(judge);
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&judge),
        judge,
        Arc::new(literature),
        Arc::new(trials),
        Arc::new(web),
        Arc::new(scraper),
    );
    (store, orchestrator)
}
