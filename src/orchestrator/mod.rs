//! Command dispatch over the research session state machine.
//!
//! The orchestrator owns the judge clients, the three source clients and the
//! page scraper as trait objects, so every external capability can be
//! swapped out in tests. All state flows through the
//! [`SessionStore`](crate::session::SessionStore); the orchestrator itself
//! is stateless between commands.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::Config;
use crate::engine::{run_screening, EngineObserver, ScreeningLimits};
use crate::gather::{article_url, scrape_with_timeout, PageScraper};
use crate::llm::{parse_structured, JudgeClient, JudgeProvider, ResponseFormat};
use crate::prompts;
use crate::session::{reconcile_sub_question_ids, SessionStore};
use crate::sources::SourceClient;
use crate::synthesis::synthesize_report;
use crate::types::{
    AppError, Article, ClinicalTrial, Command, FullText, ResearchPlan, ResearchSession, Result,
    Scored, Stage, WebResult,
};

/// The three per-source queries produced by the query-planning call.
#[derive(Debug, Deserialize)]
struct QueryPlan {
    pubmed_query: String,
    clinical_trials_query: String,
    web_query: String,
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    fast_judge: Arc<dyn JudgeClient>,
    smart_judge: Arc<dyn JudgeClient>,
    literature: Arc<dyn SourceClient<Item = Article>>,
    trials: Arc<dyn SourceClient<Item = ClinicalTrial>>,
    web: Arc<dyn SourceClient<Item = WebResult>>,
    scraper: Arc<dyn PageScraper>,
    literature_limits: ScreeningLimits,
    trials_limits: ScreeningLimits,
    web_limits: ScreeningLimits,
}

impl Orchestrator {
    /// Wire up real clients from configuration.
    pub fn from_config(config: &Config, store: Arc<SessionStore>) -> Result<Self> {
        let fast = JudgeProvider::from_config(&config.llm, &config.llm.fast_model)?;
        let smart = JudgeProvider::from_config(&config.llm, &config.llm.smart_model)?;

        Ok(Self {
            store,
            fast_judge: Arc::from(fast.create_client()),
            smart_judge: Arc::from(smart.create_client()),
            literature: Arc::new(crate::sources::PubMedClient::new(&config.pubmed)),
            trials: Arc::new(crate::sources::ClinicalTrialsClient::new(
                &config.clinical_trials,
            )),
            web: Arc::new(crate::sources::WebSearchClient::from_config(
                &config.web_search,
            )?),
            scraper: Arc::new(crate::gather::DaedraScraper),
            literature_limits: ScreeningLimits {
                broad: config.pubmed.page_size,
                supplemental: config.pubmed.supplemental_page_size,
            },
            trials_limits: ScreeningLimits {
                broad: config.clinical_trials.page_size,
                supplemental: config.clinical_trials.page_size,
            },
            web_limits: ScreeningLimits {
                broad: config.web_search.page_size,
                supplemental: config.web_search.page_size,
            },
        })
    }

    /// Wire up explicit dependencies; the test seam.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<SessionStore>,
        fast_judge: Arc<dyn JudgeClient>,
        smart_judge: Arc<dyn JudgeClient>,
        literature: Arc<dyn SourceClient<Item = Article>>,
        trials: Arc<dyn SourceClient<Item = ClinicalTrial>>,
        web: Arc<dyn SourceClient<Item = WebResult>>,
        scraper: Arc<dyn PageScraper>,
    ) -> Self {
        let limits = ScreeningLimits {
            broad: 50,
            supplemental: 10,
        };
        Self {
            store,
            fast_judge,
            smart_judge,
            literature,
            trials,
            web,
            scraper,
            literature_limits: limits,
            trials_limits: ScreeningLimits {
                broad: 20,
                supplemental: 20,
            },
            web_limits: ScreeningLimits {
                broad: 10,
                supplemental: 10,
            },
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Dispatch one command against a session.
    ///
    /// On failure the error is recorded on the session record along with the
    /// command itself when it is replayable, then propagated to the caller.
    #[instrument(skip(self, command), fields(command = ?std::mem::discriminant(&command)))]
    pub async fn handle(&self, session_id: &str, command: Command) -> Result<()> {
        // A missing session has nowhere to record the failure.
        self.session(session_id)?;

        let result = self.dispatch(session_id, command.clone()).await;
        if let Err(e) = &result {
            let message = e.to_string();
            let replay = command.replayable().then_some(command);
            let _ = self
                .store
                .update(session_id, |s| {
                    s.loading = false;
                    s.loading_message = None;
                    s.error = Some(message.clone());
                    if let Some(failed) = replay {
                        s.last_failed_action = Some(failed);
                    }
                    s.push_log(format!("Error: {message}"));
                })
                .await;
        }
        result
    }

    async fn dispatch(&self, session_id: &str, command: Command) -> Result<()> {
        match command {
            Command::StartResearch { topic } => self.start_research(session_id, &topic).await,
            Command::RefinePlan { feedback } => self.refine_plan(session_id, &feedback).await,
            Command::ExecuteSearch { plan } => self.execute_search(session_id, plan).await,
            Command::StartGathering { articles } => {
                self.start_gathering(session_id, articles).await
            }
            Command::ScrapeOne { pmid } => self.scrape_one(session_id, &pmid).await,
            Command::SkipOne { pmid } => self.skip_one(session_id, &pmid).await,
            Command::SynthesizeReport => self.synthesize(session_id).await,
            Command::AppendLog { message } => self.store.log(session_id, message).await,
            Command::Reset => {
                self.store.update(session_id, ResearchSession::reset).await?;
                Ok(())
            }
        }
    }

    fn session(&self, session_id: &str) -> Result<ResearchSession> {
        self.store
            .get(session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
    }

    // ============= Planning =============

    async fn start_research(&self, session_id: &str, topic: &str) -> Result<()> {
        self.store
            .update(session_id, |s| {
                s.error = None;
                s.last_failed_action = None;
                s.loading = true;
                s.loading_message = Some("Drafting research plan...".to_string());
                s.push_log(format!("Drafting plan for \"{topic}\""));
            })
            .await?;

        let raw = self
            .fast_judge
            .complete(&prompts::research_strategist(topic), ResponseFormat::Json)
            .await?;
        let plan: ResearchPlan = parse_structured(&raw)?;
        let plan = reconcile_sub_question_ids(plan);

        info!(sub_questions = plan.sub_questions.len(), "plan drafted");
        self.store
            .update(session_id, |s| {
                s.research_plan = Some(plan);
                s.stage = Stage::Planning;
                s.loading = false;
                s.loading_message = None;
                s.push_log("Research plan drafted.");
            })
            .await?;
        Ok(())
    }

    async fn refine_plan(&self, session_id: &str, feedback: &str) -> Result<()> {
        let session = self.session(session_id)?;
        let current = session.research_plan.ok_or_else(|| {
            AppError::Precondition("no research plan to refine yet".to_string())
        })?;

        self.store
            .update(session_id, |s| {
                s.error = None;
                s.loading = true;
                s.loading_message = Some("Refining research plan...".to_string());
                s.push_log("Refining plan from feedback.");
            })
            .await?;

        let prompt = prompts::refine_plan(&session.topic, &current, feedback);
        let raw = self
            .fast_judge
            .complete(&prompt, ResponseFormat::Json)
            .await?;
        let plan: ResearchPlan = parse_structured(&raw)?;
        let plan = reconcile_sub_question_ids(plan);

        self.store
            .update(session_id, |s| {
                s.research_plan = Some(plan);
                s.stage = Stage::Planning;
                s.loading = false;
                s.loading_message = None;
                s.push_log("Research plan refined.");
            })
            .await?;
        Ok(())
    }

    // ============= Screening =============

    async fn execute_search(&self, session_id: &str, plan: ResearchPlan) -> Result<()> {
        let mut plan = reconcile_sub_question_ids(plan);

        self.store
            .update(session_id, |s| {
                s.error = None;
                s.stage = Stage::Screening;
                s.loading = true;
                s.loading_message = Some("Planning search queries...".to_string());
                s.research_plan = Some(plan.clone());
                s.raw_articles.clear();
                s.scored_abstracts.clear();
                s.clinical_trials.clear();
                s.web_results.clear();
                s.push_log("Search started.");
            })
            .await?;

        let raw = self
            .fast_judge
            .complete(&prompts::query_planner(&plan), ResponseFormat::Json)
            .await?;
        let queries: QueryPlan = parse_structured(&raw)?;
        plan.web_query = queries.web_query.clone();

        self.store
            .update(session_id, |s| {
                s.pubmed_query = Some(queries.pubmed_query.clone());
                s.clinical_trials_query = Some(queries.clinical_trials_query.clone());
                s.research_plan = Some(plan.clone());
                s.push_log(format!("PubMed query: {}", queries.pubmed_query));
                s.push_log(format!(
                    "ClinicalTrials.gov query: {}",
                    queries.clinical_trials_query
                ));
                s.push_log(format!("Web query: {}", queries.web_query));
            })
            .await?;

        let literature_observer = LiteratureObserver {
            store: self.store.as_ref(),
            session_id,
        };
        let trials_observer = TrialsObserver {
            store: self.store.as_ref(),
            session_id,
        };
        let web_observer = WebObserver {
            store: self.store.as_ref(),
            session_id,
        };

        // All three pipelines run to completion; there is no cancellation on
        // first failure.
        let (literature, trials, web) = tokio::join!(
            run_screening(
                self.literature.as_ref(),
                self.fast_judge.as_ref(),
                &plan,
                &queries.pubmed_query,
                self.literature_limits,
                &literature_observer,
            ),
            run_screening(
                self.trials.as_ref(),
                self.fast_judge.as_ref(),
                &plan,
                &queries.clinical_trials_query,
                self.trials_limits,
                &trials_observer,
            ),
            run_screening(
                self.web.as_ref(),
                self.fast_judge.as_ref(),
                &plan,
                &plan.web_query,
                self.web_limits,
                &web_observer,
            ),
        );

        // Persist whatever arrived before deciding the overall outcome, so a
        // partial failure still leaves the user the evidence that did land.
        if let Ok(pool) = &trials {
            let pool = pool.clone();
            self.store
                .update(session_id, |s| {
                    s.push_log(format!("Screened {} clinical trials.", pool.len()));
                    s.clinical_trials = pool;
                })
                .await?;
        }
        if let Ok(pool) = &web {
            let pool = pool.clone();
            self.store
                .update(session_id, |s| {
                    s.push_log(format!("Screened {} web results.", pool.len()));
                    s.web_results = pool;
                })
                .await?;
        }
        if let Ok(pool) = &literature {
            let pool = pool.clone();
            self.store
                .update(session_id, |s| {
                    s.push_log(format!("Screened {} abstracts.", pool.len()));
                    s.scored_abstracts = pool;
                    s.raw_articles.clear();
                })
                .await?;
        }

        let literature = literature?;
        trials?;
        web?;

        // Trials and web results may legitimately be empty; a literature
        // screen that found nothing leaves the session with nothing to
        // gather, so the search as a whole failed.
        if literature.is_empty() {
            return Err(AppError::Source(
                "no PubMed records found for any query; revise the plan and retry".to_string(),
            ));
        }

        self.store
            .update(session_id, |s| {
                s.loading = false;
                s.loading_message = None;
                s.push_log("Screening complete.");
            })
            .await?;
        Ok(())
    }

    // ============= Gathering =============

    async fn start_gathering(
        &self,
        session_id: &str,
        articles: Vec<Scored<Article>>,
    ) -> Result<()> {
        if articles.is_empty() {
            return Err(AppError::Precondition(
                "no articles selected for gathering".to_string(),
            ));
        }
        let session = self.session(session_id)?;
        if session.stage != Stage::Screening {
            return Err(AppError::Precondition(format!(
                "gathering can only start from screening, not {:?}",
                session.stage
            )));
        }

        let count = articles.len();
        self.store
            .update(session_id, |s| {
                s.error = None;
                s.stage = Stage::Gathering;
                s.articles_to_fetch = articles;
                s.full_texts.clear();
                s.gathering_index = 0;
                s.push_log(format!("Gathering full texts for {count} articles."));
            })
            .await?;
        Ok(())
    }

    /// Expected current article at the gathering cursor, or why there is none.
    fn current_article(session: &ResearchSession, pmid: &str) -> Result<()> {
        if session.stage != Stage::Gathering {
            return Err(AppError::Precondition(format!(
                "not gathering (stage {:?})",
                session.stage
            )));
        }
        let current = session
            .articles_to_fetch
            .get(session.gathering_index)
            .ok_or_else(|| AppError::Precondition("gathering already complete".to_string()))?;
        if current.item.pmid != pmid {
            return Err(AppError::Precondition(format!(
                "cursor is at PMID {}, not {pmid}",
                current.item.pmid
            )));
        }
        Ok(())
    }

    async fn scrape_one(&self, session_id: &str, pmid: &str) -> Result<()> {
        let session = self.session(session_id)?;
        Self::current_article(&session, pmid)?;

        self.store
            .update(session_id, |s| {
                s.loading = true;
                s.loading_message = Some(format!("Fetching full text for PMID {pmid}..."));
            })
            .await?;

        let text = scrape_with_timeout(self.scraper.as_ref(), &article_url(pmid)).await?;

        let pmid = pmid.to_string();
        self.store
            .update(session_id, |s| {
                s.push_log(format!("Gathered full text for PMID {pmid}."));
                s.full_texts.push(FullText { pmid, text });
                s.gathering_index += 1;
                s.loading = false;
                s.loading_message = None;
                if s.gathering_index == s.articles_to_fetch.len() {
                    s.push_log("Gathering complete.");
                }
            })
            .await?;
        Ok(())
    }

    async fn skip_one(&self, session_id: &str, pmid: &str) -> Result<()> {
        let session = self.session(session_id)?;
        Self::current_article(&session, pmid)?;

        let pmid = pmid.to_string();
        self.store
            .update(session_id, |s| {
                s.gathering_index += 1;
                s.push_log(format!("Skipped PMID {pmid}."));
                if s.gathering_index == s.articles_to_fetch.len() {
                    s.push_log("Gathering complete.");
                }
            })
            .await?;
        Ok(())
    }

    // ============= Synthesis =============

    async fn synthesize(&self, session_id: &str) -> Result<()> {
        let session = self.session(session_id)?;
        let plan = session.research_plan.clone().ok_or_else(|| {
            AppError::Precondition("no research plan; nothing to synthesize against".to_string())
        })?;
        if session.full_texts.is_empty() {
            return Err(AppError::Precondition(
                "no full texts gathered; nothing to synthesize from".to_string(),
            ));
        }
        let prior_stage = session.stage;

        self.store
            .update(session_id, |s| {
                s.error = None;
                s.stage = Stage::Synthesizing;
                s.loading = true;
                s.loading_message = Some("Synthesizing report...".to_string());
                s.push_log("Synthesis started.");
            })
            .await?;

        let report = match synthesize_report(
            self.smart_judge.as_ref(),
            &plan,
            &session.full_texts,
            &session.clinical_trials,
            &session.web_results,
        )
        .await
        {
            Ok(report) => report,
            // A failed synthesis keeps the gathered texts and puts the
            // session back where it was for retry.
            Err(e) => {
                self.store
                    .update(session_id, |s| s.stage = prior_stage)
                    .await?;
                return Err(e);
            }
        };

        self.store
            .update(session_id, |s| {
                s.final_report = report;
                s.stage = Stage::Done;
                s.loading = false;
                s.loading_message = None;
                s.push_log("Report ready.");
            })
            .await?;
        Ok(())
    }
}

// ============= Engine observers =============
//
// One observer per pipeline; each writes only its own session fields, so the
// three concurrent screens never clobber each other. Progress writes are
// best-effort.

struct LiteratureObserver<'a> {
    store: &'a SessionStore,
    session_id: &'a str,
}

#[async_trait::async_trait]
impl EngineObserver<Article> for LiteratureObserver<'_> {
    async fn raw_results(&self, items: &[Article]) {
        let items = items.to_vec();
        let _ = self
            .store
            .update(self.session_id, |s| s.raw_articles = items)
            .await;
    }

    async fn supplemental_query(&self, query: &str) {
        let query = query.to_string();
        let _ = self
            .store
            .update(self.session_id, |s| {
                s.pubmed_query = Some(match s.pubmed_query.take() {
                    Some(existing) => format!("{existing}; {query}"),
                    None => query.clone(),
                });
            })
            .await;
    }

    async fn progress(&self, message: &str) {
        let message = message.to_string();
        let _ = self
            .store
            .update(self.session_id, |s| {
                s.loading_message = Some(message.clone());
                s.push_log(message);
            })
            .await;
    }
}

struct TrialsObserver<'a> {
    store: &'a SessionStore,
    session_id: &'a str,
}

#[async_trait::async_trait]
impl EngineObserver<ClinicalTrial> for TrialsObserver<'_> {
    async fn raw_results(&self, _items: &[ClinicalTrial]) {}

    async fn supplemental_query(&self, query: &str) {
        let query = query.to_string();
        let _ = self
            .store
            .update(self.session_id, |s| {
                s.clinical_trials_query = Some(match s.clinical_trials_query.take() {
                    Some(existing) => format!("{existing}; {query}"),
                    None => query.clone(),
                });
            })
            .await;
    }

    async fn progress(&self, message: &str) {
        let _ = self.store.log(self.session_id, message).await;
    }
}

struct WebObserver<'a> {
    store: &'a SessionStore,
    session_id: &'a str,
}

#[async_trait::async_trait]
impl EngineObserver<WebResult> for WebObserver<'_> {
    async fn raw_results(&self, _items: &[WebResult]) {}

    async fn supplemental_query(&self, _query: &str) {}

    async fn progress(&self, message: &str) {
        let _ = self.store.log(self.session_id, message).await;
    }
}
