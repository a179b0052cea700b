//! CLI for the scrivener pipeline.
//!
//! Command parsing via clap; colored terminal output via owo-colors. Each
//! subcommand drives the orchestrator through the same typed commands the
//! library exposes.

pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::session::{JsonFileStore, SessionStore};
use crate::types::{AppError, Command, ResearchSession, Result, Scored};
use output::Output;

/// scrivener - multi-source literature review pipeline
#[derive(Parser, Debug)]
#[command(
    name = "scrivener",
    version,
    about = "Multi-source literature review pipeline",
    long_about = "Plans a literature review with an LLM, screens PubMed, ClinicalTrials.gov\n\
                  and the web concurrently, gathers full texts and synthesizes a cited report.",
    after_help = "EXAMPLES:\n    \
                  scrivener init                          # Write a sample scrivener.toml\n    \
                  scrivener new \"gut microbiome and mood\" # Draft a research plan\n    \
                  scrivener search <session>              # Run the three-source screen\n    \
                  scrivener gather <session> --top 5      # Fetch full texts for the top 5\n    \
                  scrivener report <session>              # Synthesize and print the report"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "scrivener.toml", global = true)]
    pub config: PathBuf,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a sample scrivener.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List all research sessions
    List,

    /// Show one session: plan, screened results, log
    Show {
        /// Session id (any unique prefix)
        session: String,

        /// Print the final report instead of the session summary
        #[arg(long)]
        report: bool,
    },

    /// Create a session and draft a research plan for a topic
    New {
        /// The research topic
        topic: String,
    },

    /// Refine the drafted plan with feedback
    Refine {
        /// Session id (any unique prefix)
        session: String,

        /// Feedback for the strategist
        feedback: String,
    },

    /// Run the three-source search and screening
    Search {
        /// Session id (any unique prefix)
        session: String,
    },

    /// Gather full texts for the top-scored articles
    Gather {
        /// Session id (any unique prefix)
        session: String,

        /// How many of the top-scored articles to fetch
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Synthesize the final report
    Report {
        /// Session id (any unique prefix)
        session: String,
    },

    /// Rename a session
    Rename {
        /// Session id (any unique prefix)
        session: String,

        /// The new name
        name: String,
    },

    /// Return a session to the idle stage, keeping only its identity
    Reset {
        /// Session id (any unique prefix)
        session: String,
    },

    /// Delete a session permanently
    Delete {
        /// Session id (any unique prefix)
        session: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Run the parsed command to completion.
pub async fn execute(cli: Cli) -> Result<()> {
    let out = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Commands::Init { force } = &cli.command {
        return init_config(&cli.config, *force, &out);
    }

    let config = Config::load(&cli.config)?;
    let store = Arc::new(
        SessionStore::open(Box::new(JsonFileStore::new(&config.storage.path))).await?,
    );
    let orchestrator = Orchestrator::from_config(&config, Arc::clone(&store))?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::List => list_sessions(&store, &out),
        Commands::Show { session, report } => {
            let session = resolve_session(&store, &session)?;
            if report {
                show_report(&session, &out)
            } else {
                show_session(&session, &out)
            }
        }
        Commands::New { topic } => new_session(&orchestrator, &topic, &out).await,
        Commands::Refine { session, feedback } => {
            let session = resolve_session(&store, &session)?;
            orchestrator
                .handle(&session.id, Command::RefinePlan { feedback })
                .await?;
            let refreshed = resolve_session(&store, &session.id)?;
            print_plan(&refreshed, &out);
            Ok(())
        }
        Commands::Search { session } => {
            let session = resolve_session(&store, &session)?;
            run_search(&orchestrator, &session, &out).await
        }
        Commands::Gather { session, top } => {
            let session = resolve_session(&store, &session)?;
            run_gather(&orchestrator, &session, top, &out).await
        }
        Commands::Report { session } => {
            let session = resolve_session(&store, &session)?;
            orchestrator
                .handle(&session.id, Command::SynthesizeReport)
                .await?;
            let refreshed = resolve_session(&store, &session.id)?;
            show_report(&refreshed, &out)
        }
        Commands::Rename { session, name } => {
            let session = resolve_session(&store, &session)?;
            store.rename(&session.id, &name).await?;
            out.success(&format!("Renamed session to \"{name}\"."));
            Ok(())
        }
        Commands::Reset { session } => {
            let session = resolve_session(&store, &session)?;
            orchestrator.handle(&session.id, Command::Reset).await?;
            out.success(&format!("Session {} reset.", short_id(&session.id)));
            Ok(())
        }
        Commands::Delete { session, yes } => {
            let session = resolve_session(&store, &session)?;
            if !yes && !out.confirm(&format!("Delete session \"{}\"?", session.name)) {
                out.info("Aborted.");
                return Ok(());
            }
            store.delete(&session.id).await?;
            out.success(&format!("Deleted session \"{}\".", session.name));
            Ok(())
        }
    }
}

fn init_config(path: &PathBuf, force: bool, out: &Output) -> Result<()> {
    out.banner();
    if path.exists() && !force {
        return Err(AppError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    std::fs::write(path, Config::sample_toml())
        .map_err(|e| AppError::Config(format!("failed to write {}: {e}", path.display())))?;
    out.success(&format!("Wrote {}", path.display()));
    out.hint("Set the API keys named in the file, then run: scrivener new \"<topic>\"");
    Ok(())
}

/// Match a session by full id or unique prefix.
fn resolve_session(store: &SessionStore, id_or_prefix: &str) -> Result<ResearchSession> {
    if let Some(session) = store.get(id_or_prefix) {
        return Ok(session);
    }
    let matches: Vec<ResearchSession> = store
        .list()
        .into_iter()
        .filter(|s| s.id.starts_with(id_or_prefix))
        .collect();
    match matches.len() {
        1 => Ok(matches.into_iter().next().ok_or_else(|| {
            AppError::NotFound(format!("session {id_or_prefix}"))
        })?),
        0 => Err(AppError::NotFound(format!("session {id_or_prefix}"))),
        n => Err(AppError::NotFound(format!(
            "session prefix {id_or_prefix} is ambiguous ({n} matches)"
        ))),
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

fn list_sessions(store: &SessionStore, out: &Output) -> Result<()> {
    let sessions = store.list();
    if sessions.is_empty() {
        out.info("No sessions yet. Start one with: scrivener new \"<topic>\"");
        return Ok(());
    }
    out.header("Sessions");
    out.table_header(&["Id", "Stage", "Name"]);
    for session in sessions {
        out.table_row(&[
            short_id(&session.id),
            &format!("{:?}", session.stage),
            &session.name,
        ]);
    }
    out.newline();
    Ok(())
}

fn print_plan(session: &ResearchSession, out: &Output) {
    let Some(plan) = &session.research_plan else {
        out.warning("No research plan yet.");
        return;
    };
    out.header("Research plan");
    out.kv("Clarification", &plan.clarification);
    for sub_question in &plan.sub_questions {
        out.list_item(&format!(
            "{} ({})",
            sub_question.question,
            sub_question.keywords.join(", ")
        ));
    }
}

fn show_session(session: &ResearchSession, out: &Output) -> Result<()> {
    out.header(&session.name);
    out.kv("Id", &session.id);
    out.kv("Stage", &format!("{:?}", session.stage));
    out.kv("Topic", &session.topic);
    if let Some(error) = &session.error {
        out.error(error);
    }
    print_plan(session, out);

    if !session.scored_abstracts.is_empty() {
        out.header("Screened abstracts");
        for scored in &session.scored_abstracts {
            out.scored_item(scored.score, &scored.item.title, &scored.reason);
        }
    }
    if !session.clinical_trials.is_empty() {
        out.header("Clinical trials");
        for scored in &session.clinical_trials {
            out.scored_item(
                scored.score,
                &format!("{} ({})", scored.item.title, scored.item.nct_id),
                &scored.reason,
            );
        }
    }
    if !session.web_results.is_empty() {
        out.header("Web results");
        for scored in &session.web_results {
            out.scored_item(
                scored.score,
                &format!("{} — {}", scored.item.title, scored.item.url),
                &scored.reason,
            );
        }
    }

    if !session.log.is_empty() {
        out.header("Log");
        for line in session.log.iter().rev().take(10).rev() {
            out.list_item(line);
        }
    }
    out.newline();
    Ok(())
}

fn show_report(session: &ResearchSession, out: &Output) -> Result<()> {
    if session.final_report.is_empty() {
        out.warning("No report yet. Run: scrivener report <session>");
        return Ok(());
    }
    println!("{}", session.final_report);
    Ok(())
}

async fn new_session(orchestrator: &Orchestrator, topic: &str, out: &Output) -> Result<()> {
    let session = orchestrator.store().create(topic).await?;
    out.success(&format!(
        "Created session {} for \"{topic}\"",
        short_id(&session.id)
    ));
    out.info("Drafting research plan...");
    orchestrator
        .handle(
            &session.id,
            Command::StartResearch {
                topic: topic.to_string(),
            },
        )
        .await?;

    let refreshed = resolve_session(orchestrator.store(), &session.id)?;
    print_plan(&refreshed, out);
    out.hint(&format!(
        "Refine with: scrivener refine {} \"<feedback>\"  or run: scrivener search {}",
        short_id(&session.id),
        short_id(&session.id)
    ));
    Ok(())
}

async fn run_search(
    orchestrator: &Orchestrator,
    session: &ResearchSession,
    out: &Output,
) -> Result<()> {
    let plan = session
        .research_plan
        .clone()
        .ok_or_else(|| AppError::Precondition("draft a plan first: scrivener new".to_string()))?;

    out.info("Searching PubMed, ClinicalTrials.gov and the web...");
    orchestrator
        .handle(&session.id, Command::ExecuteSearch { plan })
        .await?;

    let refreshed = resolve_session(orchestrator.store(), &session.id)?;
    out.success(&format!(
        "Screened {} abstracts, {} trials, {} web results.",
        refreshed.scored_abstracts.len(),
        refreshed.clinical_trials.len(),
        refreshed.web_results.len()
    ));
    show_session(&refreshed, out)
}

async fn run_gather(
    orchestrator: &Orchestrator,
    session: &ResearchSession,
    top: usize,
    out: &Output,
) -> Result<()> {
    // scored_abstracts come back sorted by score; never fetch unreviewed items
    let selection: Vec<Scored<_>> = session
        .scored_abstracts
        .iter()
        .filter(|s| s.score > 0)
        .take(top)
        .cloned()
        .collect();
    if selection.is_empty() {
        return Err(AppError::Precondition(
            "no scored abstracts to gather; run the search first".to_string(),
        ));
    }

    orchestrator
        .handle(
            &session.id,
            Command::StartGathering {
                articles: selection.clone(),
            },
        )
        .await?;

    for scored in &selection {
        let pmid = scored.item.pmid.clone();
        out.info(&format!("Fetching PMID {pmid}: {}", scored.item.title));
        match orchestrator
            .handle(&session.id, Command::ScrapeOne { pmid: pmid.clone() })
            .await
        {
            Ok(()) => out.success(&format!("Gathered PMID {pmid}")),
            Err(e) => {
                out.warning(&format!("Skipping PMID {pmid}: {e}"));
                orchestrator
                    .handle(&session.id, Command::SkipOne { pmid })
                    .await?;
            }
        }
    }

    let refreshed = resolve_session(orchestrator.store(), &session.id)?;
    out.success(&format!(
        "Gathered {} of {} full texts.",
        refreshed.full_texts.len(),
        refreshed.articles_to_fetch.len()
    ));
    out.hint(&format!(
        "Synthesize with: scrivener report {}",
        short_id(&session.id)
    ));
    Ok(())
}
