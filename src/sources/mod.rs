//! Information-source clients and the traits the screening engine runs on.
//!
//! Each source (PubMed, ClinicalTrials.gov, web search) implements
//! [`SourceClient`] over its own item type; the engine stays generic and
//! identifies items only through [`SourceItem`].

use std::collections::HashSet;

use async_trait::async_trait;

use crate::types::{Article, ClinicalTrial, Result, WebResult};

pub mod clinicaltrials;
pub mod pubmed;
pub mod web;

pub use clinicaltrials::ClinicalTrialsClient;
pub use pubmed::PubMedClient;
pub use web::WebSearchClient;

/// A record a source can return, as the screening engine sees it.
pub trait SourceItem: Clone + Send + Sync + 'static {
    /// Source-native identifier (PMID, NCT number, URL). Used for
    /// deduplication and for matching judge reviews back to items.
    fn id(&self) -> &str;

    /// Render the item for inclusion in a judge prompt. The identifier is
    /// always carried in an `<id>` tag so review output stays uniform
    /// across sources.
    fn prompt_block(&self) -> String;
}

/// A searchable information source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    type Item: SourceItem;

    /// Human-readable source name, used in prompts and logs.
    fn label(&self) -> &'static str;

    /// One-line description of the source's query grammar, handed to the
    /// critique prompt so supplemental queries come back in the right shape.
    fn query_grammar(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Self::Item>>;

    /// Gap-filling search that skips already-known items.
    ///
    /// The default runs a plain search and filters afterwards; sources with
    /// a two-phase protocol can override to avoid fetching known records.
    async fn supplemental_search(
        &self,
        query: &str,
        known_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Self::Item>> {
        let items = self.search(query, limit).await?;
        Ok(items
            .into_iter()
            .filter(|item| !known_ids.contains(item.id()))
            .collect())
    }
}

impl SourceItem for Article {
    fn id(&self) -> &str {
        &self.pmid
    }

    fn prompt_block(&self) -> String {
        format!(
            "<article>\n  <id>{}</id>\n  <title>{}</title>\n  <abstract>{}</abstract>\n</article>",
            self.pmid, self.title, self.abstract_text
        )
    }
}

impl SourceItem for ClinicalTrial {
    fn id(&self) -> &str {
        &self.nct_id
    }

    fn prompt_block(&self) -> String {
        format!(
            "<trial>\n  <id>{}</id>\n  <title>{}</title>\n  <status>{}</status>\n  <conditions>{}</conditions>\n  <interventions>{}</interventions>\n  <summary>{}</summary>\n</trial>",
            self.nct_id,
            self.title,
            self.status,
            self.conditions.join("; "),
            self.interventions.join("; "),
            self.summary
        )
    }
}

impl SourceItem for WebResult {
    fn id(&self) -> &str {
        &self.url
    }

    fn prompt_block(&self) -> String {
        format!(
            "<webpage>\n  <id>{}</id>\n  <title>{}</title>\n  <snippet>{}</snippet>\n</webpage>",
            self.url, self.title, self.snippet
        )
    }
}
