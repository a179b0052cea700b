//! PubMed client over the NCBI E-utilities API.
//!
//! Searching is two-phase: `esearch` returns PMIDs as JSON, `efetch` returns
//! abstracts as XML. Supplemental searches deduplicate between the phases so
//! known records are never re-fetched.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use crate::config::PubmedConfig;
use crate::sources::SourceClient;
use crate::types::{AppError, Article, Result};

const DEFAULT_API_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Spacing between unkeyed requests, keeping under the NCBI 3 req/s limit.
const UNKEYED_DELAY: Duration = Duration::from_millis(350);

pub struct PubMedClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedClient {
    pub fn new(config: &PubmedConfig) -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string(), config.api_key())
    }

    /// Override the endpoint, used by tests against a local mock server.
    pub fn with_api_base(api_base: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            api_key,
        }
    }

    /// Without an NCBI key, space consecutive requests out.
    async fn throttle(&self) {
        if self.api_key.is_none() {
            tokio::time::sleep(UNKEYED_DELAY).await;
        }
    }

    async fn esearch(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("term".to_string(), query.to_string()),
            ("retmax".to_string(), limit.to_string()),
            ("retmode".to_string(), "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }

        let url = format!("{}/esearch.fcgi", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Source(format!("PubMed esearch failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Source(format!("PubMed esearch failed: {e}")))?;

        let parsed: ESearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Source(format!("PubMed esearch decode failed: {e}")))?;
        Ok(parsed.esearchresult.idlist)
    }

    async fn efetch(&self, pmids: &[String]) -> Result<Vec<Article>> {
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("id".to_string(), pmids.join(",")),
            ("retmode".to_string(), "xml".to_string()),
            ("rettype".to_string(), "abstract".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }

        let url = format!("{}/efetch.fcgi", self.api_base);
        let xml = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Source(format!("PubMed efetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Source(format!("PubMed efetch failed: {e}")))?
            .text()
            .await
            .map_err(|e| AppError::Source(format!("PubMed efetch read failed: {e}")))?;

        parse_efetch_xml(&xml)
    }
}

/// Streaming parse of an efetch abstract document.
///
/// Only the first `<PMID>` inside each `<PubmedArticle>` is taken; later
/// occurrences (reference lists, corrections) are ignored. Multi-section
/// abstracts are joined into one text.
fn parse_efetch_xml(xml: &str) -> Result<Vec<Article>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut pmid = String::new();
    let mut title = String::new();
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut current: Option<Field> = None;

    enum Field {
        Pmid,
        Title,
        AbstractText,
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    pmid.clear();
                    title.clear();
                    abstract_parts.clear();
                }
                b"PMID" if pmid.is_empty() => current = Some(Field::Pmid),
                b"ArticleTitle" => current = Some(Field::Title),
                b"AbstractText" => {
                    abstract_parts.push(String::new());
                    current = Some(Field::AbstractText);
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::Source(format!("PubMed XML decode failed: {e}")))?;
                match current {
                    Some(Field::Pmid) => pmid.push_str(&text),
                    Some(Field::Title) => title.push_str(&text),
                    Some(Field::AbstractText) => {
                        if let Some(part) = abstract_parts.last_mut() {
                            part.push_str(&text);
                        }
                    }
                    None => {}
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"PMID" | b"ArticleTitle" | b"AbstractText" => current = None,
                b"PubmedArticle" => {
                    if !pmid.is_empty() {
                        let abstract_text = if abstract_parts.is_empty() {
                            "No abstract available.".to_string()
                        } else {
                            abstract_parts.join(" ")
                        };
                        articles.push(Article {
                            pmid: std::mem::take(&mut pmid),
                            title: std::mem::take(&mut title),
                            abstract_text,
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(AppError::Source(format!("PubMed XML parse failed: {e}"))),
            _ => {}
        }
    }

    Ok(articles)
}

#[async_trait]
impl SourceClient for PubMedClient {
    type Item = Article;

    fn label(&self) -> &'static str {
        "PubMed"
    }

    fn query_grammar(&self) -> &'static str {
        "PubMed boolean syntax with MeSH terms"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Article>> {
        let pmids = self.esearch(query, limit).await?;
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        self.throttle().await;
        self.efetch(&pmids).await
    }

    /// Dedup happens between the phases: abstracts are only fetched for
    /// PMIDs the working set does not already hold.
    async fn supplemental_search(
        &self,
        query: &str,
        known_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Article>> {
        self.throttle().await;
        let pmids = self.esearch(query, limit).await?;
        let novel: Vec<String> = pmids
            .into_iter()
            .filter(|id| !known_ids.contains(id))
            .collect();
        if novel.is_empty() {
            return Ok(Vec::new());
        }
        self.throttle().await;
        self.efetch(&novel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EFETCH_XML: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">11111111</PMID>
      <Article>
        <ArticleTitle>Gut microbiota and mood</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Context here.</AbstractText>
          <AbstractText Label="RESULTS">Findings here.</AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">22222222</PMID>
      <Article>
        <ArticleTitle>An editorial</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parses_multi_section_abstracts() {
        let articles = parse_efetch_xml(EFETCH_XML).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].pmid, "11111111");
        assert_eq!(articles[0].title, "Gut microbiota and mood");
        assert_eq!(articles[0].abstract_text, "Context here. Findings here.");
    }

    #[test]
    fn missing_abstract_gets_placeholder() {
        let articles = parse_efetch_xml(EFETCH_XML).unwrap();
        assert_eq!(articles[1].abstract_text, "No abstract available.");
    }

    #[tokio::test]
    async fn search_runs_both_phases() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .and(query_param("retmode", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "esearchresult": { "idlist": ["11111111", "22222222"] }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("id", "11111111,22222222"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH_XML))
            .mount(&server)
            .await;

        let client = PubMedClient::with_api_base(server.uri(), Some("key".to_string()));
        let articles = client.search("microbiome AND mood", 50).await.unwrap();
        assert_eq!(articles.len(), 2);
    }

    #[tokio::test]
    async fn supplemental_search_skips_known_pmids_before_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "esearchresult": { "idlist": ["11111111", "22222222"] }
            })))
            .mount(&server)
            .await;
        // efetch must only be asked for the novel id
        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("id", "22222222"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH_XML))
            .expect(1)
            .mount(&server)
            .await;

        let known: HashSet<String> = ["11111111".to_string()].into_iter().collect();
        let client = PubMedClient::with_api_base(server.uri(), Some("key".to_string()));
        client
            .supplemental_search("narrow query", &known, 10)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_id_list_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "esearchresult": { "idlist": [] }
            })))
            .mount(&server)
            .await;

        let client = PubMedClient::with_api_base(server.uri(), Some("key".to_string()));
        let articles = client.search("no hits", 50).await.unwrap();
        assert!(articles.is_empty());
    }
}
