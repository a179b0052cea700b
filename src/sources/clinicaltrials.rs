//! ClinicalTrials.gov client over the v2 studies API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClinicalTrialsConfig;
use crate::sources::SourceClient;
use crate::types::{AppError, ClinicalTrial, Result};

const DEFAULT_API_BASE: &str = "https://clinicaltrials.gov";

pub struct ClinicalTrialsClient {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Study>,
}

#[derive(Debug, Deserialize)]
struct Study {
    #[serde(rename = "protocolSection")]
    protocol_section: Option<ProtocolSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ProtocolSection {
    #[serde(rename = "identificationModule", default)]
    identification: IdentificationModule,
    #[serde(rename = "statusModule", default)]
    status: StatusModule,
    #[serde(rename = "descriptionModule", default)]
    description: DescriptionModule,
    #[serde(rename = "conditionsModule", default)]
    conditions: ConditionsModule,
    #[serde(rename = "armsInterventionsModule", default)]
    arms_interventions: ArmsInterventionsModule,
}

#[derive(Debug, Deserialize, Default)]
struct IdentificationModule {
    #[serde(rename = "nctId", default)]
    nct_id: String,
    #[serde(rename = "briefTitle", default)]
    brief_title: String,
}

#[derive(Debug, Deserialize, Default)]
struct StatusModule {
    #[serde(rename = "overallStatus", default)]
    overall_status: String,
}

#[derive(Debug, Deserialize, Default)]
struct DescriptionModule {
    #[serde(rename = "briefSummary", default)]
    brief_summary: String,
}

#[derive(Debug, Deserialize, Default)]
struct ConditionsModule {
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ArmsInterventionsModule {
    #[serde(default)]
    interventions: Vec<Intervention>,
}

#[derive(Debug, Deserialize)]
struct Intervention {
    #[serde(default)]
    name: String,
}

impl ClinicalTrialsClient {
    pub fn new(_config: &ClinicalTrialsConfig) -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string())
    }

    /// Override the endpoint, used by tests against a local mock server.
    pub fn with_api_base(api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
        }
    }
}

impl From<Study> for ClinicalTrial {
    fn from(study: Study) -> Self {
        let section = study.protocol_section.unwrap_or_default();
        let nct_id = section.identification.nct_id;
        let url = format!("https://clinicaltrials.gov/study/{nct_id}");
        ClinicalTrial {
            nct_id,
            title: section.identification.brief_title,
            status: section.status.overall_status,
            summary: section.description.brief_summary,
            conditions: section.conditions.conditions,
            interventions: section
                .arms_interventions
                .interventions
                .into_iter()
                .map(|i| i.name)
                .collect(),
            url,
        }
    }
}

#[async_trait]
impl SourceClient for ClinicalTrialsClient {
    type Item = ClinicalTrial;

    fn label(&self) -> &'static str {
        "ClinicalTrials.gov"
    }

    fn query_grammar(&self) -> &'static str {
        "ClinicalTrials.gov condition/intervention terms with AND/OR"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ClinicalTrial>> {
        let url = format!("{}/api/v2/studies", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query.term", query),
                ("pageSize", &limit.to_string()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Source(format!("ClinicalTrials.gov request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Source(format!("ClinicalTrials.gov request failed: {e}")))?;

        let parsed: StudiesResponse = response
            .json()
            .await
            .map_err(|e| AppError::Source(format!("ClinicalTrials.gov decode failed: {e}")))?;

        Ok(parsed
            .studies
            .into_iter()
            .map(ClinicalTrial::from)
            .filter(|t| !t.nct_id.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn maps_v2_study_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/studies"))
            .and(query_param("pageSize", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "studies": [{
                    "protocolSection": {
                        "identificationModule": {
                            "nctId": "NCT05551234",
                            "briefTitle": "Probiotics in IBS"
                        },
                        "statusModule": { "overallStatus": "RECRUITING" },
                        "descriptionModule": { "briefSummary": "A randomized trial." },
                        "conditionsModule": { "conditions": ["Irritable Bowel Syndrome"] },
                        "armsInterventionsModule": {
                            "interventions": [{ "name": "Lactobacillus blend" }]
                        }
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = ClinicalTrialsClient::with_api_base(server.uri());
        let trials = client.search("probiotics AND IBS", 20).await.unwrap();
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].nct_id, "NCT05551234");
        assert_eq!(trials[0].status, "RECRUITING");
        assert_eq!(trials[0].interventions, vec!["Lactobacillus blend"]);
        assert_eq!(
            trials[0].url,
            "https://clinicaltrials.gov/study/NCT05551234"
        );
    }

    #[tokio::test]
    async fn partial_records_fill_with_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/studies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "studies": [
                    { "protocolSection": { "identificationModule": { "nctId": "NCT1" } } },
                    { "protocolSection": {} }
                ]
            })))
            .mount(&server)
            .await;

        let client = ClinicalTrialsClient::with_api_base(server.uri());
        let trials = client.search("anything", 20).await.unwrap();
        // the record without an NCT id is dropped
        assert_eq!(trials.len(), 1);
        assert!(trials[0].summary.is_empty());
    }
}
