//! Full-text gathering for selected articles.
//!
//! One article at a time: the orchestrator resolves the PubMed page URL for
//! the current cursor position and asks the scraper for readable text. A
//! hard time bound keeps a stuck page from wedging the whole session.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{AppError, Result};

/// Upper bound for a single page extraction.
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);

/// PubMed article page for a PMID.
pub fn article_url(pmid: &str) -> String {
    format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")
}

/// Extracts readable text from one web page.
#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String>;
}

/// Scraper backed by the `daedra` fetch tool (page to markdown).
pub struct DaedraScraper;

#[async_trait]
impl PageScraper for DaedraScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        let args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };
        let page = daedra::tools::fetch::fetch_page(&args)
            .await
            .map_err(|e| AppError::Scrape(format!("failed to fetch {url}: {e}")))?;
        if page.content.trim().is_empty() {
            return Err(AppError::Scrape(format!("no readable text at {url}")));
        }
        Ok(page.content)
    }
}

/// Run a scrape under the time bound.
pub async fn scrape_with_timeout(scraper: &dyn PageScraper, url: &str) -> Result<String> {
    tokio::time::timeout(SCRAPE_TIMEOUT, scraper.scrape(url))
        .await
        .map_err(|_| AppError::Timeout(format!("scrape of {url} exceeded 20s")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowScraper;

    #[async_trait]
    impl PageScraper for SlowScraper {
        async fn scrape(&self, _url: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("never".to_string())
        }
    }

    struct FixedScraper(&'static str);

    #[async_trait]
    impl PageScraper for FixedScraper {
        async fn scrape(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn pmid_maps_to_pubmed_page() {
        assert_eq!(article_url("12345"), "https://pubmed.ncbi.nlm.nih.gov/12345/");
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_scrape_times_out() {
        let result = scrape_with_timeout(&SlowScraper, "https://example.org").await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn fast_scrape_passes_through() {
        let text = scrape_with_timeout(&FixedScraper("body"), "https://example.org")
            .await
            .unwrap();
        assert_eq!(text, "body");
    }
}
