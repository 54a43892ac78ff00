use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use veritas_core::config::ScraperConfig;
use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::Scraper;
use veritas_core::types::{ScrapeOptions, Source};

use crate::html::{extract_text, extract_title};

/// Fetches pages over HTTP and extracts their article text.
pub struct HttpScraper {
    http: reqwest::Client,
    min_content_chars: usize,
}

impl HttpScraper {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .build()
                .unwrap_or_default(),
            min_content_chars: config.min_content_chars,
        }
    }

    async fn fetch(&self, url: &str, options: ScrapeOptions) -> Result<String> {
        let scrape_err = |message: String| VeritasError::Scrape {
            url: url.to_string(),
            message,
        };

        let resp = self
            .http
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(|e| scrape_err(format!("Request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(scrape_err(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        resp.text()
            .await
            .map_err(|e| scrape_err(format!("Failed to read response body: {}", e)))
    }
}

/// Turn a fetched page into a [`Source`], rejecting pages with too little text.
pub fn extract_source(url: &str, html: &str, min_content_chars: usize) -> Result<Source> {
    let (content, method) = extract_text(html, min_content_chars);
    if content.trim().chars().count() < min_content_chars {
        return Err(VeritasError::Scrape {
            url: url.to_string(),
            message: format!(
                "Insufficient content extracted ({} chars)",
                content.trim().chars().count()
            ),
        });
    }

    let mut source = Source::new(url, extract_title(html), content);
    let domain = source.domain();
    let word_count = source.word_count();
    source.metadata.insert("domain".into(), json!(domain));
    source.metadata.insert("word_count".into(), json!(word_count));
    source
        .metadata
        .insert("extraction_method".into(), json!(method.as_str()));
    source.scraped_at = Some(Utc::now());
    Ok(source)
}

impl Scraper for HttpScraper {
    fn scrape(&self, url: &str, options: ScrapeOptions) -> BoxFuture<'_, Result<Source>> {
        let url = url.to_string();
        Box::pin(async move {
            let attempts = options.max_retries + 1;
            let mut last_error = None;

            for attempt in 1..=attempts {
                debug!(url = %url, attempt, "Scraping");
                let result = match self.fetch(&url, options).await {
                    Ok(html) => extract_source(&url, &html, self.min_content_chars),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(source) => return Ok(source),
                    Err(e) => {
                        if attempt < attempts {
                            warn!(url = %url, attempt, error = %e, "Scrape attempt failed, retrying");
                        }
                        last_error = Some(e);
                    }
                }
            }

            Err(VeritasError::Scrape {
                message: format!(
                    "failed after {} attempts: {}",
                    attempts,
                    last_error.map(|e| e.to_string()).unwrap_or_default()
                ),
                url,
            })
        })
    }
}
