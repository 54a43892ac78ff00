use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::json;
use tracing::debug;

use veritas_core::config::WebSearchConfig;
use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::WebSearch;
use veritas_core::types::SearchHit;

use crate::html::decode_entities;

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Build the provider named in `[web_search]`.
pub fn create_search_provider(config: &WebSearchConfig) -> Result<Box<dyn WebSearch>> {
    match config.provider.as_str() {
        "duckduckgo" | "ddg" => Ok(Box::new(DuckDuckGoSearch::new(&config.region))),
        "tavily" => {
            let key = config.api_key.as_deref().ok_or_else(|| {
                VeritasError::Config("web_search.api_key is required for tavily".into())
            })?;
            Ok(Box::new(TavilySearch::new(key)))
        }
        other => Err(VeritasError::Config(format!(
            "unknown web_search.provider: {}",
            other
        ))),
    }
}

/// Keyless search through DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    region: String,
    http: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            http: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; ResearchAssistant/1.0)")
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl WebSearch for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn search(&self, query: &str, max_results: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            debug!(query = %query, region = %self.region, "DuckDuckGo search");

            let resp = self
                .http
                .post(DUCKDUCKGO_HTML_URL)
                .form(&[("q", query.as_str()), ("kl", self.region.as_str())])
                .send()
                .await
                .map_err(|e| {
                    VeritasError::Search(format!("DuckDuckGo search failed for '{}': {}", query, e))
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(VeritasError::Search(format!(
                    "DuckDuckGo search failed for '{}': HTTP {}",
                    query,
                    status.as_u16()
                )));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| VeritasError::Search(e.to_string()))?;

            let mut hits = parse_duckduckgo_results(&body);
            hits.truncate(max_results);
            Ok(hits)
        })
    }
}

fn anchor_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)<a\b([^>]*)>(.*?)</a>"#).unwrap())
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href\s*=\s*"([^"]*)""#).unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn clean_fragment(fragment: &str) -> String {
    let text = decode_entities(&tag_re().replace_all(fragment, ""));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve DuckDuckGo's `/l/?uddg=` redirect links to the target URL.
pub fn resolve_result_url(href: &str) -> Option<String> {
    let href = decode_entities(href);
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return urlencoding::decode(encoded).ok().map(|u| u.into_owned());
    }
    let href = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    };
    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href)
    } else {
        None
    }
}

/// Pull result links and snippets out of a DuckDuckGo HTML results page.
pub fn parse_duckduckgo_results(html: &str) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::new();

    for caps in anchor_re().captures_iter(html) {
        let attrs = &caps[1];
        if attrs.contains("result__a") {
            let Some(url) = href_re()
                .captures(attrs)
                .and_then(|h| resolve_result_url(&h[1]))
            else {
                continue;
            };
            // Sponsored results point back into duckduckgo.com
            if url.contains("duckduckgo.com/y.js") {
                continue;
            }
            hits.push(SearchHit {
                title: clean_fragment(&caps[2]),
                url,
                snippet: String::new(),
            });
        } else if attrs.contains("result__snippet") {
            if let Some(last) = hits.last_mut() {
                if last.snippet.is_empty() {
                    last.snippet = clean_fragment(&caps[2]);
                }
            }
        }
    }

    hits
}

/// Tavily search API.
pub struct TavilySearch {
    api_key: String,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

/// Hits from a Tavily JSON response body.
pub fn parse_tavily_results(body: &serde_json::Value) -> Vec<SearchHit> {
    body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let url = r["url"].as_str()?;
                    Some(SearchHit {
                        title: r["title"].as_str().unwrap_or("").to_string(),
                        url: url.to_string(),
                        snippet: r["content"].as_str().unwrap_or("").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str, max_results: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            debug!(query = %query, "Tavily search");

            let resp = self
                .http
                .post(TAVILY_URL)
                .json(&json!({
                    "api_key": self.api_key,
                    "query": query,
                    "max_results": max_results,
                }))
                .send()
                .await
                .map_err(|e| VeritasError::Search(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(VeritasError::Search(format!(
                    "Tavily HTTP {}: {}",
                    status.as_u16(),
                    text
                )));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| VeritasError::Search(e.to_string()))?;

            let mut hits = parse_tavily_results(&body);
            hits.truncate(max_results);
            Ok(hits)
        })
    }
}
