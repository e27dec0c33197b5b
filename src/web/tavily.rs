//! Tavily 검색 API 프로바이더
//!
//! ref: https://docs.tavily.com/documentation/api-reference/endpoint/search

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{WebResult, WebSearchProvider};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// API 키 환경변수
pub const TAVILY_API_KEY_VAR: &str = "TAVILY_API_KEY";

/// Tavily 검색 프로바이더
#[derive(Debug)]
pub struct TavilySearch {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            endpoint: TAVILY_SEARCH_URL.to_string(),
        })
    }

    /// `TAVILY_API_KEY`에서 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(TAVILY_API_KEY_VAR)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("{} not set", TAVILY_API_KEY_VAR))?;
        Self::new(api_key)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
}

impl From<TavilyResult> for WebResult {
    fn from(result: TavilyResult) -> Self {
        Self {
            title: result.title,
            url: result.url,
            snippet: result.content,
            content: result.raw_content.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[async_trait]
impl WebSearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>> {
        let request = SearchRequest {
            query,
            max_results: num_results,
            include_raw_content: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send Tavily request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Tavily response")?;

        if !status.is_success() {
            anyhow::bail!("Tavily API error ({}): {}", status, body);
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).context("Failed to parse Tavily response")?;

        Ok(parsed.results.into_iter().map(WebResult::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "query": "riverdale",
            "results": [
                {"title": "Riverdale", "url": "https://a.example", "content": "Small town", "raw_content": "Full page", "score": 0.9},
                {"title": "Other", "url": "https://b.example", "content": "Snippet only", "raw_content": null}
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let results: Vec<WebResult> = parsed.results.into_iter().map(WebResult::from).collect();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].snippet, "Small town");
        assert_eq!(results[0].content.as_deref(), Some("Full page"));
        assert!(results[1].content.is_none());
    }

    #[test]
    fn test_request_shape() {
        let request = SearchRequest {
            query: "harbor",
            max_results: 5,
            include_raw_content: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["query"], "harbor");
        assert_eq!(value["max_results"], 5);
    }
}
