//! DuckDuckGo HTML 검색 프로바이더 (API 키 불필요)
//!
//! html.duckduckgo.com 결과 페이지를 파싱합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{WebResult, WebSearchProvider};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";

/// DuckDuckGo 검색 프로바이더
#[derive(Debug)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("entity-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector '{}': {:?}", css, e))
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 리다이렉트 링크(`//duckduckgo.com/l/?uddg=...`)를 실제 URL로 변환
fn resolve_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;

    if parsed.path().starts_with("/l/") {
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned());
    }

    Some(parsed.to_string())
}

/// 결과 페이지 HTML 파싱
fn parse_results(html: &str, limit: usize) -> Result<Vec<WebResult>> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();

    for item in document.select(&result_sel) {
        if results.len() >= limit {
            break;
        }

        let Some(link) = item.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };

        let snippet = item
            .select(&snippet_sel)
            .next()
            .map(|s| element_text(&s))
            .unwrap_or_default();

        results.push(WebResult {
            title: element_text(&link),
            url,
            snippet,
            content: None,
        });
    }

    Ok(results)
}

#[async_trait]
impl WebSearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>> {
        let url = Url::parse_with_params(DDG_HTML_URL, &[("q", query)])
            .context("Failed to build search URL")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send DuckDuckGo request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("DuckDuckGo returned {}", status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read DuckDuckGo response")?;

        parse_results(&html, num_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><body>
          <div class="result results_links">
            <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Friverdale.example%2Fabout&amp;rut=abc">Riverdale <b>Heights</b></a></h2>
            <a class="result__snippet">Population is approximately 2,500 residents.</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://direct.example/page">Direct link</a>
          </div>
          <div class="result">
            <span>no link here</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_results() {
        let results = parse_results(SAMPLE, 10).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Riverdale Heights");
        assert_eq!(results[0].url, "https://riverdale.example/about");
        assert!(results[0].snippet.contains("2,500 residents"));
        assert_eq!(results[1].url, "https://direct.example/page");
        assert!(results[1].snippet.is_empty());
    }

    #[test]
    fn test_parse_respects_limit() {
        let results = parse_results(SAMPLE, 1).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(
            resolve_href("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example%2F"),
            Some("https://a.example/".to_string())
        );
        assert_eq!(resolve_href("not a url"), None);
    }
}
