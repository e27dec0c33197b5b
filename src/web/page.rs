//! 단일 페이지 수집 - URL 본문 텍스트 추출 (`ingest --url`)

use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};

/// 수집된 페이지
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    /// 태그 제거된 본문
    pub content: String,
}

/// 본문 후보 셀렉터 (우선순위 순)
const CONTENT_SELECTORS: [&str; 5] = ["article", "main", "[role=main]", "#content", "body"];

/// 본문으로 인정할 최소 길이
const MIN_CONTENT_LEN: usize = 100;

/// 페이지 수집기
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("entity-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// URL을 받아 제목과 본문 추출
    pub async fn fetch(&self, url: &str) -> Result<ScrapedPage> {
        tracing::info!("Fetching page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        let html = response.text().await.context("Failed to read response body")?;
        let (title, content) = extract_page(&html);

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            content,
        })
    }
}

/// HTML에서 (제목, 본문) 추출
fn extract_page(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = ["title", "h1"]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .next()
                .map(|e| collapse_text(&e))
                .filter(|t| !t.is_empty())
        });

    let mut fallback = String::new();
    for css in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = document.select(&sel).next() {
            let text = collapse_text(&element);
            if text.len() > MIN_CONTENT_LEN {
                return (title, text);
            }
            if fallback.is_empty() {
                fallback = text;
            }
        }
    }

    (title, fallback)
}

/// 요소 텍스트를 공백 하나로 정리 (script/style 제외)
fn collapse_text(element: &ElementRef) -> String {
    let mut parts = Vec::new();

    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            let skip = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()))
                .is_some_and(|name| name == "script" || name == "style");
            if !skip {
                parts.extend(text.split_whitespace());
            }
        }
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        assert!(PageFetcher::new().is_ok());
    }

    #[test]
    fn test_extract_prefers_article() {
        let html = r#"
            <html>
                <head><title>Riverdale Heights</title><style>.x { color: red; }</style></head>
                <body>
                    <nav>Navigation menu</nav>
                    <article>
                        Riverdale Heights is a small town. Current population is approximately
                        2,500 residents according to the latest municipal census records.
                        <script>var tracking = 1;</script>
                    </article>
                </body>
            </html>
        "#;

        let (title, content) = extract_page(html);
        assert_eq!(title.as_deref(), Some("Riverdale Heights"));
        assert!(content.contains("2,500 residents"));
        assert!(!content.contains("Navigation"));
        assert!(!content.contains("tracking"));
    }

    #[test]
    fn test_extract_h1_fallback_and_short_body() {
        let html = "<html><head><title></title></head><body><h1>Heading</h1><p>tiny</p></body></html>";
        let (title, content) = extract_page(html);
        assert_eq!(title.as_deref(), Some("Heading"));
        assert_eq!(content, "Heading tiny");
    }
}
