//! 웹 검색 모듈
//!
//! 웹 검색은 이름으로 등록된 `WebSearchProvider` 구현체를 통해서만 호출합니다.
//! 등록되지 않은 이름을 요청하면 `CollaboratorUnavailable` 에러이며,
//! 파이프라인은 이 경우 로컬 결과만으로 진행합니다.

mod duckduckgo;
mod page;
mod tavily;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

pub use duckduckgo::DuckDuckGoSearch;
pub use page::{PageFetcher, ScrapedPage};
pub use tavily::TavilySearch;

// ============================================================================
// Types
// ============================================================================

/// 정규화된 웹 검색 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WebResult {
    /// 저장/임베딩에 쓸 본문 (content가 없으면 snippet)
    pub fn body(&self) -> &str {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => content,
            _ => &self.snippet,
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// 웹 검색 프로바이더
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// 등록 이름
    fn name(&self) -> &str;

    /// 쿼리 실행 (순위 순 결과)
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<WebResult>>;
}

// ============================================================================
// Registry
// ============================================================================

/// 이름 기반 프로바이더 레지스트리
#[derive(Default, Clone)]
pub struct WebSearchRegistry {
    providers: BTreeMap<String, Arc<dyn WebSearchProvider>>,
}

impl WebSearchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 프로바이더 등록 (같은 이름은 교체)
    pub fn register(&mut self, provider: Arc<dyn WebSearchProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WebSearchProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(|k| k.as_str()).collect()
    }

    /// 환경에서 사용 가능한 기본 프로바이더 등록
    ///
    /// DuckDuckGo는 항상, Tavily는 `TAVILY_API_KEY`가 있을 때만 등록됩니다.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        match DuckDuckGoSearch::new() {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => tracing::warn!("DuckDuckGo provider unavailable: {:#}", e),
        }

        match TavilySearch::from_env() {
            Ok(provider) => registry.register(Arc::new(provider)),
            Err(e) => tracing::debug!("Tavily provider not registered: {:#}", e),
        }

        registry
    }
}

impl std::fmt::Debug for WebSearchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

// ============================================================================
// Client
// ============================================================================

/// 이름으로 확정된 웹 검색 클라이언트
#[derive(Clone)]
pub struct WebSearchClient {
    provider: Arc<dyn WebSearchProvider>,
}

impl WebSearchClient {
    pub fn new(provider: Arc<dyn WebSearchProvider>) -> Self {
        Self { provider }
    }

    /// 레지스트리에서 이름으로 프로바이더 선택
    pub fn resolve(registry: &WebSearchRegistry, name: &str) -> Result<Self, RetrievalError> {
        registry.get(name).map(Self::new).ok_or_else(|| {
            RetrievalError::CollaboratorUnavailable(format!(
                "web search provider '{}' is not registered (available: {:?})",
                name,
                registry.names()
            ))
        })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// 검색 실행. 빈 결과는 정상 반환입니다.
    pub async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, RetrievalError> {
        let mut results = self
            .provider
            .search(query, num_results)
            .await
            .map_err(|e| RetrievalError::transient("web search", e))?;

        results.truncate(num_results);
        tracing::debug!(
            "Web search via {} returned {} results",
            self.provider.name(),
            results.len()
        );

        Ok(results)
    }
}

impl std::fmt::Debug for WebSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchClient")
            .field("provider", &self.provider.name())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        name: &'static str,
        count: usize,
    }

    #[async_trait]
    impl WebSearchProvider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, query: &str, _num_results: usize) -> Result<Vec<WebResult>> {
            Ok((0..self.count)
                .map(|i| WebResult {
                    title: format!("{} {}", query, i),
                    url: format!("https://example.com/{}", i),
                    snippet: "snippet".to_string(),
                    content: None,
                })
                .collect())
        }
    }

    #[test]
    fn test_resolve_by_exact_name() {
        let mut registry = WebSearchRegistry::new();
        registry.register(Arc::new(FixedProvider {
            name: "tavily",
            count: 1,
        }));

        assert!(WebSearchClient::resolve(&registry, "tavily").is_ok());

        // 부분 문자열 매칭은 하지 않음
        let err = WebSearchClient::resolve(&registry, "tav").unwrap_err();
        assert!(matches!(err, RetrievalError::CollaboratorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_search_truncates_to_requested() {
        let client = WebSearchClient::new(Arc::new(FixedProvider {
            name: "fixed",
            count: 8,
        }));
        let results = client.search("harbor", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(client.provider_name(), "fixed");
    }

    #[test]
    fn test_body_falls_back_to_snippet() {
        let mut result = WebResult {
            title: "t".to_string(),
            url: "u".to_string(),
            snippet: "short".to_string(),
            content: Some("  ".to_string()),
        };
        assert_eq!(result.body(), "short");

        result.content = Some("full text".to_string());
        assert_eq!(result.body(), "full text");
    }
}
