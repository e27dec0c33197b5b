//! 엔티티 확장 검색
//!
//! 엔티티 문자열 자체를 쿼리로 삼아 벡터 검색을 다시 돌리고, 초기 결과에 없던
//! 고득점 청크만 감쇠 점수로 후보 풀에 추가합니다. 엔티티별 실패는 로그만
//! 남기고 건너뜁니다.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::knowledge::VectorSearchClient;

use super::entity::{EntitySet, StopWords};
use super::types::Candidate;

/// 엔티티 확장 검색기
pub struct EntityExpansionSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: VectorSearchClient,
    stop_words: Arc<StopWords>,
    max_entities: usize,
    max_results: usize,
    score_threshold: f32,
    dampening: f32,
}

impl EntityExpansionSearch {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: VectorSearchClient,
        stop_words: Arc<StopWords>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vectors,
            stop_words,
            max_entities: config.max_expansion_entities,
            max_results: config.max_expansion_results,
            score_threshold: config.entity_score_threshold,
            dampening: config.entity_dampening,
        }
    }

    /// 엔티티 임베딩에 쓸 프로바이더 교체
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    /// 엔티티당 검색 결과 상한 `min(max_results, depth * 2)`
    pub fn results_per_entity(&self, depth: usize) -> usize {
        self.max_results.min(depth.saturating_mul(2))
    }

    /// 확장 검색 실행
    ///
    /// 앞에서부터 최대 `max_entities`개 엔티티만 사용합니다 (순위가 아닌 절단).
    /// 반환 후보의 ID는 `initial`에 없고, 결과 안에서도 중복되지 않습니다.
    pub async fn expand(
        &self,
        entities: &EntitySet,
        initial: &[Candidate],
        depth: usize,
    ) -> Vec<Candidate> {
        let per_entity = self.results_per_entity(depth);
        if per_entity == 0 || entities.is_empty() {
            return Vec::new();
        }

        let targets: Vec<&str> = entities
            .iter()
            .take(self.max_entities)
            .map(|e| e.as_str())
            .filter(|e| !self.stop_words.contains(e))
            .collect();

        // 엔티티 간 요청은 서로 독립이므로 동시에 보냄
        let outcomes = join_all(
            targets
                .iter()
                .map(|entity| self.search_entity(entity, per_entity)),
        )
        .await;

        let mut seen: HashSet<String> = initial.iter().map(|c| c.id.clone()).collect();
        let mut expanded = Vec::new();

        for (entity, outcome) in targets.iter().zip(outcomes) {
            let hits = match outcome {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!("Entity expansion failed for '{}': {}", entity, e);
                    continue;
                }
            };

            let before = expanded.len();
            for mut hit in hits {
                if hit.score <= self.score_threshold || seen.contains(&hit.id) {
                    continue;
                }
                seen.insert(hit.id.clone());
                hit.mark_entity_search(entity, self.dampening);
                expanded.push(hit);
            }

            tracing::debug!(
                "Entity '{}' added {} candidates",
                entity,
                expanded.len() - before
            );
        }

        expanded
    }

    async fn search_entity(
        &self,
        entity: &str,
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let vector = self
            .embedder
            .embed(entity)
            .await
            .map_err(|e| RetrievalError::transient("entity embed", e))?;

        self.vectors.query(&vector, top_k).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{MemoryVectorStore, VectorDocument, VectorStore};
    use crate::retrieval::types::{META_ENTITY, META_ENTITY_SEARCH};
    use crate::retrieval::RetrievalMethod;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Map};

    /// 엔티티마다 고정 축 벡터를 돌려주는 임베더. "broken"은 실패.
    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            match text {
                "harbor" => Ok(vec![1.0, 0.0, 0.0]),
                "ferry" => Ok(vec![0.0, 1.0, 0.0]),
                "broken" => anyhow::bail!("embedding service down"),
                _ => Ok(vec![0.0, 0.0, 1.0]),
            }
        }

        fn dimension(&self) -> usize {
            3
        }

        fn name(&self) -> &str {
            "axis"
        }
    }

    fn doc(id: &str, vector: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            vector,
            text: format!("text of {}", id),
            metadata: Map::new(),
        }
    }

    async fn search() -> EntityExpansionSearch {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(
                "documents",
                &[
                    doc("harbor-exact", vec![1.0, 0.0, 0.0]),
                    doc("harbor-near", vec![0.9, 0.1, 0.0]),
                    doc("harbor-weak", vec![0.5, 0.5, 0.5]),
                    doc("ferry-exact", vec![0.0, 1.0, 0.0]),
                    doc("other", vec![0.0, 0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        EntityExpansionSearch::new(
            Arc::new(AxisEmbedder),
            VectorSearchClient::new(store, "documents"),
            Arc::new(StopWords::default()),
            &RetrievalConfig::default(),
        )
    }

    fn entities(items: &[&str]) -> EntitySet {
        items.iter().collect()
    }

    #[tokio::test]
    async fn test_expand_dampens_and_tags() {
        let search = search().await;
        let results = search.expand(&entities(&["harbor"]), &[], 2).await;

        let ids: Vec<&str> = results.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"harbor-exact"));
        assert!(ids.contains(&"harbor-near"));
        assert!(!ids.contains(&"harbor-weak"));

        let exact = results.iter().find(|c| c.id == "harbor-exact").unwrap();
        assert!((exact.score - 0.7).abs() < 1e-4);
        assert_eq!(exact.method, RetrievalMethod::EntitySearch);
        assert_eq!(exact.metadata[META_ENTITY_SEARCH], json!(true));
        assert_eq!(exact.metadata[META_ENTITY], json!("harbor"));
    }

    #[tokio::test]
    async fn test_expand_excludes_initial_ids() {
        let search = search().await;
        let initial = vec![Candidate::new("harbor-exact", 0.95, "already here")];

        let results = search.expand(&entities(&["harbor"]), &initial, 2).await;

        assert!(results.iter().all(|c| c.id != "harbor-exact"));
        assert!(results.iter().any(|c| c.id == "harbor-near"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_entities() {
        let search = search().await;
        let results = search
            .expand(&entities(&["broken", "ferry"]), &[], 2)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "ferry-exact");
    }

    #[tokio::test]
    async fn test_stop_word_entities_are_not_searched() {
        /// 임베딩 요청 텍스트를 기록
        #[derive(Default)]
        struct LoggingEmbedder {
            requested: std::sync::Mutex<Vec<String>>,
        }

        #[async_trait]
        impl EmbeddingProvider for LoggingEmbedder {
            async fn embed(&self, text: &str) -> Result<Vec<f32>> {
                self.requested.lock().unwrap().push(text.to_string());
                AxisEmbedder.embed(text).await
            }

            fn dimension(&self) -> usize {
                3
            }

            fn name(&self) -> &str {
                "logging"
            }
        }

        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(
                "documents",
                &[
                    doc("harbor-exact", vec![1.0, 0.0, 0.0]),
                    doc("other", vec![0.0, 0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let embedder = Arc::new(LoggingEmbedder::default());
        let search = EntityExpansionSearch::new(
            embedder.clone(),
            VectorSearchClient::new(store, "documents"),
            Arc::new(StopWords::default()),
            &RetrievalConfig::default(),
        );

        // 후보 메타데이터에서 온 엔티티는 불용어 필터를 거치지 않은 상태
        let results = search
            .expand(&entities(&["about", "harbor"]), &[], 2)
            .await;

        assert_eq!(*embedder.requested.lock().unwrap(), vec!["harbor"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "harbor-exact");
        assert_eq!(results[0].metadata[META_ENTITY], json!("harbor"));
    }

    #[tokio::test]
    async fn test_only_first_entities_are_used() {
        let search = search().await;
        // 네 번째 엔티티(ferry)는 잘려서 검색되지 않음
        let results = search
            .expand(&entities(&["alpha", "bravo", "charlie", "ferry"]), &[], 2)
            .await;

        assert!(results.iter().all(|c| c.id != "ferry-exact"));
    }

    #[tokio::test]
    async fn test_results_per_entity() {
        let search = search().await;
        assert_eq!(search.results_per_entity(0), 0);
        assert_eq!(search.results_per_entity(1), 2);
        assert_eq!(search.results_per_entity(2), 4);
        assert_eq!(search.results_per_entity(10), 5);

        let results = search.expand(&entities(&["harbor"]), &[], 0).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_store_yields_nothing() {
        let search = EntityExpansionSearch::new(
            Arc::new(AxisEmbedder),
            VectorSearchClient::unconfigured("documents"),
            Arc::new(StopWords::default()),
            &RetrievalConfig::default(),
        );
        let results = search.expand(&entities(&["harbor"]), &[], 2).await;
        assert!(results.is_empty());
    }
}
