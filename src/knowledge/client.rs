//! VectorSearchClient - 파이프라인이 사용하는 벡터 저장소 어댑터
//!
//! 저장소가 설정되지 않았으면 모든 호출이 `Configuration` 에러로 즉시 실패합니다.
//! 호출 실패는 재시도하지 않으며, 호출 지점이 치명 여부를 결정합니다.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::RetrievalError;
use crate::retrieval::Candidate;

use super::vector::{VectorDocument, VectorStore};

/// 벡터 검색 클라이언트
#[derive(Clone)]
pub struct VectorSearchClient {
    store: Option<Arc<dyn VectorStore>>,
    index_name: String,
}

impl VectorSearchClient {
    /// 저장소와 인덱스 이름으로 생성
    pub fn new(store: Arc<dyn VectorStore>, index_name: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            index_name: index_name.into(),
        }
    }

    /// 저장소 없이 생성 (모든 호출이 설정 에러)
    pub fn unconfigured(index_name: impl Into<String>) -> Self {
        Self {
            store: None,
            index_name: index_name.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn store(&self) -> Result<&Arc<dyn VectorStore>, RetrievalError> {
        self.store.as_ref().ok_or_else(|| {
            RetrievalError::Configuration(format!(
                "vector store for index '{}' is not configured",
                self.index_name
            ))
        })
    }

    /// 시작 시 인덱스 준비. 생성 실패는 경고만 남깁니다.
    pub async fn ensure_index(&self, dimension: usize) -> Result<(), RetrievalError> {
        let store = self.store()?;
        if let Err(e) = store.create_index(&self.index_name, dimension).await {
            tracing::warn!(
                "Index '{}' could not be created (continuing): {:#}",
                self.index_name,
                e
            );
        }
        Ok(())
    }

    /// 유사도 쿼리 - 점수 내림차순 후보 목록
    pub async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>, RetrievalError> {
        let store = self.store()?;

        let hits = store
            .query(&self.index_name, vector, top_k)
            .await
            .map_err(|e| RetrievalError::transient("vector query", e))?;

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| Candidate::new(hit.id, hit.score, hit.text).with_metadata(hit.metadata))
            .collect();

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(top_k);

        Ok(candidates)
    }

    /// 문서 업서트
    pub async fn upsert(&self, documents: &[VectorDocument]) -> Result<usize, RetrievalError> {
        let store = self.store()?;

        store
            .upsert(&self.index_name, documents)
            .await
            .map_err(|e| RetrievalError::transient("vector upsert", e))
    }

    /// `id_prefix`로 시작하지만 `keep`에 없는 문서 삭제
    pub async fn delete_stale(
        &self,
        id_prefix: &str,
        keep: &[String],
    ) -> Result<(), RetrievalError> {
        let store = self.store()?;

        store
            .delete_stale(&self.index_name, id_prefix, keep)
            .await
            .map_err(|e| RetrievalError::transient("vector delete", e))
    }

    /// 저장된 벡터 수
    pub async fn count(&self) -> Result<usize, RetrievalError> {
        let store = self.store()?;

        store
            .count(&self.index_name)
            .await
            .map_err(|e| RetrievalError::transient("vector count", e))
    }
}

impl std::fmt::Debug for VectorSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearchClient")
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .field("index_name", &self.index_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MemoryVectorStore;
    use crate::retrieval::RetrievalMethod;
    use serde_json::Map;

    #[tokio::test]
    async fn test_unconfigured_fails_fast() {
        let client = VectorSearchClient::unconfigured("documents");
        let err = client.query(&[1.0], 5).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
        assert!(!err.is_recoverable());

        assert!(client.upsert(&[]).await.is_err());
        assert!(client.ensure_index(4).await.is_err());
    }

    #[tokio::test]
    async fn test_query_maps_hits_to_candidates() {
        let client = VectorSearchClient::new(Arc::new(MemoryVectorStore::new()), "documents");
        client.ensure_index(2).await.unwrap();
        client
            .upsert(&[
                VectorDocument {
                    id: "x".to_string(),
                    vector: vec![1.0, 0.0],
                    text: "harbor".to_string(),
                    metadata: Map::new(),
                },
                VectorDocument {
                    id: "y".to_string(),
                    vector: vec![0.0, 1.0],
                    text: "bridge".to_string(),
                    metadata: Map::new(),
                },
            ])
            .await
            .unwrap();

        let candidates = client.query(&[1.0, 0.2], 10).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "x");
        assert!(candidates[0].score >= candidates[1].score);
        assert_eq!(candidates[0].method, RetrievalMethod::VectorSimilarity);
        assert_eq!(client.count().await.unwrap(), 2);
    }
}
