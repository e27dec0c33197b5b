//! In-memory Vector Store - 전수 코사인 검색
//!
//! 테스트와 일회성 실행용입니다. 프로세스가 끝나면 내용이 사라집니다.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::vector::{cosine_similarity, StoredHit, VectorDocument, VectorStore};

/// 메모리 벡터 저장소
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    indexes: RwLock<HashMap<String, Vec<VectorDocument>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_index(&self, index: &str, _dimension: usize) -> Result<()> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        indexes.entry(index.to_string()).or_default();
        Ok(())
    }

    async fn upsert(&self, index: &str, documents: &[VectorDocument]) -> Result<usize> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let entries = indexes.entry(index.to_string()).or_default();

        for doc in documents {
            match entries.iter_mut().find(|e| e.id == doc.id) {
                Some(existing) => *existing = doc.clone(),
                None => entries.push(doc.clone()),
            }
        }

        Ok(documents.len())
    }

    async fn delete_stale(&self, index: &str, id_prefix: &str, keep: &[String]) -> Result<()> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        if let Some(entries) = indexes.get_mut(index) {
            entries.retain(|doc| !doc.id.starts_with(id_prefix) || keep.contains(&doc.id));
        }
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<StoredHit>> {
        let indexes = self
            .indexes
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let Some(entries) = indexes.get(index) else {
            return Ok(vec![]);
        };

        let mut hits: Vec<StoredHit> = entries
            .iter()
            .map(|doc| StoredHit {
                id: doc.id.clone(),
                score: cosine_similarity(vector, &doc.vector),
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn count(&self, index: &str) -> Result<usize> {
        let indexes = self
            .indexes
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(indexes.get(index).map(|e| e.len()).unwrap_or(0))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(id: &str, vector: Vec<f32>, text: &str) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                "docs",
                &[
                    doc("far", vec![0.0, 1.0], "far"),
                    doc("near", vec![1.0, 0.1], "near"),
                    doc("mid", vec![1.0, 1.0], "mid"),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let store = MemoryVectorStore::new();
        store.upsert("docs", &[doc("a", vec![1.0], "old")]).await.unwrap();
        store.upsert("docs", &[doc("a", vec![1.0], "new")]).await.unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 1);
        let hits = store.query("docs", &[1.0], 5).await.unwrap();
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn test_delete_stale_keeps_listed_and_foreign_ids() {
        let store = MemoryVectorStore::new();
        store
            .upsert(
                "docs",
                &[
                    doc("doc_k_0", vec![1.0], "kept"),
                    doc("doc_k_1", vec![1.0], "stale"),
                    doc("doc_other_0", vec![1.0], "other source"),
                ],
            )
            .await
            .unwrap();

        store
            .delete_stale("docs", "doc_k_", &["doc_k_0".to_string()])
            .await
            .unwrap();

        let mut ids: Vec<String> = store
            .query("docs", &[1.0], 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["doc_k_0", "doc_other_0"]);

        store.delete_stale("missing", "doc_", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let store = MemoryVectorStore::new();
        assert!(store.query("nope", &[1.0], 5).await.unwrap().is_empty());
        assert_eq!(store.count("nope").await.unwrap(), 0);

        store.create_index("nope", 1).await.unwrap();
        assert_eq!(store.count("nope").await.unwrap(), 0);
    }
}
