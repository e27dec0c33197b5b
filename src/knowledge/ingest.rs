//! 문서 수집 - 청킹, 임베딩, 엔티티 태깅, 업서트
//!
//! 웹 검색 결과 저장도 여기서 처리합니다. 자동 경로(로컬 결과 부족)와
//! 사용자 요청 경로 두 곳에서만 저장이 일어납니다.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::retrieval::{EntityExtractor, META_ENTITIES};
use crate::web::WebResult;

use super::chunker::{default_chunker, Chunker};
use super::client::VectorSearchClient;
use super::vector::VectorDocument;

/// 웹 결과 문서의 source 메타데이터 값
pub const WEB_SOURCE: &str = "web_search";

/// 문서 수집 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source: String,
    pub chunk_count: usize,
    pub document_ids: Vec<String>,
}

/// 웹 결과 저장 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebStorageReport {
    pub message: String,
    pub stored_count: usize,
    pub document_ids: Vec<String>,
}

/// 수집기
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: VectorSearchClient,
    chunker: Box<dyn Chunker>,
    extractor: EntityExtractor,
}

impl Ingestor {
    /// `extractor`는 수집 시점 상한(기본 10개)이 적용된 추출기여야 합니다.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: VectorSearchClient,
        extractor: EntityExtractor,
    ) -> Self {
        Self {
            embedder,
            vectors,
            chunker: default_chunker(),
            extractor,
        }
    }

    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// 텍스트 문서 수집
    ///
    /// 같은 source를 다시 수집하면 같은 ID로 덮어쓰고, 새 버전에 없는
    /// 이전 청크는 삭제합니다.
    pub async fn ingest(
        &self,
        source: &str,
        title: Option<&str>,
        text: &str,
    ) -> Result<IngestReport, RetrievalError> {
        let source_key = source_key(source);
        let id_prefix = format!("doc_{}_", source_key);

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {}", source);
            self.vectors.delete_stale(&id_prefix, &[]).await?;
            return Ok(IngestReport {
                source: source.to_string(),
                chunk_count: 0,
                document_ids: Vec::new(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed_all(&texts).await?;

        let ingested_at = Utc::now().to_rfc3339();

        let documents: Vec<VectorDocument> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let entities = self.extractor.extract(&chunk.text).into_vec();

                let mut metadata = Map::new();
                metadata.insert("source".to_string(), json!(source));
                if let Some(title) = title {
                    metadata.insert("title".to_string(), json!(title));
                }
                metadata.insert("chunkIndex".to_string(), json!(chunk.index));
                metadata.insert("start".to_string(), json!(chunk.start));
                metadata.insert("end".to_string(), json!(chunk.end));
                metadata.insert(META_ENTITIES.to_string(), json!(entities));
                metadata.insert("ingestedAt".to_string(), json!(ingested_at));

                VectorDocument {
                    id: format!("{}{}", id_prefix, chunk.index),
                    vector,
                    text: chunk.text,
                    metadata,
                }
            })
            .collect();

        self.vectors.upsert(&documents).await?;

        let document_ids: Vec<String> = documents.into_iter().map(|d| d.id).collect();
        self.vectors.delete_stale(&id_prefix, &document_ids).await?;

        tracing::info!(
            "Ingested document: {} (chunks={})",
            source,
            document_ids.len()
        );

        Ok(IngestReport {
            source: source.to_string(),
            chunk_count: document_ids.len(),
            document_ids,
        })
    }

    /// 사용자 요청 저장 경로
    ///
    /// `user_requested`가 false면 아무것도 쓰지 않습니다.
    pub async fn store_web_results(
        &self,
        results: &[WebResult],
        original_query: &str,
        user_requested: bool,
    ) -> Result<WebStorageReport, RetrievalError> {
        if !user_requested {
            return Ok(WebStorageReport {
                message: "Web results were not stored (storage was not requested)".to_string(),
                stored_count: 0,
                document_ids: Vec::new(),
            });
        }

        self.persist_web_results(results, original_query).await
    }

    /// 웹 결과 1건당 문서 1개로 임베딩 후 업서트
    pub(crate) async fn persist_web_results(
        &self,
        results: &[WebResult],
        original_query: &str,
    ) -> Result<WebStorageReport, RetrievalError> {
        let usable: Vec<&WebResult> = results
            .iter()
            .filter(|r| !r.body().trim().is_empty() || !r.title.trim().is_empty())
            .collect();

        if usable.is_empty() {
            return Ok(WebStorageReport {
                message: "No web results to store".to_string(),
                stored_count: 0,
                document_ids: Vec::new(),
            });
        }

        let texts: Vec<String> = usable
            .iter()
            .map(|r| format!("{}\n\n{}", r.title.trim(), r.body().trim()))
            .collect();
        let vectors = self.embed_all(&texts).await?;

        let timestamp = Utc::now().timestamp_millis();
        let stored_at = Utc::now().to_rfc3339();

        let documents: Vec<VectorDocument> = usable
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((result, text), vector)| {
                let entities = self.extractor.extract(&text).into_vec();
                let suffix = uuid::Uuid::new_v4().simple().to_string();

                let mut metadata = Map::new();
                metadata.insert("source".to_string(), json!(WEB_SOURCE));
                metadata.insert("url".to_string(), json!(result.url));
                metadata.insert("title".to_string(), json!(result.title));
                metadata.insert("snippet".to_string(), json!(result.snippet));
                metadata.insert("query".to_string(), json!(original_query));
                metadata.insert(META_ENTITIES.to_string(), json!(entities));
                metadata.insert("storedAt".to_string(), Value::String(stored_at.clone()));

                VectorDocument {
                    id: format!("web_{}_{}", timestamp, &suffix[..8]),
                    vector,
                    text,
                    metadata,
                }
            })
            .collect();

        let stored = self.vectors.upsert(&documents).await?;
        tracing::info!(
            "Stored {} web results for query \"{}\"",
            stored,
            original_query
        );

        Ok(WebStorageReport {
            message: format!("Stored {} web search results in the knowledge base", stored),
            stored_count: stored,
            document_ids: documents.into_iter().map(|d| d.id).collect(),
        })
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let vectors = self
            .embedder
            .embed_batch(texts)
            .await
            .map_err(|e| RetrievalError::transient("embed", e))?;

        if vectors.len() != texts.len() {
            return Err(RetrievalError::transient(
                "embed",
                anyhow::anyhow!(
                    "embedding count mismatch: {} texts, {} vectors",
                    texts.len(),
                    vectors.len()
                ),
            ));
        }

        Ok(vectors)
    }
}

/// source 문자열의 짧은 해시 (문서 ID 접두어)
fn source_key(source: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(source.as_bytes()));
    digest[..16].to_string()
}

// ============================================================================
// Tests
// ============================================================================
