//! RetrievalPipeline - 검색 파이프라인 오케스트레이션
//!
//! 단계 순서:
//! 1. 쿼리 엔티티 추출 + 쿼리 임베딩
//! 2. 초기 벡터 검색 (실패 시 전체 실패 → degraded 결과)
//! 3. 충분성 판정 → 부족하면 웹 검색, 결과 저장, 재검색
//! 4. 후보 메타데이터 엔티티 합집합
//! 5. 엔티티 확장 검색
//! 6. 병합 → 중복 제거 → 재순위 → 컨텍스트 조립
//!
//! `retrieve`는 에러를 반환하지 않습니다. 치명적 실패는 결과 객체 안에 기록됩니다.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::knowledge::{Ingestor, VectorSearchClient, WebStorageReport};
use crate::web::{WebResult, WebSearchClient};

use super::context::ContextAssembler;
use super::dedup::dedupe;
use super::entity::{EntityExtractor, StopWords};
use super::expansion::EntityExpansionSearch;
use super::rerank::EntityOverlapReranker;
use super::sufficiency::SufficiencyGate;
use super::types::{
    Candidate, EntityPathEntry, RetrievalOptions, RetrievalResult, META_ENTITY, NO_RESULTS_MESSAGE,
};

/// 웹 보강 단계 결과
struct WebAugmentation {
    candidates: Vec<Candidate>,
    used: bool,
    results: Option<Vec<WebResult>>,
}

/// 검색 파이프라인
pub struct RetrievalPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: VectorSearchClient,
    web: Option<WebSearchClient>,
    ingestor: Ingestor,
    extractor: EntityExtractor,
    gate: SufficiencyGate,
    expansion: EntityExpansionSearch,
    reranker: EntityOverlapReranker,
    assembler: ContextAssembler,
    web_results: usize,
}

impl RetrievalPipeline {
    /// 협력자를 주입받아 생성
    ///
    /// `web`이 None이면 로컬 결과만으로 동작합니다.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: VectorSearchClient,
        web: Option<WebSearchClient>,
        config: &RagConfig,
    ) -> Self {
        let retrieval = &config.retrieval;
        let stop_words = Arc::new(StopWords::from_config(config.entities.stop_words.as_deref()));

        let ingestor = Ingestor::new(
            embedder.clone(),
            vectors.clone(),
            EntityExtractor::new(stop_words.clone())
                .with_limit(config.entities.max_ingest_entities),
        );

        let expansion = EntityExpansionSearch::new(
            embedder.clone(),
            vectors.clone(),
            stop_words.clone(),
            retrieval,
        );

        Self {
            embedder,
            vectors,
            web,
            ingestor,
            extractor: EntityExtractor::new(stop_words),
            gate: SufficiencyGate::new(retrieval.sufficiency_threshold),
            expansion,
            reranker: EntityOverlapReranker::new(retrieval.entity_boost_weight),
            assembler: ContextAssembler::new(
                retrieval.min_chunk_chars,
                retrieval.truncation_slack,
            ),
            web_results: retrieval.web_results,
        }
    }

    /// 쿼리와 엔티티 임베딩에 별도 프로바이더 사용
    ///
    /// 문서 저장(수집, 웹 결과 저장)은 `new`에 넘긴 임베더를 계속 씁니다.
    pub fn with_query_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.expansion = self.expansion.with_embedder(embedder.clone());
        self.embedder = embedder;
        self
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn vectors(&self) -> &VectorSearchClient {
        &self.vectors
    }

    pub fn web_provider(&self) -> Option<&str> {
        self.web.as_ref().map(|w| w.provider_name())
    }

    /// 검색 실행 (단일 공개 진입점)
    pub async fn retrieve(&self, query: &str, options: &RetrievalOptions) -> RetrievalResult {
        match self.try_retrieve(query, options).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Retrieval failed for \"{}\": {}", query, e);
                RetrievalResult::degraded(&e.to_string())
            }
        }
    }

    /// 데드라인을 두고 검색 실행
    ///
    /// 시간 초과 시 진행 중이던 단계는 버려지고 `Timeout` 에러를 반환합니다.
    pub async fn retrieve_with_deadline(
        &self,
        query: &str,
        options: &RetrievalOptions,
        deadline: Duration,
    ) -> Result<RetrievalResult, RetrievalError> {
        tokio::time::timeout(deadline, self.retrieve(query, options))
            .await
            .map_err(|_| RetrievalError::Timeout(deadline))
    }

    /// 웹 검색을 직접 실행하고 사용자 요청으로 저장 (`web-store`)
    pub async fn search_and_store(
        &self,
        query: &str,
        num_results: usize,
        store: bool,
    ) -> Result<(Vec<WebResult>, WebStorageReport), RetrievalError> {
        let web = self.web.as_ref().ok_or_else(|| {
            RetrievalError::CollaboratorUnavailable("no web search provider configured".into())
        })?;

        let results = web.search(query, num_results).await?;
        let report = self
            .ingestor
            .store_web_results(&results, query, store)
            .await?;

        Ok((results, report))
    }

    async fn try_retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult, RetrievalError> {
        let query_entities = self.extractor.extract(query);
        tracing::debug!("Query entities: {:?}", query_entities.as_slice());

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| RetrievalError::transient("query embed", e))?;

        let initial = self.vectors.query(&query_vector, options.top_k).await?;
        tracing::info!("Initial vector search returned {} results", initial.len());

        let WebAugmentation {
            candidates: initial,
            used: web_search_used,
            results: web_search_results,
        } = if options.use_web_search && !self.gate.is_sufficient(&initial) {
            self.augment_with_web(query, &query_vector, options.top_k, initial)
                .await
        } else {
            WebAugmentation {
                candidates: initial,
                used: false,
                results: None,
            }
        };

        if initial.is_empty() {
            return Ok(RetrievalResult::empty(web_search_used, web_search_results));
        }

        let mut entities = query_entities;
        entities.union_with(&self.extractor.extract_from_candidates(&initial));

        let expanded = if options.use_entity_enhancement {
            self.expansion
                .expand(&entities, &initial, options.entity_depth)
                .await
        } else {
            Vec::new()
        };
        tracing::info!("Entity expansion added {} results", expanded.len());

        // 초기 결과가 앞에 와야 양쪽에서 찾은 후보가 원래 점수를 유지
        let mut merged = initial;
        merged.extend(expanded);
        let ranked = self.reranker.rerank(dedupe(merged), &entities);

        let entity_path: Vec<EntityPathEntry> = ranked
            .iter()
            .filter(|c| c.is_entity_search())
            .map(|c| EntityPathEntry {
                id: c.id.clone(),
                entity: c
                    .metadata
                    .get(META_ENTITY)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                score: c.score,
            })
            .collect();

        let assembled = self.assembler.assemble(
            &ranked,
            &entities,
            options.max_results,
            options.max_context_length,
        );

        let relevant_context = if assembled.context.is_empty() {
            NO_RESULTS_MESSAGE.to_string()
        } else {
            assembled.context
        };

        Ok(RetrievalResult {
            relevant_context,
            sources: assembled.sources,
            entity_path,
            entities: entities.into_vec(),
            web_search_used,
            web_search_results,
        })
    }

    /// 웹 검색 → 결과 저장 → 재검색
    ///
    /// 모든 실패는 경고만 남기고 기존 결과로 진행합니다.
    async fn augment_with_web(
        &self,
        query: &str,
        query_vector: &[f32],
        top_k: usize,
        initial: Vec<Candidate>,
    ) -> WebAugmentation {
        let unchanged = |candidates| WebAugmentation {
            candidates,
            used: false,
            results: None,
        };

        let Some(web) = self.web.as_ref() else {
            tracing::debug!("Local results insufficient but no web search provider is configured");
            return unchanged(initial);
        };

        let results = match web.search(query, self.web_results).await {
            Ok(results) if !results.is_empty() => results,
            Ok(_) => {
                tracing::info!("Web search returned no results; continuing with local results");
                return unchanged(initial);
            }
            Err(e) => {
                tracing::warn!("Web search unavailable; continuing with local results: {}", e);
                return unchanged(initial);
            }
        };

        tracing::info!(
            "Local results insufficient; web search via {} returned {} results",
            web.provider_name(),
            results.len()
        );

        let candidates = match self.ingestor.persist_web_results(&results, query).await {
            Ok(report) if report.stored_count > 0 => {
                match self.vectors.query(query_vector, top_k).await {
                    Ok(requeried) => requeried,
                    Err(e) => {
                        tracing::warn!("Re-query after web storage failed: {}", e);
                        initial
                    }
                }
            }
            Ok(_) => initial,
            Err(e) => {
                tracing::warn!("Failed to store web results: {}", e);
                initial
            }
        };

        WebAugmentation {
            candidates,
            used: true,
            results: Some(results),
        }
    }
}

impl std::fmt::Debug for RetrievalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("embedder", &self.embedder.name())
            .field("vectors", &self.vectors)
            .field("web", &self.web)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
