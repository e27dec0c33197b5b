//! 검색 파이프라인 데이터 모델
//!
//! 모든 단계의 후보는 같은 `Candidate` 구조체를 사용하며,
//! 출처(벡터 유사도 / 엔티티 검색)는 생성 시점에 `method` 필드로 기록됩니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::web::WebResult;

/// 엔티티 검색으로 발견된 후보 표시
pub const META_ENTITY_SEARCH: &str = "entitySearch";
/// 엔티티 검색을 촉발한 엔티티
pub const META_ENTITY: &str = "entity";
/// 수집 시 미리 계산된 엔티티 배열
pub const META_ENTITIES: &str = "entities";
/// 엔티티 출현 횟수 합계
pub const META_ENTITY_SCORE: &str = "entityScore";
/// 재순위 후 점수
pub const META_BOOSTED_SCORE: &str = "boostedScore";
/// 검색 방법 태그
pub const META_RETRIEVAL_METHOD: &str = "retrievalMethod";

// ============================================================================
// Candidate
// ============================================================================

/// 후보가 발견된 경로
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// 쿼리 임베딩 유사도 검색
    VectorSimilarity,
    /// 엔티티 기반 재검색
    EntitySearch,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VectorSimilarity => "vector_similarity",
            Self::EntitySearch => "entity_search",
        }
    }
}

/// 검색 후보 (한 번의 파이프라인 실행 동안만 존재)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// 중복 제거에 쓰이는 고유 ID
    pub id: String,
    /// 유사도 점수 (부스팅 후 1.0을 넘을 수 있음)
    pub score: f32,
    /// 청크 텍스트
    pub text: String,
    /// 출처 및 관측용 메타데이터
    pub metadata: Map<String, Value>,
    /// 발견 경로
    pub method: RetrievalMethod,
}

impl Candidate {
    pub fn new(id: impl Into<String>, score: f32, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score,
            text: text.into(),
            metadata: Map::new(),
            method: RetrievalMethod::VectorSimilarity,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// 수집 시 메타데이터에 기록된 엔티티 목록
    pub fn declared_entities(&self) -> Vec<String> {
        match self.metadata.get(META_ENTITIES) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// 엔티티 검색 출처 여부
    pub fn is_entity_search(&self) -> bool {
        self.method == RetrievalMethod::EntitySearch
    }

    /// 엔티티 검색 출처를 태그하고 점수를 감쇠합니다.
    pub fn mark_entity_search(&mut self, entity: &str, dampening: f32) {
        self.score *= dampening;
        self.method = RetrievalMethod::EntitySearch;
        self.metadata
            .insert(META_ENTITY_SEARCH.to_string(), Value::Bool(true));
        self.metadata
            .insert(META_ENTITY.to_string(), Value::String(entity.to_string()));
    }
}

// ============================================================================
// Options
// ============================================================================

/// 호출자가 지정하는 검색 옵션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub entity_depth: usize,
    pub use_entity_enhancement: bool,
    pub max_results: usize,
    pub max_context_length: usize,
    /// 로컬 결과가 부족할 때 웹 검색 보강 허용 여부
    pub use_web_search: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            entity_depth: 2,
            use_entity_enhancement: true,
            max_results: 15,
            max_context_length: 6000,
            use_web_search: true,
        }
    }
}

// ============================================================================
// Result
// ============================================================================

/// 결과에 포함되는 출처 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntry {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_method: Option<RetrievalMethod>,
}

impl From<&Candidate> for SourceEntry {
    fn from(candidate: &Candidate) -> Self {
        let mut metadata = candidate.metadata.clone();
        metadata.insert(
            META_RETRIEVAL_METHOD.to_string(),
            Value::String(candidate.method.as_str().to_string()),
        );

        Self {
            id: candidate.id.clone(),
            score: candidate.score,
            text: candidate.text.clone(),
            metadata,
            retrieval_method: Some(candidate.method),
        }
    }
}

/// 엔티티 확장으로 추가된 후보의 경로
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPathEntry {
    pub id: String,
    pub entity: String,
    pub score: f32,
}

/// 파이프라인 출력
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub relevant_context: String,
    pub sources: Vec<SourceEntry>,
    pub entity_path: Vec<EntityPathEntry>,
    pub entities: Vec<String>,
    pub web_search_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_results: Option<Vec<WebResult>>,
}

/// 결과가 없을 때의 컨텍스트 문구
pub const NO_RESULTS_MESSAGE: &str =
    "No relevant information found in the knowledge base for this query.";

impl RetrievalResult {
    /// 초기 검색과 웹 보강 후에도 후보가 없는 경우
    pub fn empty(web_search_used: bool, web_search_results: Option<Vec<WebResult>>) -> Self {
        Self {
            relevant_context: NO_RESULTS_MESSAGE.to_string(),
            sources: Vec::new(),
            entity_path: Vec::new(),
            entities: Vec::new(),
            web_search_used,
            web_search_results,
        }
    }

    /// 치명적 에러를 결과 객체로 변환 (공개 경계에서 에러를 던지지 않음)
    pub fn degraded(reason: &str) -> Self {
        Self {
            relevant_context: format!("Error retrieving information: {}", reason),
            sources: vec![SourceEntry {
                id: "error".to_string(),
                score: 0.0,
                text: reason.to_string(),
                metadata: Map::new(),
                retrieval_method: None,
            }],
            entity_path: Vec::new(),
            entities: Vec::new(),
            web_search_used: false,
            web_search_results: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_defaults() {
        let options = RetrievalOptions::default();
        assert_eq!(options.top_k, 10);
        assert_eq!(options.entity_depth, 2);
        assert!(options.use_entity_enhancement);
        assert_eq!(options.max_results, 15);
        assert_eq!(options.max_context_length, 6000);
    }

    #[test]
    fn test_declared_entities_ignores_non_strings() {
        let mut metadata = Map::new();
        metadata.insert(
            META_ENTITIES.to_string(),
            json!(["population", 42, "residents"]),
        );
        let candidate = Candidate::new("a", 0.9, "text").with_metadata(metadata);
        assert_eq!(candidate.declared_entities(), vec!["population", "residents"]);

        let bare = Candidate::new("b", 0.9, "text");
        assert!(bare.declared_entities().is_empty());
    }

    #[test]
    fn test_mark_entity_search_dampens_and_tags() {
        let mut candidate = Candidate::new("a", 0.8, "text");
        candidate.mark_entity_search("harbor", 0.7);

        assert!((candidate.score - 0.56).abs() < 1e-6);
        assert!(candidate.is_entity_search());
        assert_eq!(candidate.metadata[META_ENTITY_SEARCH], json!(true));
        assert_eq!(candidate.metadata[META_ENTITY], json!("harbor"));
    }

    #[test]
    fn test_source_entry_carries_method() {
        let mut candidate = Candidate::new("a", 0.8, "text");
        candidate.mark_entity_search("harbor", 0.7);
        let source = SourceEntry::from(&candidate);

        assert_eq!(source.retrieval_method, Some(RetrievalMethod::EntitySearch));
        assert_eq!(source.metadata[META_RETRIEVAL_METHOD], json!("entity_search"));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = RetrievalResult::empty(false, None);
        let value = serde_json::to_value(&result).unwrap();

        assert!(value.get("relevantContext").is_some());
        assert_eq!(value["webSearchUsed"], json!(false));
        assert!(value.get("webSearchResults").is_none());
    }

    #[test]
    fn test_degraded_has_single_error_source() {
        let result = RetrievalResult::degraded("vector store not configured");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].id, "error");
        assert!(result.relevant_context.contains("vector store not configured"));
        assert!(result.entities.is_empty());
    }
}
