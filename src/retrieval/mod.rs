//! Retrieval 모듈 - 엔티티 인식 검색 파이프라인
//!
//! - EntityExtractor: 휴리스틱 토큰 필터 기반 엔티티 추출
//! - SufficiencyGate: 웹 검색 보강 필요 여부 판정
//! - EntityExpansionSearch: 엔티티 단위 보조 벡터 검색
//! - EntityOverlapReranker: 엔티티 출현 횟수 기반 재순위
//! - ContextAssembler: 길이 제한 컨텍스트 조립
//! - RetrievalPipeline: 위 단계를 순서대로 실행

mod context;
mod dedup;
mod entity;
mod expansion;
mod pipeline;
mod rerank;
mod sufficiency;
mod types;

// Re-exports
pub use context::{AssembledContext, ContextAssembler};
pub use dedup::dedupe;
pub use entity::{EntityExtractor, EntitySet, StopWords, DEFAULT_STOP_WORDS};
pub use expansion::EntityExpansionSearch;
pub use pipeline::RetrievalPipeline;
pub use rerank::{EntityOverlapReranker, DEFAULT_BOOST_WEIGHT};
pub use sufficiency::{SufficiencyGate, DEFAULT_SUFFICIENCY_THRESHOLD};
pub use types::{
    Candidate, EntityPathEntry, RetrievalMethod, RetrievalOptions, RetrievalResult, SourceEntry,
    META_BOOSTED_SCORE, META_ENTITIES, META_ENTITY, META_ENTITY_SCORE, META_ENTITY_SEARCH,
    META_RETRIEVAL_METHOD, NO_RESULTS_MESSAGE,
};
