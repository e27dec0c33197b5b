//! entity-rag - 엔티티 인식 RAG 검색 파이프라인
//!
//! 벡터 검색 결과를 휴리스틱 엔티티 추출과 엔티티 단위 재검색으로 확장하고,
//! 로컬 결과가 부족하면 웹 검색으로 보강한 뒤 엔티티 중첩으로 재순위하여
//! 길이 제한이 있는 컨텍스트를 조립합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod retrieval;
pub mod web;

// Re-exports
pub use config::{get_data_dir, RagConfig};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::RetrievalError;
pub use knowledge::{
    Ingestor, LanceVectorStore, MemoryVectorStore, VectorDocument, VectorSearchClient,
    VectorStore, WebStorageReport,
};
pub use retrieval::{
    Candidate, EntityExtractor, EntitySet, RetrievalOptions, RetrievalPipeline, RetrievalResult,
};
pub use web::{WebResult, WebSearchClient, WebSearchProvider, WebSearchRegistry};
