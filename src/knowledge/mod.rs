//! Knowledge 모듈 - 벡터 지식 저장소
//!
//! - VectorStore: 저장소 트레이트 (LanceDB, 인메모리)
//! - VectorSearchClient: 파이프라인용 인덱스 단위 어댑터
//! - Chunker: Markdown 인식 텍스트 분할
//! - Ingestor: 문서/웹 결과 수집

mod chunker;
mod client;
mod ingest;
mod lance;
mod memory;
mod vector;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, ParagraphChunker, TextChunk};
pub use client::VectorSearchClient;
pub use ingest::{IngestReport, Ingestor, WebStorageReport, WEB_SOURCE};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;
pub use vector::{cosine_similarity, StoredHit, VectorDocument, VectorStore};
