//! Vector Store - 벡터 저장소 트레이트 및 유틸리티
//!
//! 저장소는 외부 협력자입니다. 파이프라인은 인덱스 생성, id 기준 업서트,
//! 코사인 유사도 top-K 쿼리만 요구합니다.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

// ============================================================================
// Types
// ============================================================================

/// 업서트용 문서 (임베딩 미리 계산됨)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    /// 고유 ID (같은 ID로 다시 업서트하면 덮어씀)
    pub id: String,
    /// 임베딩 벡터
    pub vector: Vec<f32>,
    /// 청크 텍스트
    pub text: String,
    /// 메타데이터 (출처, 엔티티 등)
    pub metadata: Map<String, Value>,
}

/// 쿼리 결과
#[derive(Debug, Clone, PartialEq)]
pub struct StoredHit {
    pub id: String,
    /// 코사인 유사도 (높을수록 유사)
    pub score: f32,
    pub text: String,
    pub metadata: Map<String, Value>,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 동시 요청 간 일관성(업서트 후 쿼리 가시성)은 구현체가 보장합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 인덱스 생성 (이미 있으면 무시)
    async fn create_index(&self, index: &str, dimension: usize) -> Result<()>;

    /// id 기준 업서트
    async fn upsert(&self, index: &str, documents: &[VectorDocument]) -> Result<usize>;

    /// `id_prefix`로 시작하면서 `keep`에 없는 문서 삭제
    async fn delete_stale(&self, index: &str, id_prefix: &str, keep: &[String]) -> Result<()>;

    /// 유사도 내림차순 top-K 쿼리
    async fn query(&self, index: &str, vector: &[f32], top_k: usize) -> Result<Vec<StoredHit>>;

    /// 저장된 벡터 수
    async fn count(&self, index: &str) -> Result<usize>;

    /// 저장소 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위이며, 길이가 다르거나 영벡터면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_same() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_mismatched_or_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
