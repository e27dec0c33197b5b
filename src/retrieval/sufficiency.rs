//! 충분성 게이트 - 웹 검색 보강 필요 여부 판단

use super::types::Candidate;

/// 기본 임계값
pub const DEFAULT_SUFFICIENCY_THRESHOLD: f32 = 0.7;

/// 초기 검색 결과가 충분한지 판단
///
/// 결과가 비어있지 않고, 임계값을 *초과*하는 후보가 하나라도 있으면 충분합니다.
#[derive(Debug, Clone, Copy)]
pub struct SufficiencyGate {
    threshold: f32,
}

impl SufficiencyGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_sufficient(&self, candidates: &[Candidate]) -> bool {
        candidates.iter().any(|c| c.score > self.threshold)
    }
}

impl Default for SufficiencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFICIENCY_THRESHOLD)
    }
}
