//! 파이프라인 에러 분류
//!
//! 외부 협력자(임베딩, 벡터 저장소, 웹 검색) 계층은 `anyhow::Result`를 반환하고,
//! 파이프라인은 이를 아래 분류로 변환하여 호출 지점별로 복구 여부를 결정합니다.

use std::time::Duration;

use thiserror::Error;

/// 검색 파이프라인 에러
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// 필수 협력자(벡터 저장소) 미설정 - 치명적
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 선택적 협력자(웹 검색) 사용 불가 - 로컬 결과만으로 진행
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// 임베딩/쿼리/업서트 호출 실패
    #[error("{stage} failed: {source:#}")]
    Transient {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// 전체 요청 데드라인 초과
    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

impl RetrievalError {
    /// `anyhow` 에러를 단계 이름과 함께 Transient로 감쌉니다.
    pub fn transient(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Transient { stage, source }
    }

    /// 호출 지점에서 건너뛰고 계속 진행할 수 있는 에러인지 여부
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable(_) | Self::Transient { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(!RetrievalError::Configuration("no store".into()).is_recoverable());
        assert!(RetrievalError::CollaboratorUnavailable("web".into()).is_recoverable());
        assert!(RetrievalError::transient("embed", anyhow::anyhow!("boom")).is_recoverable());
        assert!(!RetrievalError::Timeout(Duration::from_secs(1)).is_recoverable());
    }

    #[test]
    fn test_transient_message_includes_stage() {
        let err = RetrievalError::transient("vector query", anyhow::anyhow!("connection reset"));
        let msg = err.to_string();
        assert!(msg.contains("vector query"));
        assert!(msg.contains("connection reset"));
    }
}
