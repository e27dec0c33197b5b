//! 설정 모듈
//!
//! 데이터 디렉토리의 `config.toml`을 읽어 파이프라인 상수를 구성합니다.
//! 파일이 없으면 모든 값이 기본값으로 채워집니다.
//! API 키는 설정 파일이 아닌 환경변수에서만 읽습니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 데이터 디렉토리 오버라이드 환경변수
pub const DATA_DIR_ENV: &str = "ENTITY_RAG_DATA_DIR";

/// 설정 파일 이름
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.entity-rag/)
///
/// `ENTITY_RAG_DATA_DIR`가 설정되어 있으면 그 값을 사용합니다.
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".entity-rag")
}

// ============================================================================
// Config Sections
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub retrieval: RetrievalConfig,
    pub store: StoreConfig,
    pub entities: EntityConfig,
    pub web: WebConfig,
}

/// 검색 파이프라인 상수
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 이 점수를 넘는 결과가 하나라도 있으면 웹 검색 생략
    pub sufficiency_threshold: f32,
    /// 엔티티 검색 결과가 채택되기 위한 최소 원본 점수
    pub entity_score_threshold: f32,
    /// 엔티티 검색 전용 결과의 점수 감쇠 계수
    pub entity_dampening: f32,
    /// 엔티티 출현 1회당 점수 가산치
    pub entity_boost_weight: f32,
    /// 확장 검색에 사용할 최대 엔티티 수
    pub max_expansion_entities: usize,
    /// 엔티티당 확장 검색 결과 상한
    pub max_expansion_results: usize,
    /// 컨텍스트에 포함할 최소 청크 길이 (문자 수)
    pub min_chunk_chars: usize,
    /// 잘라서라도 넣을 최소 남은 공간 (문자 수)
    pub truncation_slack: usize,
    /// 자동 웹 검색 결과 수
    pub web_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            sufficiency_threshold: 0.7,
            entity_score_threshold: 0.7,
            entity_dampening: 0.7,
            entity_boost_weight: 0.1,
            max_expansion_entities: 3,
            max_expansion_results: 5,
            min_chunk_chars: 50,
            truncation_slack: 200,
            web_results: 5,
        }
    }
}

/// 벡터 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 인덱스(테이블) 이름
    pub index_name: String,
    /// 임베딩 차원
    pub dimension: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_name: "documents".to_string(),
            dimension: crate::embedding::DEFAULT_DIMENSION,
        }
    }
}

/// 엔티티 추출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// 불용어 목록 (없으면 기본 목록)
    pub stop_words: Option<Vec<String>>,
    /// 수집 시 청크당 최대 엔티티 수
    pub max_ingest_entities: usize,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            stop_words: None,
            max_ingest_entities: 10,
        }
    }
}

/// 웹 검색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// 사용할 프로바이더 이름 ("duckduckgo" | "tavily")
    pub provider: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl RagConfig {
    /// 기본 데이터 디렉토리에서 로드
    pub fn load() -> Result<Self> {
        Self::load_from(&get_data_dir().join(CONFIG_FILE_NAME))
    }

    /// 지정 경로에서 로드 (파일이 없으면 기본값)
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: RagConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 설정 파일 저장
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
