//! 엔티티 추출 - 휴리스틱 토큰 필터
//!
//! NER 모델 없이 공백 분할 + 소문자화 + 불용어 필터로 "엔티티" 후보를 만듭니다.
//! 쿼리 시점과 수집 시점이 같은 `StopWords` 정책을 공유합니다.

use std::collections::HashSet;
use std::sync::Arc;

use super::types::Candidate;

/// 기본 불용어 목록
///
/// 관사, 전치사, 대명사, 조동사, 의문사, 질의에 흔한 군더더기 단어.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    // 관사 / 접속사 / 전치사
    "the", "and", "for", "but", "nor", "yet", "with", "from", "into", "onto", "over", "under",
    "about", "above", "below", "after", "before", "between", "through", "during", "within",
    "without", "against", "among", "across", "along", "around", "behind", "beyond", "toward",
    "towards", "upon", "until", "since", "while", "because", "though", "although", "unless",
    // 대명사 / 한정사
    "this", "that", "these", "those", "they", "them", "their", "theirs", "there", "then",
    "than", "your", "yours", "ours", "mine", "hers", "itself", "some", "such", "only", "other",
    "others", "each", "every", "both", "either", "neither", "more", "most", "much", "many",
    "very", "just", "also", "same", "here",
    // 조동사 / be 동사
    "have", "having", "been", "being", "were", "will", "would", "could", "should", "shall",
    "might", "must", "does", "doing", "done", "make", "made",
    // 의문사
    "what", "when", "where", "which", "whom", "whose", "how", "why", "who",
    // 질의 군더더기
    "tell", "know", "find", "show", "give", "please", "like", "information", "explain",
    "describe", "list", "want", "need",
];

// ============================================================================
// StopWords
// ============================================================================

/// 공유 불용어 정책
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl StopWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// 설정값이 있으면 그 목록을, 없으면 기본 목록을 사용
    pub fn from_config(words: Option<&[String]>) -> Self {
        match words {
            Some(list) => Self::new(list),
            None => Self::default(),
        }
    }

    /// 대소문자 무시 포함 여부
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWords {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_WORDS.iter().copied())
    }
}

// ============================================================================
// EntitySet
// ============================================================================

/// 소문자 엔티티 집합 (처음 등장한 순서 유지)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySet {
    items: Vec<String>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 소문자로 정규화하여 추가. 새로 추가되면 true
    pub fn insert(&mut self, entity: &str) -> bool {
        let entity = entity.trim().to_lowercase();
        if entity.is_empty() || self.items.contains(&entity) {
            return false;
        }
        self.items.push(entity);
        true
    }

    /// 다른 집합을 뒤에 합칩니다.
    pub fn union_with(&mut self, other: &EntitySet) {
        for entity in &other.items {
            self.insert(entity);
        }
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.items.iter().any(|e| e.eq_ignore_ascii_case(entity))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

impl<S: AsRef<str>> FromIterator<S> for EntitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = EntitySet::new();
        for entity in iter {
            set.insert(entity.as_ref());
        }
        set
    }
}

impl<'a> IntoIterator for &'a EntitySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ============================================================================
// EntityExtractor
// ============================================================================

/// 엔티티 추출기
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    stop_words: Arc<StopWords>,
    limit: Option<usize>,
}

impl EntityExtractor {
    /// 상한 없는 추출기 (쿼리 시점)
    pub fn new(stop_words: Arc<StopWords>) -> Self {
        Self {
            stop_words,
            limit: None,
        }
    }

    /// 추출 개수 상한 지정 (수집 시점)
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// 텍스트에서 엔티티 추출
    ///
    /// 토큰 앞뒤 구두점은 떼어내고, 남은 토큰이 4글자 이상 ASCII 알파벳이며
    /// 불용어가 아니면 채택합니다.
    pub fn extract(&self, text: &str) -> EntitySet {
        let mut entities = EntitySet::new();

        for raw in text.split_whitespace() {
            if self.limit.is_some_and(|limit| entities.len() >= limit) {
                break;
            }

            let token = raw
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();

            if token.len() <= 3 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
                continue;
            }
            if self.stop_words.contains(&token) {
                continue;
            }

            entities.insert(&token);
        }

        entities
    }

    /// 후보 메타데이터에 미리 계산된 엔티티를 합집합으로 수집
    pub fn extract_from_candidates(&self, candidates: &[Candidate]) -> EntitySet {
        candidates
            .iter()
            .flat_map(|c| c.declared_entities())
            .collect()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(Arc::new(StopWords::default()))
    }
}

// ============================================================================
// Tests
// ============================================================================
