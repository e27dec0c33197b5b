//! 엔티티 중첩 재순위
//!
//! 후보 텍스트에 쿼리 엔티티가 몇 번 등장하는지 세어 점수를 가산합니다.
//!
//! boostedScore = score + entityScore * boost_weight

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::entity::EntitySet;
use super::types::{Candidate, META_BOOSTED_SCORE, META_ENTITY_SCORE};

/// 기본 가산치 (엔티티 출현 1회당)
pub const DEFAULT_BOOST_WEIGHT: f32 = 0.1;

/// 엔티티 중첩 재순위기
#[derive(Debug, Clone, Copy)]
pub struct EntityOverlapReranker {
    boost_weight: f32,
}

impl EntityOverlapReranker {
    pub fn new(boost_weight: f32) -> Self {
        Self { boost_weight }
    }

    /// 재순위
    ///
    /// 엔티티가 비어있으면 입력을 그대로 반환합니다.
    /// `score` 자체는 바꾸지 않고 `entityScore`, `boostedScore`를 메타데이터에 기록하며,
    /// 정렬은 boostedScore 내림차순(동점은 입력 순서 유지)입니다.
    pub fn rerank(&self, candidates: Vec<Candidate>, entities: &EntitySet) -> Vec<Candidate> {
        if entities.is_empty() {
            return candidates;
        }

        let patterns = compile_patterns(entities);

        let mut scored: Vec<(f32, Candidate)> = candidates
            .into_iter()
            .map(|mut candidate| {
                let entity_score = count_occurrences(&patterns, &candidate.text);
                let boosted = candidate.score + entity_score as f32 * self.boost_weight;

                candidate
                    .metadata
                    .insert(META_ENTITY_SCORE.to_string(), Value::from(entity_score));
                candidate
                    .metadata
                    .insert(META_BOOSTED_SCORE.to_string(), Value::from(boosted));

                (boosted, candidate)
            })
            .collect();

        // sort_by는 안정 정렬
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        scored.into_iter().map(|(_, c)| c).collect()
    }
}

impl Default for EntityOverlapReranker {
    fn default() -> Self {
        Self::new(DEFAULT_BOOST_WEIGHT)
    }
}

/// 엔티티별 단어 경계 패턴 생성 (대소문자 무시)
///
/// 메타데이터에서 온 엔티티는 임의 문자를 포함할 수 있으므로 반드시 escape합니다.
/// 단어 문자로 끝나는 쪽에만 `\b`를 붙입니다.
fn compile_patterns(entities: &EntitySet) -> Vec<Regex> {
    entities
        .iter()
        .filter_map(|entity| {
            let first_is_word = entity.chars().next().is_some_and(is_word_char);
            let last_is_word = entity.chars().last().is_some_and(is_word_char);

            let pattern = format!(
                "{}{}{}",
                if first_is_word { r"\b" } else { "" },
                regex::escape(entity),
                if last_is_word { r"\b" } else { "" },
            );

            match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!("Skipping entity '{}' in rerank: {}", entity, e);
                    None
                }
            }
        })
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 모든 엔티티의 출현 횟수 합계
fn count_occurrences(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(text).count()).sum()
}

// ============================================================================
// Tests
// ============================================================================
