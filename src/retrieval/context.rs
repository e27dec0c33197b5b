//! 컨텍스트 조립
//!
//! 최종 순서(재순위, 중복 제거 후)대로 후보를 훑어 길이 제한 안에서
//! 엔티티와 관련된 청크만 이어 붙입니다. 길이는 문자(char) 단위이며
//! 청크 사이 구분자 "\n\n"도 길이에 포함됩니다.

use super::entity::EntitySet;
use super::types::{Candidate, SourceEntry};

const SEPARATOR: &str = "\n\n";
const ELLIPSIS: &str = "...";

/// 조립 결과
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub context: String,
    /// 전체 후보 목록에서 만든 출처 (컨텍스트 필터와 무관, `max_results` 이하)
    pub sources: Vec<SourceEntry>,
    /// 컨텍스트에 실제로 들어간 청크 수
    pub fragments: usize,
}

/// 컨텍스트 조립기
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    min_chunk_chars: usize,
    truncation_slack: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            min_chunk_chars: 50,
            truncation_slack: 200,
        }
    }
}

impl ContextAssembler {
    pub fn new(min_chunk_chars: usize, truncation_slack: usize) -> Self {
        Self {
            min_chunk_chars,
            truncation_slack,
        }
    }

    /// 컨텍스트 조립
    ///
    /// 엔티티 집합이 비어있으면 관련성 필터를 적용하지 않습니다.
    /// 공간이 모자라면 남은 공간이 `truncation_slack`보다 클 때만 잘라서 넣고,
    /// 어느 쪽이든 거기서 멈춥니다.
    pub fn assemble(
        &self,
        candidates: &[Candidate],
        entities: &EntitySet,
        max_results: usize,
        max_context_length: usize,
    ) -> AssembledContext {
        let mut context = String::new();
        let mut length = 0usize;
        let mut fragments = 0usize;

        for candidate in candidates {
            if fragments >= max_results {
                break;
            }

            let text = candidate.text.as_str();
            if text.trim().is_empty() {
                continue;
            }

            let text_len = text.chars().count();
            if text_len < self.min_chunk_chars {
                continue;
            }

            if !entities.is_empty() {
                let lower = text.to_lowercase();
                if !entities.iter().any(|e| lower.contains(e.as_str())) {
                    continue;
                }
            }

            let separator_len = if context.is_empty() { 0 } else { SEPARATOR.len() };

            if length + separator_len + text_len > max_context_length {
                let remaining = max_context_length.saturating_sub(length + separator_len);
                if remaining > self.truncation_slack && remaining > ELLIPSIS.len() {
                    if separator_len > 0 {
                        context.push_str(SEPARATOR);
                    }
                    context.extend(text.chars().take(remaining - ELLIPSIS.len()));
                    context.push_str(ELLIPSIS);
                    fragments += 1;
                }
                break;
            }

            if separator_len > 0 {
                context.push_str(SEPARATOR);
            }
            context.push_str(text);
            length += separator_len + text_len;
            fragments += 1;
        }

        let sources = candidates
            .iter()
            .take(max_results)
            .map(SourceEntry::from)
            .collect();

        AssembledContext {
            context,
            sources,
            fragments,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RetrievalMethod;
    use quickcheck_macros::quickcheck;

    const RIVERDALE: &str = "Riverdale Heights is a small town. Current population is approximately 2,500 residents.";

    fn entities(items: &[&str]) -> EntitySet {
        items.iter().copied().collect()
    }

    fn chunk(id: &str, words: usize, word: &str) -> Candidate {
        let text = vec![word; words].join(" ");
        Candidate::new(id, 0.8, text)
    }

    #[test]
    fn test_includes_relevant_chunk() {
        let candidates = vec![Candidate::new("c1", 0.9, RIVERDALE)];
        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["population"]), 15, 6000);

        assert_eq!(assembled.context, RIVERDALE);
        assert_eq!(assembled.fragments, 1);
        assert_eq!(assembled.sources.len(), 1);
    }

    #[test]
    fn test_filters_short_and_irrelevant_but_keeps_sources() {
        let candidates = vec![
            Candidate::new("short", 0.9, "population tiny"),
            Candidate::new("off-topic", 0.9, "x".repeat(80)),
            Candidate::new("empty", 0.9, "   "),
            Candidate::new("good", 0.5, RIVERDALE),
        ];
        let assembled = ContextAssembler::default().assemble(
            &candidates,
            &entities(&["population"]),
            15,
            6000,
        );

        assert_eq!(assembled.context, RIVERDALE);
        assert_eq!(assembled.fragments, 1);
        assert_eq!(assembled.sources.len(), 4);
    }

    #[test]
    fn test_relevance_is_case_insensitive_substring() {
        let candidates = vec![Candidate::new("c1", 0.9, RIVERDALE.to_uppercase())];
        let assembled = ContextAssembler::default().assemble(
            &candidates,
            &entities(&["riverdale"]),
            15,
            6000,
        );
        assert_eq!(assembled.fragments, 1);
    }

    #[test]
    fn test_empty_entities_skip_relevance_filter() {
        let candidates = vec![Candidate::new("c1", 0.9, "x".repeat(60))];
        let assembled =
            ContextAssembler::default().assemble(&candidates, &EntitySet::new(), 15, 6000);
        assert_eq!(assembled.fragments, 1);
    }

    #[test]
    fn test_separator_between_chunks() {
        let candidates = vec![chunk("a", 20, "harbor"), chunk("b", 20, "harbor")];
        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["harbor"]), 15, 6000);

        assert_eq!(assembled.fragments, 2);
        assert_eq!(assembled.context.matches(SEPARATOR).count(), 1);
    }

    #[test]
    fn test_truncates_with_ellipsis_then_stops() {
        // 각 청크 699자
        let candidates = vec![
            chunk("a", 100, "harbor"),
            chunk("b", 100, "harbor"),
            chunk("c", 100, "harbor"),
        ];
        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["harbor"]), 15, 1000);

        assert_eq!(assembled.fragments, 2);
        assert!(assembled.context.ends_with(ELLIPSIS));
        assert_eq!(assembled.context.chars().count(), 1000);
    }

    #[test]
    fn test_small_remainder_is_dropped() {
        let candidates = vec![chunk("a", 100, "harbor"), chunk("b", 100, "harbor")];
        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["harbor"]), 15, 800);

        // 남은 공간 99자 < 200
        assert_eq!(assembled.fragments, 1);
        assert!(!assembled.context.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_max_results_caps_fragments_and_sources() {
        let candidates: Vec<Candidate> = (0..5)
            .map(|i| chunk(&format!("c{}", i), 10, "harbor"))
            .collect();
        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["harbor"]), 2, 6000);

        assert_eq!(assembled.fragments, 2);
        assert_eq!(assembled.sources.len(), 2);
    }

    #[test]
    fn test_sources_carry_provenance() {
        let mut expanded = chunk("e", 10, "harbor");
        expanded.mark_entity_search("harbor", 0.7);
        let candidates = vec![chunk("v", 10, "harbor"), expanded];

        let assembled =
            ContextAssembler::default().assemble(&candidates, &entities(&["harbor"]), 15, 6000);

        assert_eq!(
            assembled.sources[0].retrieval_method,
            Some(RetrievalMethod::VectorSimilarity)
        );
        assert_eq!(
            assembled.sources[1].retrieval_method,
            Some(RetrievalMethod::EntitySearch)
        );
    }

    #[quickcheck]
    fn prop_ceilings_never_exceeded(
        lengths: Vec<u8>,
        max_results: u8,
        max_context: u16,
    ) -> bool {
        let candidates: Vec<Candidate> = lengths
            .iter()
            .enumerate()
            .map(|(i, n)| chunk(&format!("c{}", i), *n as usize, "harbor"))
            .collect();

        let max_results = max_results as usize % 20;
        let max_context = max_context as usize % 4000;
        let assembled = ContextAssembler::default().assemble(
            &candidates,
            &entities(&["harbor"]),
            max_results,
            max_context,
        );

        assembled.context.chars().count() <= max_context
            && assembled.fragments <= max_results
            && assembled.sources.len() <= max_results
    }
}
