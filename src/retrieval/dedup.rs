//! 후보 중복 제거 (첫 등장 우선)

use std::collections::HashSet;

use super::types::Candidate;

/// ID 기준 중복 제거
///
/// 처음 등장한 후보를 그대로 남기고 입력 순서를 유지합니다.
/// 초기 검색 결과를 엔티티 검색 결과보다 앞에 두면
/// 양쪽에서 발견된 후보는 감쇠되지 않은 원래 점수를 유지합니다.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());

    candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_first_occurrence_wins() {
        let deduped = dedupe(vec![
            Candidate::new("a", 1.0, "first"),
            Candidate::new("a", 2.0, "second"),
        ]);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].score, 1.0);
        assert_eq!(deduped[0].text, "first");
    }

    #[test]
    fn test_order_preserved() {
        let deduped = dedupe(vec![
            Candidate::new("b", 0.5, ""),
            Candidate::new("a", 0.9, ""),
            Candidate::new("b", 0.1, ""),
            Candidate::new("c", 0.3, ""),
        ]);

        let ids: Vec<&str> = deduped.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty() {
        assert!(dedupe(Vec::new()).is_empty());
    }

    #[quickcheck]
    fn prop_ids_unique_and_first_kept(ids: Vec<u8>) -> bool {
        let candidates: Vec<Candidate> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| Candidate::new(format!("id{}", id % 8), i as f32, ""))
            .collect();

        let deduped = dedupe(candidates.clone());

        let unique: HashSet<&str> = deduped.iter().map(|c| c.id.as_str()).collect();
        if unique.len() != deduped.len() {
            return false;
        }

        deduped.iter().all(|kept| {
            candidates
                .iter()
                .find(|c| c.id == kept.id)
                .map(|first| first.score == kept.score)
                .unwrap_or(false)
        })
    }
}
