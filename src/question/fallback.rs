//! Deterministic, oracle-free question choice
//!
//! Policy: pick a thematic bucket from the parent's content ("purpose" when the
//! parent already reads as concrete, "general" otherwise), drop candidates a
//! sibling already uses, then index the remainder with an FNV-1a hash of the
//! parent content. The same parent content always yields the same question;
//! different parents spread across the bucket.

use crate::question::validate::{
    is_concrete_probe, normalize, normalize_plain_text, parent_seems_concrete,
};
use crate::tree::models::Node;
use std::collections::HashSet;

/// Candidates for a parent that is already specific: ask what it is for.
pub const PURPOSE_CANDIDATES: &[&str] = &[
    "この目標の目的は？",
    "得たい成果は何ですか？",
    "なぜそれをやりたい？",
    "成功の基準は？",
];

/// Candidates for an abstract parent: ask how to move forward.
pub const GENERAL_CANDIDATES: &[&str] = &[
    "最初にやる一歩は？",
    "進め方の工夫は？",
    "どこから始めますか？",
    "障害になりそうな点は？",
];

/// Returned only when a bucket has no candidates at all
pub const LAST_RESORT_QUESTION: &str = "その目的は何ですか？";

/// Thematic bucket a parent falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackFocus {
    Purpose,
    General,
}

impl FallbackFocus {
    pub fn for_content(content: &str) -> Self {
        if parent_seems_concrete(content) {
            Self::Purpose
        } else {
            Self::General
        }
    }
}

/// Hash-bucketed fallback chooser.
#[derive(Debug, Clone)]
pub struct FallbackChooser {
    purpose: Vec<String>,
    general: Vec<String>,
}

impl Default for FallbackChooser {
    fn default() -> Self {
        Self::new(
            PURPOSE_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            GENERAL_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl FallbackChooser {
    /// Build a chooser over custom candidate tables.
    ///
    /// Every entry is normalized into a question; entries without a body are
    /// dropped, as are duplicates that normalization produces.
    pub fn new(purpose: Vec<String>, general: Vec<String>) -> Self {
        let clean = |list: Vec<String>| -> Vec<String> {
            let mut seen = HashSet::new();
            list.iter()
                .map(|s| normalize(s))
                .filter(|q| !normalize_plain_text(q).is_empty())
                .filter(|q| seen.insert(q.clone()))
                .collect()
        };
        Self {
            purpose: clean(purpose),
            general: clean(general),
        }
    }

    /// The full candidate list of a bucket
    pub fn bucket(&self, focus: FallbackFocus) -> &[String] {
        match focus {
            FallbackFocus::Purpose => &self.purpose,
            FallbackFocus::General => &self.general,
        }
    }

    /// Bucket candidates not already used by a sibling, falling back to the
    /// whole bucket when every candidate is taken.
    pub fn available(&self, parent_content: &str, siblings: &[Node]) -> Vec<String> {
        let candidates = self.bucket(FallbackFocus::for_content(parent_content));
        let used: HashSet<&str> = siblings.iter().filter_map(|n| n.question_text()).collect();

        let filtered: Vec<String> = candidates
            .iter()
            .filter(|c| !used.contains(c.as_str()))
            .cloned()
            .collect();
        if filtered.is_empty() {
            candidates.to_vec()
        } else {
            filtered
        }
    }

    /// Candidates offered to the oracle in selection mode: the available set,
    /// without concreteness probes when the parent is already concrete.
    pub fn selection_candidates(&self, parent_content: &str, siblings: &[Node]) -> Vec<String> {
        let available = self.available(parent_content, siblings);
        if !parent_seems_concrete(parent_content) {
            return available;
        }
        let non_probe: Vec<String> = available
            .iter()
            .filter(|c| !is_concrete_probe(c))
            .cloned()
            .collect();
        if non_probe.is_empty() {
            available
        } else {
            non_probe
        }
    }

    /// Pick a question without consulting the oracle. Never fails.
    pub fn choose(&self, parent_content: &str, siblings: &[Node]) -> String {
        let available = self.available(parent_content, siblings);
        if available.is_empty() {
            return LAST_RESORT_QUESTION.to_string();
        }

        let index = hash_index(parent_content, available.len());
        let question = &available[index];
        if parent_seems_concrete(parent_content) && is_concrete_probe(question) {
            if let Some(candidate) = available.iter().find(|c| !is_concrete_probe(c)) {
                return candidate.clone();
            }
        }
        question.clone()
    }
}

/// 32-bit FNV-1a
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in bytes {
        h ^= *b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

fn hash_index(seed: &str, modulo: usize) -> usize {
    if modulo == 0 {
        return 0;
    }
    fnv1a_32(seed.as_bytes()) as usize % modulo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::validate::{is_usable, normalize, MAX_QUESTION_CHARS, QUESTION_MARK};
    use uuid::Uuid;

    fn node(content: &str, question: Option<&str>) -> Node {
        Node::new(Uuid::nil(), content.into(), question.map(String::from))
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_choose_is_deterministic() {
        let chooser = FallbackChooser::default();
        for content in ["健康になる", "毎日3kmランニングする", "", "英語を話せるようになる"] {
            let first = chooser.choose(content, &[]);
            for _ in 0..5 {
                assert_eq!(chooser.choose(content, &[]), first);
            }
        }
    }

    #[test]
    fn test_choose_uses_bucket_by_concreteness() {
        let chooser = FallbackChooser::default();
        let concrete = chooser.choose("毎日3kmランニングする", &[]);
        assert!(PURPOSE_CANDIDATES.contains(&concrete.as_str()));
        assert!(!is_concrete_probe(&concrete));

        let vague = chooser.choose("健康になる", &[]);
        assert!(GENERAL_CANDIDATES.contains(&vague.as_str()));
    }

    #[test]
    fn test_choose_index_matches_hash() {
        let chooser = FallbackChooser::default();
        let content = "健康になる";
        let expected = GENERAL_CANDIDATES[fnv1a_32(content.as_bytes()) as usize % 4];
        assert_eq!(chooser.choose(content, &[]), expected);
    }

    #[test]
    fn test_choose_skips_sibling_questions() {
        let chooser = FallbackChooser::default();
        let content = "健康になる";
        let first = chooser.choose(content, &[]);
        let siblings = vec![node("運動する", Some(&first))];
        let second = chooser.choose(content, &siblings);
        assert_ne!(first, second);
        assert!(GENERAL_CANDIDATES.contains(&second.as_str()));
    }

    #[test]
    fn test_choose_exhausted_bucket_falls_back_to_full_bucket() {
        let chooser = FallbackChooser::default();
        let siblings: Vec<Node> = GENERAL_CANDIDATES
            .iter()
            .map(|q| node("x", Some(q)))
            .collect();
        let question = chooser.choose("健康になる", &siblings);
        assert!(GENERAL_CANDIDATES.contains(&question.as_str()));
    }

    #[test]
    fn test_concrete_parent_never_gets_probe() {
        let chooser = FallbackChooser::new(
            vec!["具体的には何をしますか？".into(), "詳細は？".into(), "目的は？".into()],
            vec!["最初の一歩は？".into()],
        );
        for content in ["毎日3kmランニングする", "週2回泳ぐ", "朝5時に起きる", "手順を決める"] {
            let question = chooser.choose(content, &[]);
            assert_eq!(question, "目的は？", "content: {}", content);
        }
        assert_eq!(
            chooser.selection_candidates("毎日3kmランニングする", &[]),
            vec!["目的は？".to_string()]
        );
    }

    #[test]
    fn test_empty_bucket_returns_last_resort() {
        let chooser = FallbackChooser::new(vec![], vec!["  ".into()]);
        assert_eq!(chooser.choose("健康になる", &[]), LAST_RESORT_QUESTION);
        assert_eq!(chooser.choose("毎日走る", &[]), LAST_RESORT_QUESTION);
    }

    #[test]
    fn test_default_candidates_satisfy_contract() {
        let parent = node("健康になる", None);
        for candidate in PURPOSE_CANDIDATES.iter().chain(GENERAL_CANDIDATES) {
            assert_eq!(normalize(candidate), *candidate);
            assert!(is_usable(candidate, &parent, &[], &[]), "{}", candidate);
        }
        assert_eq!(normalize(LAST_RESORT_QUESTION), LAST_RESORT_QUESTION);
        // Purpose candidates are offered to concrete parents, so none may be a probe
        assert!(PURPOSE_CANDIDATES.iter().all(|c| !is_concrete_probe(c)));
    }

    #[test]
    fn test_choice_is_usable_against_siblings() {
        let chooser = FallbackChooser::default();
        let parent = node("毎日3kmランニングする", None);
        let siblings = vec![
            node("a", Some(PURPOSE_CANDIDATES[0])),
            node("b", Some(PURPOSE_CANDIDATES[1])),
        ];
        let question = chooser.choose(&parent.content, &siblings);
        assert!(is_usable(&question, &parent, &[], &siblings));
    }

    #[test]
    fn test_custom_candidates_are_normalized() {
        let long = "あ".repeat(42);
        let chooser = FallbackChooser::new(
            vec!["「目的は?」".into(), "目的は？".into(), "？".into()],
            vec![long.clone(), "次の一歩は".into(), " ? ".into()],
        );

        assert_eq!(chooser.bucket(FallbackFocus::Purpose), ["目的は？".to_string()]);
        let general = chooser.bucket(FallbackFocus::General);
        assert_eq!(general.len(), 2);
        assert_eq!(general[1], "次の一歩は？");

        for parent in ["健康になる", "英語を話す", "毎日走る", "本を読む"] {
            let question = chooser.choose(parent, &[]);
            assert!(question.chars().count() <= MAX_QUESTION_CHARS, "{}", question);
            assert!(question.ends_with(QUESTION_MARK), "{}", question);
        }
        assert_eq!(general[0], format!("{}？", "あ".repeat(MAX_QUESTION_CHARS - 1)));
    }
}
