//! Question normalization and usability rules
//!
//! Everything here is pure: no I/O, no clock, no randomness.

use crate::tree::models::Node;
use std::fmt;

/// Maximum question length, in Unicode code points (terminal mark included)
pub const MAX_QUESTION_CHARS: usize = 30;

/// Full-width interrogative mark every question ends with
pub const QUESTION_MARK: char = '？';

const QUOTE_CHARS: &[char] = &['「', '」', '『', '』', '"', '\'', '“', '”', '‘', '’', '`'];

/// Keywords that already read as a method or an example
const CONCRETE_DETAIL_KEYWORDS: &[&str] = &["具体", "例", "例えば", "ケース", "手順", "方法", "やり方"];

/// Frequency, time and unit words
const CONCRETE_MEASURE_KEYWORDS: &[&str] = &[
    "毎日", "毎週", "毎月", "週", "回", "時間", "分", "朝", "夜", "午前", "午後", "km", "kg",
];

/// Phrasings that ask the user for more detail
const CONCRETE_PROBE_KEYWORDS: &[&str] = &["具体", "詳細", "どのように", "どんな手順"];

/// Why a candidate question was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooLong,
    MissingQuestionMark,
    DuplicateOfSibling,
    ConcreteProbeOnConcreteParent,
    RestatesContent,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "empty question",
            Self::TooLong => "question exceeds length budget",
            Self::MissingQuestionMark => "question does not end with the interrogative mark",
            Self::DuplicateOfSibling => "question duplicates a sibling question",
            Self::ConcreteProbeOnConcreteParent => "asks for detail on an already concrete parent",
            Self::RestatesContent => "question restates parent or ancestor content",
        };
        f.write_str(reason)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Canonicalize raw oracle output into a single question.
///
/// Returns "" only when `raw` has no non-whitespace content. Otherwise the
/// result ends with exactly one "？" and is at most [`MAX_QUESTION_CHARS`]
/// code points. Idempotent.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let first_line = trimmed.lines().next().unwrap_or_default();
    let unquoted = first_line.trim_matches(|c: char| c.is_whitespace() || QUOTE_CHARS.contains(&c));
    let converted = unquoted.replace('?', "？");

    let body = trim_body_end(&converted);
    let budget = MAX_QUESTION_CHARS - 1;
    let body = if body.chars().count() > budget {
        let cut: String = body.chars().take(budget).collect();
        trim_body_end(&cut).to_string()
    } else {
        body.to_string()
    };

    let mut question = body;
    question.push(QUESTION_MARK);
    question
}

/// Strip trailing marks, quotes and whitespace from a question body
fn trim_body_end(text: &str) -> &str {
    text.trim_end_matches(|c: char| {
        c == QUESTION_MARK || c.is_whitespace() || QUOTE_CHARS.contains(&c)
    })
}

/// Content comparison form: trimmed, one terminal mark removed
pub fn normalize_plain_text(text: &str) -> &str {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_suffix(QUESTION_MARK)
        .or_else(|| trimmed.strip_suffix('?'))
        .unwrap_or(trimmed);
    stripped.trim()
}

// ============================================================================
// Heuristics
// ============================================================================

/// Whether goal content already reads as specific: a detail/method keyword,
/// a digit, or a frequency/time/unit word.
pub fn parent_seems_concrete(content: &str) -> bool {
    let text = content.trim();
    if text.is_empty() {
        return false;
    }
    contains_any(text, CONCRETE_DETAIL_KEYWORDS)
        || text.chars().any(is_digit)
        || contains_any(text, CONCRETE_MEASURE_KEYWORDS)
}

/// Whether a question asks the user to get more specific
pub fn is_concrete_probe(question: &str) -> bool {
    contains_any(question, CONCRETE_PROBE_KEYWORDS)
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

fn contains_any(content: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| content.contains(kw))
}

// ============================================================================
// Usability
// ============================================================================

/// Check a normalized question against the structural and contextual rules.
pub fn check_question(
    question: &str,
    parent: &Node,
    ancestors: &[Node],
    siblings: &[Node],
) -> Result<(), Rejection> {
    let trimmed = question.trim();
    if normalize_plain_text(trimmed).is_empty() {
        return Err(Rejection::Empty);
    }
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return Err(Rejection::TooLong);
    }
    if !trimmed.ends_with(QUESTION_MARK) {
        return Err(Rejection::MissingQuestionMark);
    }
    if is_duplicate_question(trimmed, siblings) {
        return Err(Rejection::DuplicateOfSibling);
    }
    if parent_seems_concrete(&parent.content) && is_concrete_probe(trimmed) {
        return Err(Rejection::ConcreteProbeOnConcreteParent);
    }
    if is_overlapping_content(trimmed, parent, ancestors) {
        return Err(Rejection::RestatesContent);
    }
    Ok(())
}

/// Boolean form of [`check_question`].
pub fn is_usable(question: &str, parent: &Node, ancestors: &[Node], siblings: &[Node]) -> bool {
    check_question(question, parent, ancestors, siblings).is_ok()
}

fn is_duplicate_question(question: &str, siblings: &[Node]) -> bool {
    siblings
        .iter()
        .filter_map(|n| n.question_text())
        .any(|q| q == question)
}

fn is_overlapping_content(question: &str, parent: &Node, ancestors: &[Node]) -> bool {
    let question_text = normalize_plain_text(question);
    if question_text.is_empty() {
        return false;
    }
    std::iter::once(parent)
        .chain(ancestors.iter())
        .map(|n| normalize_plain_text(&n.content))
        .any(|content| !content.is_empty() && content == question_text)
}
