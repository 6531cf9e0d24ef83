//! Prompt builders for the question oracle
//!
//! All builders are pure functions of the tree context. Output is Japanese
//! plain text, one section per block, blank line between sections.

use crate::tree::context::TreeContext;
use crate::tree::models::{Edge, Node};
use std::fmt::Write;

const GENERATION_PREAMBLE: &str = "あなたは目標達成のための思考を促す質問を作るアシスタントです。\n\
以下の条件を満たす質問を1つだけ出力してください。\n";

const SELECTION_PREAMBLE: &str = "あなたは目標達成のための思考を促す質問を選ぶアシスタントです。\n\
以下の条件に最も合う質問を候補から1つだけ選び、候補の文言をそのまま出力してください。\n";

const REPAIR_PREAMBLE: &str = "次の質問文を条件に合うように修正してください。\n";

/// Rules shared by every prompt variant
const BASE_RULES: &[&str] = &[
    "日本語で、30字以内",
    "1文で、疑問符「？」で終える",
    "親ノードと同じ内容を聞かない",
    "兄弟ノードと同じ質問は避ける",
    "親が十分具体的なら、具体化を求める質問は避ける",
    "余計な説明や記号は出力しない",
];

/// Extra rule for free-text generation
const CONCISE_RULE: &str = "端的で自然な質問";

const NONE_LINE: &str = "- なし";
const EMPTY_CONTENT: &str = "(空)";

// ============================================================================
// Public builders
// ============================================================================

/// Free-text generation prompt.
pub fn build_question_prompt(ctx: &TreeContext) -> String {
    let mut prompt = String::from(GENERATION_PREAMBLE);
    push_rule_lines(&mut prompt, true);
    prompt.push('\n');
    push_context(&mut prompt, ctx);
    push_sibling_questions(&mut prompt, ctx);
    prompt
}

/// Selection prompt: the oracle must answer with one of `candidates` verbatim.
pub fn build_selection_prompt(ctx: &TreeContext, candidates: &[String]) -> String {
    let mut prompt = String::from(SELECTION_PREAMBLE);
    push_rule_lines(&mut prompt, false);
    prompt.push('\n');
    push_context(&mut prompt, ctx);

    prompt.push_str("候補:\n");
    if candidates.is_empty() {
        prompt.push_str(NONE_LINE);
        prompt.push('\n');
    }
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, candidate);
    }
    prompt
}

/// Repair prompt carrying the rejected oracle output.
pub fn build_repair_prompt(raw: &str, ctx: &TreeContext) -> String {
    let mut prompt = String::from(REPAIR_PREAMBLE);
    prompt.push_str("条件:\n");
    push_rule_lines(&mut prompt, false);
    prompt.push('\n');

    let _ = write!(prompt, "元の質問:\n{}\n\n", raw.trim());

    push_parent(&mut prompt, ctx);
    push_ancestors(&mut prompt, ctx);
    push_sibling_questions(&mut prompt, ctx);
    prompt
}

/// One-line rendering of a node and its incoming edge.
///
/// `内容: 走る / 質問: なぜ？ / 関係: why(理由)`
pub fn format_node_line(node: &Node, edge: Option<&Edge>) -> String {
    let content = node.content.trim();
    let mut line = format!(
        "内容: {}",
        if content.is_empty() { EMPTY_CONTENT } else { content }
    );
    if let Some(question) = node.question_text() {
        let _ = write!(line, " / 質問: {}", question);
    }
    if let Some(edge) = edge {
        let _ = write!(line, " / 関係: {}", edge.relation);
        if let Some(label) = edge.label_text() {
            let _ = write!(line, "({})", label);
        }
    }
    line
}

// ============================================================================
// Sections
// ============================================================================

fn push_rule_lines(prompt: &mut String, concise: bool) {
    for (i, rule) in BASE_RULES.iter().enumerate() {
        let _ = writeln!(prompt, "- {}", rule);
        // The concise rule sits right after the punctuation rule
        if concise && i == 1 {
            let _ = writeln!(prompt, "- {}", CONCISE_RULE);
        }
    }
}

fn push_context(prompt: &mut String, ctx: &TreeContext) {
    push_parent(prompt, ctx);
    push_ancestors(prompt, ctx);
    push_siblings(prompt, ctx);
}

fn push_parent(prompt: &mut String, ctx: &TreeContext) {
    prompt.push_str("親ノード:\n");
    let _ = writeln!(
        prompt,
        "- {}",
        format_node_line(&ctx.parent, ctx.edge_for(ctx.parent.id))
    );
    prompt.push('\n');
}

fn push_ancestors(prompt: &mut String, ctx: &TreeContext) {
    prompt.push_str("祖先ノード（親を除く、近い順）:\n");
    push_node_list(prompt, ctx, &ctx.ancestors);
}

fn push_siblings(prompt: &mut String, ctx: &TreeContext) {
    prompt.push_str("兄弟ノード（同じ親）:\n");
    push_node_list(prompt, ctx, &ctx.siblings);
}

fn push_node_list(prompt: &mut String, ctx: &TreeContext, nodes: &[Node]) {
    if nodes.is_empty() {
        prompt.push_str(NONE_LINE);
        prompt.push('\n');
    }
    for node in nodes {
        let _ = writeln!(prompt, "- {}", format_node_line(node, ctx.edge_for(node.id)));
    }
    prompt.push('\n');
}

fn push_sibling_questions(prompt: &mut String, ctx: &TreeContext) {
    prompt.push_str("兄弟ノードの質問一覧:\n");
    let questions = ctx.sibling_questions();
    if questions.is_empty() {
        prompt.push_str(NONE_LINE);
        prompt.push('\n');
    }
    for question in questions {
        let _ = writeln!(prompt, "- {}", question);
    }
}
