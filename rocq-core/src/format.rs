//! Proof-view parsing and plain-text rendering.
//!
//! The prover pushes `prover/proofView` notifications whose goals and
//! messages are pretty-print trees; parsing pre-renders every focused goal
//! into its display block so formatting later is pure string assembly.

use lsp_types::{Diagnostic, DiagnosticSeverity};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::ppcmd;
use crate::{Goal, ProofView};

/// Horizontal rule between hypotheses and conclusion.
const GOAL_SEPARATOR: &str = "  ────────────────────\n";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProofViewParams {
    proof: RawProof,
    messages: Vec<Value>,
    pp_messages: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProof {
    goals: Vec<RawGoal>,
    #[serde(rename = "shelvedGoals")]
    shelved_goals: Vec<Value>,
    #[serde(rename = "givenUpGoals")]
    given_up_goals: Vec<Value>,
    #[serde(rename = "unfocusedGoals")]
    unfocused_goals: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGoal {
    id: Value,
    goal: Value,
    hypotheses: Vec<Value>,
}

/// Parse the params of a `prover/proofView` notification.
///
/// Returns `None` when the payload is not even envelope-shaped; the caller
/// logs and drops it.
pub fn parse_proof_view(params: &Value) -> Option<ProofView> {
    let raw: ProofViewParams = serde_json::from_value(params.clone()).ok()?;

    // The reported background subgoals include the focused goals.
    let focused = raw.proof.goals.len();
    let reported = raw.proof.unfocused_goals.len();
    if reported < focused {
        warn!(reported, focused, "prover reported fewer background subgoals than focused goals");
    }

    let mut view = ProofView {
        unfocused_count: reported.saturating_sub(focused),
        shelved_count: raw.proof.shelved_goals.len(),
        given_up_count: raw.proof.given_up_goals.len(),
        ..ProofView::default()
    };

    for g in &raw.proof.goals {
        let conclusion = ppcmd::render(&g.goal);
        let hyps: Vec<String> = g.hypotheses.iter().map(ppcmd::render).collect();
        view.goals.push(Goal {
            id: goal_id(&g.id),
            text: render_goal_text(&hyps, &conclusion),
        });
    }

    for m in &raw.messages {
        // Items are either a plain PP tree or a [severity, tree] pair.
        if let Some(text) = message_text(m) {
            view.messages.push(text);
        }
    }
    for m in &raw.pp_messages {
        // pp_messages items are [severity, tree].
        if let Some(arr) = m.as_array() {
            if arr.len() >= 2 {
                let text = ppcmd::render(&arr[1]);
                if !text.is_empty() {
                    view.messages.push(text);
                }
            }
        }
    }

    Some(view)
}

fn goal_id(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn message_text(m: &Value) -> Option<String> {
    if let Some(arr) = m.as_array() {
        if arr.len() >= 2 && arr[0].is_number() {
            let text = ppcmd::render(&arr[1]);
            return (!text.is_empty()).then_some(text);
        }
    }
    let text = ppcmd::render(m);
    (!text.is_empty()).then_some(text)
}

/// Render one goal body: indented hypotheses, separator, conclusion.
pub fn render_goal_text(hypotheses: &[String], conclusion: &str) -> String {
    let mut out = String::new();
    for h in hypotheses {
        out.push_str("  ");
        out.push_str(h);
        out.push('\n');
    }
    out.push_str(GOAL_SEPARATOR);
    out.push_str("  ");
    out.push_str(conclusion);
    out.push('\n');
    out
}

/// Non-zero background counts joined as "N unfocused, N shelved, N given up".
/// Empty when everything is zero.
pub fn background_summary(view: &ProofView) -> String {
    let mut parts = Vec::new();
    if view.unfocused_count > 0 {
        parts.push(format!("{} unfocused", view.unfocused_count));
    }
    if view.shelved_count > 0 {
        parts.push(format!("{} shelved", view.shelved_count));
    }
    if view.given_up_count > 0 {
        parts.push(format!("{} given up", view.given_up_count));
    }
    parts.join(", ")
}

#[derive(Clone, Copy)]
enum Style {
    /// check / check_all / get_proof_state.
    Full,
    /// step forward/backward: an emptied focus reads as sub-goal progress.
    Step,
}

/// Format the complete proof state (check, check_all, get_proof_state).
pub fn full(view: Option<&ProofView>, diagnostics: &[Diagnostic]) -> String {
    render(view, diagnostics, Style::Full)
}

/// Format a step reply. Identical to [`full`] except that zero focused
/// goals with background remaining reads "Sub-goal complete!".
pub fn step(view: Option<&ProofView>, diagnostics: &[Diagnostic]) -> String {
    render(view, diagnostics, Style::Step)
}

fn render(view: Option<&ProofView>, diagnostics: &[Diagnostic], style: Style) -> String {
    let mut out = String::new();

    if let Some(view) = view {
        let bg = background_summary(view);
        if view.goals.is_empty() {
            if bg.is_empty() {
                out.push_str("Proof complete!\n");
            } else {
                match style {
                    Style::Full => out.push_str(&format!("No focused goals. {bg} remaining.\n")),
                    Style::Step => out.push_str(&format!("Sub-goal complete! {bg} remaining.\n")),
                }
            }
        } else {
            write_goals(&mut out, &view.goals);
            if !bg.is_empty() {
                out.push_str(&format!("\n(+ {bg})\n"));
            }
        }

        if !view.messages.is_empty() {
            out.push_str("\n=== Messages ===\n");
            for m in &view.messages {
                out.push_str(m);
                out.push('\n');
            }
        }
    }

    push_diagnostics(&mut out, diagnostics);

    if out.is_empty() {
        out.push_str("No goals or diagnostics.");
    }
    out
}

fn write_goals(out: &mut String, goals: &[Goal]) {
    if goals.len() == 1 {
        out.push_str("Goal:\n");
        out.push_str(&goals[0].text);
        return;
    }
    for (i, g) in goals.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("Goal {} of {}:\n", i + 1, goals.len()));
        out.push_str(&g.text);
    }
}

fn push_diagnostics(out: &mut String, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    out.push_str("\n=== Diagnostics ===\n");
    for d in diagnostics {
        out.push_str(&diagnostic_line(d));
        out.push('\n');
    }
}

/// "[severity] line L:C–L:C: message" with 1-indexed lines.
pub fn diagnostic_line(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Some(DiagnosticSeverity::ERROR) => "error",
        Some(DiagnosticSeverity::WARNING) => "warning",
        Some(DiagnosticSeverity::HINT) => "hint",
        _ => "info",
    };
    format!(
        "[{severity}] line {}:{}–{}:{}: {}",
        d.range.start.line + 1,
        d.range.start.character,
        d.range.end.line + 1,
        d.range.end.character,
        d.message
    )
}

/// Summarize a `prover/documentProofs` reply: one block per proof with its
/// statement, line range and tactic list. The reply shape is not pinned by
/// the protocol, so anything unrecognized degrades to raw JSON.
pub fn document_proofs(result: &Value) -> String {
    let Some(proofs) = result.get("proofs").and_then(Value::as_array) else {
        return result.to_string();
    };
    if proofs.is_empty() {
        return "No proofs found.".to_string();
    }

    let mut out = format!("=== Proofs: {} ===\n", proofs.len());
    for p in proofs {
        let statement = p
            .get("statement")
            .and_then(Value::as_str)
            .unwrap_or("<unknown statement>");
        match proof_lines(p) {
            Some((start, end)) => {
                out.push_str(&format!("{statement} (lines {start}–{end})\n"));
            }
            None => {
                out.push_str(statement);
                out.push('\n');
            }
        }
        let tactics: Vec<&str> = p
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| s.get("tactic").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        if !tactics.is_empty() {
            out.push_str(&format!("  {}\n", tactics.join(" ")));
        }
    }
    out
}

fn proof_lines(proof: &Value) -> Option<(u64, u64)> {
    let range = proof.get("range")?;
    let start = range.get("start")?.get("line")?.as_u64()?;
    let end = range.get("end")?.get("line")?.as_u64()?;
    Some((start + 1, end + 1))
}
