//! Answer synthesis and format coercion.
//!
//! The completion collaborator fuses retrieved text and execution rows into
//! a labeled Answer/Explanation/Confidence reply. The raw answer is then
//! coerced to the requested format family with a mandatory fallback chain:
//! a malformed completion must never fail the run when a structurally valid
//! answer is recoverable from execution rows.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::types::AgentState;
use crate::llm::Completion;
use crate::retrieval::RetrievedChunk;
use crate::sql::ExecutionResult;

/// Raw synthesis output before coercion
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub answer: String,
    pub explanation: String,
    /// Model-reported confidence; `None` when unparseable
    pub self_reported: Option<f64>,
}

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Produce the raw answer, explanation, and self-reported confidence
pub async fn synthesize(completion: &dyn Completion, state: &AgentState) -> SynthesisOutput {
    let docs_text = render_docs(&state.chunks);
    let results_text = render_execution(state.execution.as_ref());
    let question = &state.question;
    let format_hint = &state.format_hint;

    let prompt = format!(
        r#"Synthesize the final answer for this question.

Question: {question}

Retrieved Documents:
{docs_text}

SQL Query Results:
{results_text}

Required Format: {format_hint}

CRITICAL RULES:
1. If the format is 'int': the answer is a single integer
2. If the format is 'float': the answer is a decimal number (e.g. 123.45)
3. If the format contains '{{': the answer is a JSON object
4. If the format contains 'list': the answer is a JSON array
5. If SQL returned no rows, infer what you can from the documents
6. No markdown and no extra prose in the answer line

Reply with exactly three lines:
Answer: <answer in the required format>
Explanation: <1-2 sentence explanation>
Confidence: <number between 0.0 and 1.0>"#
    );

    match completion.complete(&prompt).await {
        Ok(raw) => parse_output(&raw),
        Err(e) => {
            warn!("Synthesis failed: {}", e);
            SynthesisOutput {
                answer: "0".to_string(),
                explanation: format!("Synthesis unavailable: {e}"),
                self_reported: Some(0.0),
            }
        }
    }
}

/// Render chunks for the prompt, or an explicit no-documents marker
fn render_docs(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No documents retrieved".to_string();
    }
    chunks
        .iter()
        .map(|chunk| format!("[{}]: {}", chunk.id, chunk.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render execution rows, a no-rows note, or the classified error
fn render_execution(execution: Option<&ExecutionResult>) -> String {
    match execution {
        None => "No SQL executed".to_string(),
        Some(result) if result.success => {
            if result.rows.is_empty() {
                "SQL executed successfully but returned no rows".to_string()
            } else {
                serde_json::to_string_pretty(&result.rows)
                    .unwrap_or_else(|_| "SQL rows unavailable".to_string())
            }
        }
        Some(result) => format!(
            "SQL Error: {}",
            result.error.as_deref().unwrap_or("Unknown error")
        ),
    }
}

/// Lenient parse of the labeled reply. With no labels present the whole
/// text is the answer and the self-report is unparseable.
fn parse_output(raw: &str) -> SynthesisOutput {
    const LABELS: [&str; 3] = ["answer:", "explanation:", "confidence:"];
    let mut sections: [Option<String>; 3] = [None, None, None];
    let mut current: Option<usize> = None;

    for line in raw.lines() {
        let lowered = line.trim_start().to_lowercase();
        let labeled = LABELS
            .iter()
            .enumerate()
            .find_map(|(idx, label)| strip_label(line, &lowered, label).map(|rest| (idx, rest)));

        match labeled {
            Some((idx, rest)) => {
                sections[idx] = Some(rest);
                current = Some(idx);
            }
            None => {
                if let Some(section) = current.and_then(|idx| sections[idx].as_mut()) {
                    section.push('\n');
                    section.push_str(line);
                }
            }
        }
    }

    let [answer, explanation, confidence_text] = sections;

    let self_reported = confidence_text
        .as_deref()
        .and_then(|text| DECIMAL.find(text))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    SynthesisOutput {
        answer: answer.map(|s| s.trim().to_string()).unwrap_or_else(|| raw.trim().to_string()),
        explanation: explanation.map(|s| s.trim().to_string()).unwrap_or_default(),
        self_reported,
    }
}

fn strip_label(line: &str, lowered: &str, label: &str) -> Option<String> {
    if !lowered.starts_with(label) {
        return None;
    }
    let start = line.len() - line.trim_start().len();
    line.get(start + label.len()..)
        .map(|rest| rest.trim().to_string())
}

// ============================================================================
// Format coercion
// ============================================================================

/// Declared shape family of the final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormatKind {
    Int,
    Float,
    Object,
    List,
    Text,
}

impl FormatKind {
    fn parse(hint: &str) -> Self {
        let hint = hint.trim();
        if hint == "int" {
            Self::Int
        } else if hint == "float" {
            Self::Float
        } else if hint.starts_with('{') {
            Self::Object
        } else if hint.starts_with("list") {
            Self::List
        } else {
            Self::Text
        }
    }
}

/// Coerce the raw answer to the requested format family.
///
/// Every branch has a typed fallback, so the result is always present and
/// always matches the hint's shape family.
pub fn coerce_answer(
    raw: &str,
    format_hint: &str,
    execution: Option<&ExecutionResult>,
) -> Value {
    let cleaned = strip_fences(raw);

    match FormatKind::parse(format_hint) {
        FormatKind::Int => INTEGER
            .find(&cleaned)
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| Value::from(0)),

        FormatKind::Float => DECIMAL
            .find(&cleaned)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .or_else(|| first_numeric(execution))
            .map(|v| Value::from(round2(v)))
            .unwrap_or_else(|| Value::from(0.0)),

        FormatKind::Object => match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Object(map)) => Value::Object(map),
            _ => execution
                .and_then(|result| result.rows.first())
                .map(|row| Value::Object(row.clone()))
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        },

        FormatKind::List => match serde_json::from_str::<Value>(&cleaned) {
            Ok(Value::Array(items)) => Value::Array(items),
            _ => {
                let rows: Vec<Value> = execution
                    .map(|result| {
                        result
                            .rows
                            .iter()
                            .map(|row| Value::Object(row.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Array(rows)
            }
        },

        FormatKind::Text => Value::String(cleaned),
    }
}

/// First numeric value in the first execution row, in column order
fn first_numeric(execution: Option<&ExecutionResult>) -> Option<f64> {
    execution?
        .rows
        .first()?
        .values()
        .find_map(|value| value.as_f64())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn strip_fences(raw: &str) -> String {
    let mut s = raw.trim();
    for prefix in ["```json", "```sql", "```"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim().to_string()
}
