//! Batch driver.
//!
//! Reads questions from a JSONL file, invokes the orchestrator once per
//! question, and writes one JSONL result per line. No orchestration logic
//! lives here: a line that cannot even be parsed is recorded as a
//! null-answer result with zero confidence so the batch always completes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::agent::Agent;

/// One input question
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question: String,
    pub format_hint: String,
}

/// One output record
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub id: String,
    pub final_answer: Value,
    pub sql: String,
    pub confidence: f64,
    pub explanation: String,
    pub citations: Vec<String>,
}

impl AnswerRecord {
    /// Record written when a line never reaches the orchestrator
    fn null_answer(id: String, reason: &str) -> Self {
        Self {
            id,
            final_answer: Value::Null,
            sql: String::new(),
            confidence: 0.0,
            explanation: format!("Failed before orchestration: {reason}"),
            citations: Vec::new(),
        }
    }
}

/// Summary counters for one batch invocation
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSummary {
    pub answered: usize,
    pub failed: usize,
}

/// Process every question in `input`, writing results to `output`
pub async fn run_batch(agent: &Agent, input: &Path, output: &Path) -> Result<BatchSummary> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading batch input {}", input.display()))?;

    let mut summary = BatchSummary::default();
    let mut lines = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<QuestionRecord>(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Line {}: unparseable question record: {}", line_no + 1, e);
                summary.failed += 1;
                // Salvage the id if the line is at least JSON
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
                    .unwrap_or_else(|| format!("line-{}", line_no + 1));
                lines.push(serde_json::to_string(&AnswerRecord::null_answer(
                    id,
                    "invalid input record",
                ))?);
                continue;
            }
        };

        info!("[{}] {}", record.id, record.question);
        let result = agent.run(&record.question, &record.format_hint).await;

        lines.push(serde_json::to_string(&AnswerRecord {
            id: record.id,
            final_answer: result.final_answer,
            sql: result.sql,
            confidence: result.confidence,
            explanation: result.explanation,
            citations: result.citations,
        })?);
        summary.answered += 1;
    }

    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    std::fs::write(output, body)
        .with_context(|| format!("writing batch output {}", output.display()))?;

    info!(
        "Batch complete: {} answered, {} failed",
        summary.answered, summary.failed
    );
    Ok(summary)
}
