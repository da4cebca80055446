//! Question-answering orchestrator.
//!
//! Owns the per-run state and wires the stages into one state machine:
//! route, optionally retrieve, optionally generate-execute-repair SQL with a
//! bounded retry budget, then always synthesize. Every collaborator failure
//! degrades to a stage-local fallback; a run never aborts.

mod citations;
mod confidence;
mod nl2sql;
mod planner;
mod router;
mod synthesizer;
mod types;

pub use types::{AgentState, Constraints, Route, RunResult};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::Completion;
use crate::retrieval::DocumentIndex;
use crate::sql::{SchemaCache, SqlExecutor};

/// States of the query generation / repair loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryStage {
    Generate,
    Execute,
    Repair,
    Synthesize,
}

/// The orchestrator. One instance serves many runs; all per-question state
/// lives in the `AgentState` owned by each `run` call.
pub struct Agent {
    completion: Arc<dyn Completion>,
    index: Arc<DocumentIndex>,
    executor: SqlExecutor,
    schema: Arc<SchemaCache>,
    top_k: usize,
    max_repairs: u32,
}

impl Agent {
    pub fn new(
        completion: Arc<dyn Completion>,
        index: Arc<DocumentIndex>,
        executor: SqlExecutor,
        schema: Arc<SchemaCache>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            index,
            executor,
            schema,
            top_k: config.top_k,
            max_repairs: config.max_repairs,
        }
    }

    /// Answer one question end-to-end. Infallible by design: every local
    /// failure falls back to a safe default and the run always produces a
    /// typed answer with a clamped confidence.
    pub async fn run(&self, question: &str, format_hint: &str) -> RunResult {
        let route = router::classify(self.completion.as_ref(), question).await;
        info!("Route: {}", route.as_str());

        let mut state = AgentState::new(question, format_hint, route, self.max_repairs);

        if route.uses_documents() {
            state.chunks = self.index.search(question, self.top_k);
            info!("Retrieved {} chunks", state.chunks.len());
            for chunk in &state.chunks {
                debug!("  {} (score {:.2})", chunk.id, chunk.score);
            }
        }

        if route.uses_sql() {
            state.constraints = planner::extract(&state.question, &state.chunks);
            debug!("Constraints: {}", state.constraints.render());
            self.run_query_stages(&mut state).await;
        }

        let synthesis = synthesizer::synthesize(self.completion.as_ref(), &state).await;
        let final_answer = synthesizer::coerce_answer(
            &synthesis.answer,
            &state.format_hint,
            state.execution.as_ref(),
        );
        let confidence = confidence::score(&state, synthesis.self_reported);
        let citations = citations::collect(&state, &self.schema);

        info!("Answer ready (confidence {:.2})", confidence);

        RunResult {
            final_answer,
            sql: state.sql_query,
            confidence,
            explanation: synthesis.explanation,
            citations,
        }
    }

    /// Drive the generate/execute/repair state machine to its terminal
    /// state. At most `max_repairs + 1` generation attempts; synthesis is
    /// always reached, with whatever partial result exists.
    async fn run_query_stages(&self, state: &mut AgentState) {
        let mut stage = QueryStage::Generate;

        loop {
            stage = match stage {
                QueryStage::Generate => {
                    state.sql_query = nl2sql::generate(
                        self.completion.as_ref(),
                        &state.question,
                        self.schema.text(),
                        &state.constraints,
                        state.error_feedback.as_deref(),
                    )
                    .await;
                    QueryStage::Execute
                }

                QueryStage::Execute => {
                    let result = self.executor.execute(&state.sql_query).await;
                    let failed = !result.success;
                    state.execution = Some(result);

                    if failed && state.repair_count < state.max_repairs {
                        QueryStage::Repair
                    } else {
                        QueryStage::Synthesize
                    }
                }

                QueryStage::Repair => {
                    state.repair_count += 1;
                    state.error_feedback = state
                        .execution
                        .as_ref()
                        .and_then(|result| result.error.clone());
                    warn!(
                        "Repair attempt {}/{}: {}",
                        state.repair_count,
                        state.max_repairs,
                        state.error_feedback.as_deref().unwrap_or("unknown error")
                    );
                    QueryStage::Generate
                }

                QueryStage::Synthesize => break,
            };
        }
    }
}
