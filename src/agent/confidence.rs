//! Confidence scoring.
//!
//! Independent signals adjust a 0.5 baseline, the result is averaged with
//! the model's self-reported confidence, and the final value is clamped to
//! [0, 1]. An unparseable self-report averages the heuristic with itself,
//! leaving it unchanged.

use super::types::AgentState;

/// Combine run signals into one final confidence value
pub fn score(state: &AgentState, self_reported: Option<f64>) -> f64 {
    let mut confidence = 0.5;

    if let Some(execution) = &state.execution {
        if execution.success {
            confidence += 0.2;
            if execution.row_count > 0 {
                confidence += 0.1;
            }
        }
    }

    if !state.chunks.is_empty() {
        let avg_score = state.chunks.iter().map(|c| c.score).sum::<f64>()
            / state.chunks.len() as f64;
        confidence += avg_score * 0.2;
    }

    confidence += if state.repair_count == 0 {
        0.1
    } else {
        -0.05 * state.repair_count as f64
    };

    let combined = match self_reported {
        Some(reported) => (confidence + reported) / 2.0,
        None => confidence,
    };

    combined.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::Route;
    use crate::retrieval::RetrievedChunk;
    use crate::sql::ExecutionResult;

    fn state(route: Route) -> AgentState {
        AgentState::new("q", "int", route, 2)
    }

    fn successful_execution(rows: usize) -> ExecutionResult {
        let row: serde_json::Map<String, serde_json::Value> =
            [("n".to_string(), serde_json::json!(1))].into_iter().collect();
        ExecutionResult {
            success: true,
            rows: vec![row; rows],
            columns: vec!["n".to_string()],
            error: None,
            row_count: rows,
        }
    }

    fn chunk(score: f64) -> RetrievedChunk {
        RetrievedChunk {
            id: "doc.md::chunk0".to_string(),
            content: "text".to_string(),
            source: "doc.md".to_string(),
            score,
        }
    }

    #[test]
    fn test_bounds_hold_for_all_failure_inputs() {
        let mut s = state(Route::Hybrid);
        s.execution = Some(ExecutionResult::failure("no such table: X".to_string()));
        s.repair_count = 2;
        let value = score(&s, Some(0.0));
        assert!((0.0..=1.0).contains(&value));

        // Best-case inputs stay within bounds too
        let mut s = state(Route::Hybrid);
        s.execution = Some(successful_execution(3));
        s.chunks = vec![chunk(1.0), chunk(1.0)];
        let value = score(&s, Some(1.0));
        assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn test_baseline_without_execution_or_chunks() {
        // 0.5 baseline + 0.1 zero-repair bonus, self-averaged
        let value = score(&state(Route::Rag), None);
        assert!((value - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_execution_success_and_rows_bonus() {
        let mut s = state(Route::Sql);
        s.execution = Some(successful_execution(1));
        // 0.5 + 0.2 + 0.1 + 0.1
        assert!((score(&s, None) - 0.9).abs() < 1e-9);

        let mut s = state(Route::Sql);
        s.execution = Some(successful_execution(0));
        // no non-empty bonus
        assert!((score(&s, None) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_retrieval_quality_contributes() {
        let mut s = state(Route::Rag);
        s.chunks = vec![chunk(0.5), chunk(1.0)];
        // 0.5 + 0.75 * 0.2 + 0.1
        assert!((score(&s, None) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_repair_penalty_is_monotonic() {
        let mut no_repairs = state(Route::Sql);
        no_repairs.execution = Some(successful_execution(1));
        let baseline = score(&no_repairs, None);

        for repairs in 1..=2u32 {
            let mut s = state(Route::Sql);
            s.execution = Some(successful_execution(1));
            s.repair_count = repairs;
            assert!(score(&s, None) < baseline);
        }
    }

    #[test]
    fn test_self_report_is_averaged_in() {
        let s = state(Route::Rag);
        // heuristic 0.6; reported 0.2 -> 0.4
        assert!((score(&s, Some(0.2)) - 0.4).abs() < 1e-9);
        // unparseable self-report leaves the heuristic unchanged
        assert!((score(&s, None) - 0.6).abs() < 1e-9);
    }
}
