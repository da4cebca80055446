//! Core types for the question-answering state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::retrieval::RetrievedChunk;
use crate::sql::ExecutionResult;

// ============================================================================
// Routing
// ============================================================================

/// Information-need category of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Answerable from documents alone
    Rag,
    /// Answerable from the database alone
    Sql,
    /// Needs both documents and the database
    Hybrid,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rag => "rag",
            Self::Sql => "sql",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rag" => Some(Self::Rag),
            "sql" => Some(Self::Sql),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Does this route trigger document retrieval?
    pub fn uses_documents(&self) -> bool {
        matches!(self, Self::Rag | Self::Hybrid)
    }

    /// Does this route trigger SQL generation and execution?
    pub fn uses_sql(&self) -> bool {
        matches!(self, Self::Sql | Self::Hybrid)
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Structured filters derived from the question and retrieved text.
///
/// Absent field = no constraint of that kind. Extraction is
/// first-match-wins across chunks in retrieval order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi_formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_approximation: Option<f64>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render for embedding in a generation prompt
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "{}".to_string();
        }
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Run state and result
// ============================================================================

/// Aggregate state for one question's run.
///
/// Created fresh per invocation and owned exclusively by the orchestrator;
/// the route is fixed at construction and never mutated afterwards.
#[derive(Debug)]
pub struct AgentState {
    pub question: String,
    pub format_hint: String,
    route: Route,
    pub chunks: Vec<RetrievedChunk>,
    pub constraints: Constraints,
    /// Current candidate query; each repair attempt fully replaces it
    pub sql_query: String,
    pub execution: Option<ExecutionResult>,
    /// Classified feedback carried from the last failed execution
    pub error_feedback: Option<String>,
    pub repair_count: u32,
    pub max_repairs: u32,
}

impl AgentState {
    pub fn new(question: &str, format_hint: &str, route: Route, max_repairs: u32) -> Self {
        Self {
            question: question.to_string(),
            format_hint: format_hint.to_string(),
            route,
            chunks: Vec::new(),
            constraints: Constraints::default(),
            sql_query: String::new(),
            execution: None,
            error_feedback: None,
            repair_count: 0,
            max_repairs,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }
}

/// Final output of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Type-coerced answer matching the requested format hint
    pub final_answer: Value,
    /// Last generated query text, empty when the route skipped SQL
    pub sql: String,
    /// Combined confidence, clamped to [0, 1]
    pub confidence: f64,
    pub explanation: String,
    /// Sorted, deduplicated provenance tokens
    pub citations: Vec<String>,
}
