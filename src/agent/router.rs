//! Question routing.
//!
//! Deterministic lexical rules run first and short-circuit; the completion
//! collaborator is only consulted when no rule matches. Anything
//! unparseable defaults to `hybrid`, which triggers both retrieval and SQL
//! and never under-fetches.

use tracing::{debug, warn};

use super::types::Route;
use crate::llm::Completion;

/// Ordered lexical rules: first rule with a matching keyword wins
const LEXICAL_RULES: &[(Route, &[&str])] = &[
    (
        Route::Rag,
        &["policy", "return window", "return days", "definition"],
    ),
    (
        Route::Hybrid,
        &["during", "summer", "winter", "calendar", "marketing"],
    ),
    (
        Route::Sql,
        &["top 3", "total revenue", "all-time", "how many"],
    ),
];

/// Classify a question into its information-need category
pub async fn classify(completion: &dyn Completion, question: &str) -> Route {
    if let Some(route) = lexical_route(question) {
        debug!("Route {} via lexical rule", route.as_str());
        return route;
    }

    let prompt = format!(
        r#"Classify this question for a retail analytics assistant.

Question: "{question}"

Routes:
- rag: asks about POLICIES, RETURN WINDOWS, or DEFINITIONS found in documents
- sql: asks for NUMBERS, TOTALS, or RANKINGS computed from the database
- hybrid: needs BOTH document context (dates, categories, KPI definitions) AND database numbers

Respond with exactly one word: rag, sql, or hybrid."#
    );

    match completion.complete(&prompt).await {
        Ok(reply) => parse_reply(&reply).unwrap_or_else(|| {
            warn!("Unrecognized route reply {:?}, defaulting to hybrid", reply.trim());
            Route::Hybrid
        }),
        Err(e) => {
            warn!("Route classification failed: {}, defaulting to hybrid", e);
            Route::Hybrid
        }
    }
}

/// Apply the lexical rule table to the lowercased question
pub fn lexical_route(question: &str) -> Option<Route> {
    let lowered = question.to_lowercase();
    LEXICAL_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(route, _)| *route)
}

/// Parse the single route token from a model reply
fn parse_reply(reply: &str) -> Option<Route> {
    let token = reply
        .trim()
        .trim_start_matches("```")
        .split_whitespace()
        .next()?;
    Route::parse(token.trim_matches(|c: char| !c.is_alphanumeric()))
}
