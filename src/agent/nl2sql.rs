//! SQL generation from the question, schema, and extracted constraints.
//!
//! The prompt embeds the schema rendering, constraints, and (on repair
//! attempts) the classified error from the previous execution. Raw model
//! output is cleaned deterministically; a failed generation call yields a
//! syntactically valid placeholder so the run always has a query to execute.

use tracing::{debug, warn};

use super::types::Constraints;
use crate::llm::Completion;

/// Placeholder returned when the generation call itself fails
const FALLBACK_QUERY: &str = "SELECT 1;";

/// Generate a candidate query; never fails
pub async fn generate(
    completion: &dyn Completion,
    question: &str,
    schema_text: &str,
    constraints: &Constraints,
    error_feedback: Option<&str>,
) -> String {
    let constraints_text = constraints.render();
    let error_text = error_feedback.unwrap_or("None");

    let prompt = format!(
        r#"Generate ONLY valid SQLite SQL for this question.

Question: {question}

Available Tables and Columns:
{schema_text}

Extracted Constraints:
{constraints_text}

Previous Error (if any):
{error_text}

CRITICAL RULES:
1. Quote "Order Details": FROM "Order Details" od
2. Use EXACT table and column names from the schema above
3. Date filter: WHERE o.OrderDate BETWEEN 'YYYY-MM-DD' AND 'YYYY-MM-DD'
4. Revenue: SUM(od.UnitPrice * od.Quantity * (1 - od.Discount)), using "Order Details" prices, not Products.UnitPrice
5. ALWAYS include the JOIN clause before using a table alias:
   JOIN Orders o ON od.OrderID = o.OrderID
   JOIN Products p ON od.ProductID = p.ProductID
   JOIN Categories c ON p.CategoryID = c.CategoryID
   JOIN Customers cu ON o.CustomerID = cu.CustomerID
6. Return ONLY the SQL query, no explanations

SQL Query:"#
    );

    match completion.complete(&prompt).await {
        Ok(raw) => {
            let sql = clean_sql(&raw);
            debug!("Generated SQL ({} chars)", sql.len());
            sql
        }
        Err(e) => {
            warn!("SQL generation failed: {}, using placeholder", e);
            FALLBACK_QUERY.to_string()
        }
    }
}

/// Deterministic cleanup of raw model output: strip code fences, keep the
/// first blank-line-delimited paragraph, drop comment lines.
pub fn clean_sql(raw: &str) -> String {
    let no_fences = raw.replace("```sql", "").replace("```", "");
    let first_paragraph = no_fences.trim().split("\n\n").next().unwrap_or("");

    first_paragraph
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
