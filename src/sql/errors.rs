//! Classification of SQLite execution errors.
//!
//! Raw engine error text is matched against an ordered rule table and each
//! category gets an actionable remediation hint. The combined text is the
//! feedback that drives the next repair attempt.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Category of a failed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecErrorKind {
    #[error("missing table")]
    MissingTable,
    #[error("missing column")]
    MissingColumn,
    #[error("ambiguous column")]
    AmbiguousColumn,
    #[error("syntax error")]
    Syntax,
    #[error("execution error")]
    Other,
}

/// A classified execution failure: raw engine message plus remediation hint
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub kind: ExecErrorKind,
    pub message: String,
    pub hint: String,
}

impl ClassifiedError {
    /// Render as the error-feedback text for the next generation attempt
    pub fn feedback(&self) -> String {
        if self.hint.is_empty() {
            self.message.clone()
        } else {
            format!("{}\n{}", self.message, self.hint)
        }
    }
}

/// Ordered classification rules: first matching needle wins
const CLASSIFY_RULES: &[(&str, ExecErrorKind)] = &[
    ("no such table", ExecErrorKind::MissingTable),
    ("no such column", ExecErrorKind::MissingColumn),
    ("ambiguous", ExecErrorKind::AmbiguousColumn),
    ("syntax error", ExecErrorKind::Syntax),
];

/// Alias prefix -> the JOIN that introduces it
const JOIN_HINTS: &[(&str, &str)] = &[
    ("o.", "JOIN Orders o ON od.OrderID = o.OrderID"),
    ("orders.", "JOIN Orders o ON od.OrderID = o.OrderID"),
    ("p.", "JOIN Products p ON od.ProductID = p.ProductID"),
    ("products.", "JOIN Products p ON od.ProductID = p.ProductID"),
    ("c.", "JOIN Categories c ON p.CategoryID = c.CategoryID"),
    ("categories.", "JOIN Categories c ON p.CategoryID = c.CategoryID"),
    ("cu.", "JOIN Customers cu ON o.CustomerID = cu.CustomerID"),
    ("customers.", "JOIN Customers cu ON o.CustomerID = cu.CustomerID"),
];

static MISSING_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no such table:\s*(\S+)").unwrap());
static MISSING_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no such column:\s*(\S+)").unwrap());

/// Classify raw engine error text and attach a remediation hint
pub fn classify(raw: &str) -> ClassifiedError {
    let lowered = raw.to_lowercase();
    let kind = CLASSIFY_RULES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ExecErrorKind::Other);

    let hint = match kind {
        ExecErrorKind::MissingTable => missing_table_hint(raw),
        ExecErrorKind::MissingColumn => missing_column_hint(raw),
        ExecErrorKind::AmbiguousColumn => {
            "Column name exists in multiple tables. Qualify it with its table alias, \
             e.g. o.OrderDate."
                .to_string()
        }
        ExecErrorKind::Syntax => {
            "SQL syntax error. Check BETWEEN clauses, quoting, and that the statement \
             is a single SELECT."
                .to_string()
        }
        ExecErrorKind::Other => "Review the error and fix the SQL accordingly.".to_string(),
    };

    ClassifiedError {
        kind,
        message: raw.to_string(),
        hint,
    }
}

fn missing_table_hint(raw: &str) -> String {
    let name = MISSING_TABLE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
        .unwrap_or("");

    let mut hint = format!("Table '{name}' does not exist.");
    match name.to_lowercase().as_str() {
        "orderdetails" | "order_details" => {
            hint.push_str(" Use \"Order Details\" (quoted, with the space).");
        }
        "salestable" | "sales" => {
            hint.push_str(" No sales table exists; use Orders joined with \"Order Details\".");
        }
        _ => hint.push_str(" Use the exact table names from the schema."),
    }
    hint
}

fn missing_column_hint(raw: &str) -> String {
    let name = MISSING_COLUMN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");
    let lowered = name.to_lowercase();

    for (prefix, join) in JOIN_HINTS {
        if lowered.starts_with(prefix) {
            return format!(
                "Column '{name}' references an alias whose table was never joined. \
                 Add: {join}"
            );
        }
    }

    if lowered.contains("categoryname") {
        return format!(
            "Column '{name}': CategoryName lives in Categories, not Products. \
             Add: JOIN Categories c ON p.CategoryID = c.CategoryID"
        );
    }
    if lowered.contains("productname") {
        return format!(
            "Column '{name}': ProductName lives in Products. \
             Add: JOIN Products p ON od.ProductID = p.ProductID"
        );
    }
    if lowered.contains("returnwindow") {
        return format!(
            "Column '{name}' does not exist anywhere; return-policy data lives in \
             documents, not the database."
        );
    }

    format!("Column '{name}' does not exist. Use the exact column names from the schema.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_missing_table() {
        let err = classify("no such table: OrderDetails");
        assert_eq!(err.kind, ExecErrorKind::MissingTable);
        assert!(err.hint.contains("\"Order Details\""));
    }

    #[test]
    fn test_classify_missing_column_suggests_join() {
        let err = classify("no such column: o.OrderDate");
        assert_eq!(err.kind, ExecErrorKind::MissingColumn);
        assert!(err.hint.contains("JOIN Orders o ON od.OrderID = o.OrderID"));
    }

    #[test]
    fn test_classify_missing_column_by_table_prefix() {
        let err = classify("no such column: Products.CategoryName");
        assert_eq!(err.kind, ExecErrorKind::MissingColumn);
        assert!(err.hint.contains("JOIN Products p"));
    }

    #[test]
    fn test_classify_ambiguous_and_syntax() {
        assert_eq!(
            classify("ambiguous column name: OrderID").kind,
            ExecErrorKind::AmbiguousColumn
        );
        assert_eq!(
            classify("near \"FORM\": syntax error").kind,
            ExecErrorKind::Syntax
        );
    }

    #[test]
    fn test_classify_unknown_falls_through() {
        let err = classify("database is locked");
        assert_eq!(err.kind, ExecErrorKind::Other);
        assert!(!err.feedback().is_empty());
    }

    #[test]
    fn test_feedback_includes_message_and_hint() {
        let err = classify("no such column: cu.CompanyName");
        let feedback = err.feedback();
        assert!(feedback.contains("no such column: cu.CompanyName"));
        assert!(feedback.contains("JOIN Customers cu"));
    }
}
