//! Relational engine adapter.
//!
//! Wraps the SQLite pool: schema introspection (cached once per process),
//! query execution with dynamic row decoding, error classification with
//! remediation hints, and the table-reference scan used for citations.

pub mod errors;

use std::collections::BTreeSet;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use tracing::{debug, warn};

pub use errors::{classify, ClassifiedError, ExecErrorKind};

// ============================================================================
// Schema cache
// ============================================================================

/// A single column of an introspected table
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub ty: String,
    pub notnull: bool,
    pub pk: bool,
}

/// An introspected table
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Schema description, introspected once and treated as immutable.
///
/// Explicitly constructed and passed to the components that need it; there
/// is no process-wide schema singleton.
#[derive(Debug, Clone)]
pub struct SchemaCache {
    tables: Vec<TableInfo>,
    text: String,
}

impl SchemaCache {
    /// Introspect every user table in the database
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(pool)
        .await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let pragma = format!("PRAGMA table_info(\"{}\")", name.replace('"', "\"\""));
            let rows = sqlx::query(&pragma).fetch_all(pool).await?;

            let columns = rows
                .iter()
                .map(|row| {
                    Ok(ColumnInfo {
                        name: row.try_get::<String, _>("name")?,
                        ty: row.try_get::<String, _>("type")?,
                        notnull: row.try_get::<i64, _>("notnull")? != 0,
                        pk: row.try_get::<i64, _>("pk")? != 0,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            tables.push(TableInfo { name, columns });
        }

        let text = render_schema_text(&tables);
        debug!("Schema cache loaded: {} tables", tables.len());

        Ok(Self { tables, text })
    }

    /// Human-readable schema rendering for generation prompts
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    /// Case-insensitive table existence check
    pub fn has_table(&self, name: &str) -> bool {
        self.tables
            .iter()
            .any(|table| table.name.eq_ignore_ascii_case(name))
    }
}

fn render_schema_text(tables: &[TableInfo]) -> String {
    let mut lines = vec!["=== DATABASE SCHEMA ===".to_string(), String::new()];

    for table in tables {
        let display = if table.name.contains(' ') {
            format!("\"{}\"", table.name)
        } else {
            table.name.clone()
        };
        lines.push(format!("Table: {display}"));

        for col in &table.columns {
            let pk = if col.pk { " [PRIMARY KEY]" } else { "" };
            let notnull = if col.notnull { " [NOT NULL]" } else { "" };
            lines.push(format!("  - {} ({}){}{}", col.name, col.ty, pk, notnull));
        }
        lines.push(String::new());
    }

    lines.push("=== IMPORTANT NOTES ===".to_string());
    lines.push("- Table \"Order Details\" MUST be quoted: \"Order Details\"".to_string());
    lines.push("- Revenue calculation: SUM(UnitPrice * Quantity * (1 - Discount))".to_string());
    lines.push(
        "- Date filtering: WHERE OrderDate BETWEEN 'YYYY-MM-DD' AND 'YYYY-MM-DD'".to_string(),
    );
    lines.push(
        "- Join Products to Categories using: Products.CategoryID = Categories.CategoryID"
            .to_string(),
    );

    lines.join("\n")
}

// ============================================================================
// Execution
// ============================================================================

/// Outcome of one query execution, immutable once returned
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Result rows in engine order; each row preserves column order
    pub rows: Vec<serde_json::Map<String, Value>>,
    pub columns: Vec<String>,
    /// Classified error text (message plus remediation hint) on failure
    pub error: Option<String>,
    pub row_count: usize,
}

impl ExecutionResult {
    fn success(rows: Vec<serde_json::Map<String, Value>>, columns: Vec<String>) -> Self {
        let row_count = rows.len();
        Self {
            success: true,
            rows,
            columns,
            error: None,
            row_count,
        }
    }

    /// Explicit failure construction; the only shape a failed call produces
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            error: Some(error),
            row_count: 0,
        }
    }
}

/// Executes generated queries against the SQLite pool
#[derive(Clone)]
pub struct SqlExecutor {
    pool: SqlitePool,
}

impl SqlExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run a query, decoding rows dynamically.
    ///
    /// Never returns `Err`: failures come back as a classified
    /// `ExecutionResult` so the repair loop can act on them.
    pub async fn execute(&self, query: &str) -> ExecutionResult {
        let query = query.trim();
        if query.is_empty() {
            return ExecutionResult::failure("Invalid query: empty statement".to_string());
        }

        match sqlx::query(query).fetch_all(&self.pool).await {
            Ok(rows) => {
                let columns: Vec<String> = rows
                    .first()
                    .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default();

                let decoded = rows.iter().map(decode_row).collect();
                ExecutionResult::success(decoded, columns)
            }
            Err(e) => {
                let classified = classify(&e.to_string());
                warn!("Query failed ({}): {}", classified.kind, classified.message);
                ExecutionResult::failure(classified.feedback())
            }
        }
    }
}

fn decode_row(row: &SqliteRow) -> serde_json::Map<String, Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), decode_value(row, idx)))
        .collect()
}

/// Decode one cell by its runtime SQLite datatype
fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" => row.try_get::<i64, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "REAL" => row.try_get::<f64, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

// ============================================================================
// Table references
// ============================================================================

static TABLE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|JOIN|INTO|UPDATE|TABLE)\s+(?:"([^"]+)"|'([^']+)'|`([^`]+)`|([A-Za-z_][A-Za-z0-9_]*))"#,
    )
    .unwrap()
});

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION", "INTERSECT",
    "EXCEPT", "CASE", "WHEN", "THEN", "ELSE", "END", "AS", "ON", "USING", "AND", "OR", "NOT",
    "IN", "EXISTS", "BETWEEN", "LIKE", "IS", "NULL", "DISTINCT", "ALL", "ASC", "DESC",
];

fn is_sql_keyword(word: &str) -> bool {
    let upper = word.to_uppercase();
    SQL_KEYWORDS.iter().any(|kw| *kw == upper)
}

/// Every distinct table name referenced by the query, sorted.
///
/// Scans tokens following FROM/JOIN/INTO/UPDATE/TABLE, handling all three
/// quoting styles; bare references never include the trailing alias.
pub fn extract_tables(sql: &str) -> Vec<String> {
    let mut tables = BTreeSet::new();

    for caps in TABLE_REF.captures_iter(sql) {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str());

        if let Some(name) = name {
            let cleaned = name.trim().trim_matches(|c| c == ',' || c == ';');
            if !cleaned.is_empty() && !is_sql_keyword(cleaned) {
                tables.insert(cleaned.to_string());
            }
        }
    }

    tables.into_iter().collect()
}
