//! Provenance collection.
//!
//! Union of the tables referenced by the generated query (validated against
//! the schema cache) and the ids of every retrieved chunk. Deduplicated and
//! sorted, so the result is independent of chunk order.

use std::collections::BTreeSet;

use super::types::AgentState;
use crate::sql::{self, SchemaCache};

/// Collect the citation set for a finished run
pub fn collect(state: &AgentState, schema: &SchemaCache) -> Vec<String> {
    let mut citations = BTreeSet::new();

    if !state.sql_query.is_empty() {
        for table in sql::extract_tables(&state.sql_query) {
            if schema.has_table(&table) {
                citations.insert(table);
            }
        }
    }

    for chunk in &state.chunks {
        citations.insert(chunk.id.clone());
    }

    citations.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::Route;
    use crate::retrieval::RetrievedChunk;
    use sqlx::sqlite::SqlitePoolOptions;

    fn chunk(id: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: id.to_string(),
            content: String::new(),
            source: "doc.md".to_string(),
            score: 0.4,
        }
    }

    async fn schema() -> SchemaCache {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query("CREATE TABLE Orders (OrderID INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE \"Order Details\" (OrderID INTEGER, ProductID INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        SchemaCache::load(&pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_union_of_tables_and_chunk_ids() {
        let schema = schema().await;
        let mut state = AgentState::new("q", "int", Route::Hybrid, 2);
        state.sql_query =
            "SELECT COUNT(*) FROM Orders o JOIN \"Order Details\" od ON o.OrderID = od.OrderID"
                .to_string();
        state.chunks = vec![chunk("kpi.md::chunk1"), chunk("cal.md::chunk0")];

        assert_eq!(
            collect(&state, &schema),
            vec!["Order Details", "Orders", "cal.md::chunk0", "kpi.md::chunk1"]
        );
    }

    #[tokio::test]
    async fn test_order_independent_and_idempotent() {
        let schema = schema().await;
        let mut state = AgentState::new("q", "int", Route::Hybrid, 2);
        state.sql_query = "SELECT * FROM Orders".to_string();
        state.chunks = vec![chunk("a.md::chunk0"), chunk("b.md::chunk0")];
        let forward = collect(&state, &schema);

        state.chunks.reverse();
        let reversed = collect(&state, &schema);
        assert_eq!(forward, reversed);
        assert_eq!(collect(&state, &schema), reversed);
    }

    #[tokio::test]
    async fn test_unknown_tables_are_dropped() {
        let schema = schema().await;
        let mut state = AgentState::new("q", "int", Route::Sql, 2);
        state.sql_query = "SELECT * FROM Sales JOIN Orders ON 1=1".to_string();

        assert_eq!(collect(&state, &schema), vec!["Orders"]);
    }

    #[tokio::test]
    async fn test_empty_query_contributes_nothing() {
        let schema = schema().await;
        let mut state = AgentState::new("q", "str", Route::Rag, 2);
        state.chunks = vec![chunk("policy.md::chunk2")];

        assert_eq!(collect(&state, &schema), vec!["policy.md::chunk2"]);
    }
}
