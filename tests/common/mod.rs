// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use copilot::llm::Completion;

/// Scripted completion collaborator. Dispatches on the prompt's opening
/// line, records every prompt it sees, and fails on anything unscripted.
pub struct ScriptedCompletion {
    route_reply: Option<String>,
    sql_replies: Mutex<VecDeque<String>>,
    synthesis_reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(synthesis_reply: &str) -> Self {
        Self {
            route_reply: None,
            sql_replies: Mutex::new(VecDeque::new()),
            synthesis_reply: synthesis_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_route(mut self, reply: &str) -> Self {
        self.route_reply = Some(reply.to_string());
        self
    }

    pub fn with_sql(self, reply: &str) -> Self {
        self.sql_replies.lock().unwrap().push_back(reply.to_string());
        self
    }

    /// Prompts seen for one stage, identified by its opening text
    pub fn prompts_for(&self, stage_prefix: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|prompt| prompt.starts_with(stage_prefix))
            .cloned()
            .collect()
    }

    pub fn generation_attempts(&self) -> usize {
        self.prompts_for("Generate ONLY valid SQLite SQL").len()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.starts_with("Classify this question") {
            return self
                .route_reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("unscripted route prompt"));
        }
        if prompt.starts_with("Generate ONLY valid SQLite SQL") {
            return self
                .sql_replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("unscripted generation prompt"));
        }
        if prompt.starts_with("Synthesize the final answer") {
            return Ok(self.synthesis_reply.clone());
        }

        anyhow::bail!("unexpected prompt: {}", prompt.lines().next().unwrap_or(""))
    }
}

/// In-memory Northwind subset with two summer-2024 orders and one outside
/// the summer window.
pub async fn northwind_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("in-memory sqlite");

    let statements = [
        "CREATE TABLE Categories (
            CategoryID INTEGER PRIMARY KEY,
            CategoryName TEXT NOT NULL
        )",
        "CREATE TABLE Products (
            ProductID INTEGER PRIMARY KEY,
            ProductName TEXT NOT NULL,
            CategoryID INTEGER
        )",
        "CREATE TABLE Customers (
            CustomerID TEXT PRIMARY KEY,
            CompanyName TEXT NOT NULL
        )",
        "CREATE TABLE Orders (
            OrderID INTEGER PRIMARY KEY,
            CustomerID TEXT NOT NULL,
            OrderDate TEXT
        )",
        "CREATE TABLE \"Order Details\" (
            OrderID INTEGER NOT NULL,
            ProductID INTEGER NOT NULL,
            UnitPrice REAL NOT NULL,
            Quantity INTEGER NOT NULL,
            Discount REAL NOT NULL DEFAULT 0
        )",
        "INSERT INTO Categories VALUES (1, 'Beverages'), (2, 'Seafood')",
        "INSERT INTO Products VALUES
            (1, 'Chai', 1),
            (2, 'Chang', 1),
            (3, 'Ikura', 2)",
        "INSERT INTO Customers VALUES ('ALFKI', 'Alfreds Futterkiste')",
        "INSERT INTO Orders VALUES
            (1, 'ALFKI', '2024-06-15'),
            (2, 'ALFKI', '2024-07-20'),
            (3, 'ALFKI', '2024-05-01')",
        "INSERT INTO \"Order Details\" VALUES
            (1, 1, 100.0, 100, 0.0),
            (2, 2, 104.61, 50, 0.0),
            (3, 3, 999.0, 10, 0.0)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(&pool).await.expect("fixture");
    }

    pool
}

/// Markdown corpus with a marketing calendar and KPI definitions
pub fn docs_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");

    std::fs::write(
        dir.path().join("marketing.md"),
        "# Marketing Calendar\n\
         Campaign planning notes.\n\
         ## Summer Push\n\
         The summer marketing campaign runs 2024-06-01 to 2024-08-31 across all stores.\n\
         ## Winter Push\n\
         The winter campaign runs 2024-12-01 to 2025-02-28.\n",
    )
    .expect("write marketing.md");

    std::fs::write(
        dir.path().join("kpi.md"),
        "# KPI Definitions\n\
         ## AOV\n\
         AOV is revenue per distinct order.\n\
         ## Return Policy\n\
         Items may be returned within 30 days of delivery.\n",
    )
    .expect("write kpi.md");

    dir
}
