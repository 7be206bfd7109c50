//! The provider interface to the relational store, plus its implementations.

mod apply;
mod resolve;
mod save;

mod sqlite;
pub use sqlite::Sqlite;

mod postgres;
pub use postgres::Postgres;

use crate::query::Selection;

use bubbly_core::data::DataTree;
use bubbly_core::graph::SchemaGraph;
use bubbly_core::schema::{SchemaDiff, Table};
use bubbly_core::{Cx, Result};
use bubbly_sql::Statement;

use async_trait::async_trait;

/// A relational store capable of materializing schemas, persisting data
/// trees, and executing selection plans. Each operation runs inside one
/// transaction.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Materialize the schema diff, recording the declared tables so that a
    /// later process can evolve from them.
    async fn apply(&self, cx: &Cx, declared: &[Table], diff: &SchemaDiff<'_>) -> Result<()>;

    /// Persist a data tree, returning the resolved `_id` of every top-level
    /// block in input order.
    async fn save(&self, cx: &Cx, graph: &SchemaGraph, tree: &DataTree) -> Result<Vec<i64>>;

    /// Execute a selection plan, returning the assembled nested rows as a
    /// JSON array.
    async fn resolve_query(
        &self,
        cx: &Cx,
        graph: &SchemaGraph,
        selection: &Selection,
    ) -> Result<serde_json::Value>;

    /// The table declaration recorded by the most recent `apply`, if any.
    async fn applied_schema(&self, cx: &Cx) -> Result<Option<Vec<Table>>>;

    /// Replace the provider's connection with a freshly established one.
    /// The façade calls this before its single retry of a `StoreUnavailable`
    /// failure.
    async fn reconnect(&self) -> Result<()>;

    /// Release connections.
    async fn close(&self) -> Result<()>;
}

/// Row-level access to a database connection. The provider-independent SQL
/// logic (apply / save / resolve) is written against this, the way the
/// original store shares one set of SQL helpers between its providers.
#[async_trait]
pub(crate) trait SqlRunner: Send {
    /// Serialize and execute a statement for the runner's SQL flavor. Returns
    /// the result rows for statements that produce any.
    async fn exec(&mut self, stmt: &Statement) -> Result<Vec<Vec<bubbly_core::Value>>>;

    /// Execute a raw parameterless statement (transaction control, pragmas,
    /// bookkeeping DDL).
    async fn raw(&mut self, sql: &str) -> Result<()>;
}

/// Runs `op` between BEGIN and COMMIT, rolling back on any error.
macro_rules! in_transaction {
    ($runner:expr, $op:expr) => {{
        $runner.raw("BEGIN").await?;
        match $op {
            Ok(value) => {
                $runner.raw("COMMIT").await?;
                Ok(value)
            }
            Err(err) => {
                let _ = $runner.raw("ROLLBACK").await;
                Err(err)
            }
        }
    }};
}

pub(crate) use in_transaction;
