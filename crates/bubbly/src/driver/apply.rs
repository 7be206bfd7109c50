//! Schema materialization and bookkeeping, shared by every provider.

use super::{in_transaction, SqlRunner};

use bubbly_core::schema::{DiffItem, SchemaDiff, Table};
use bubbly_core::{Cx, Error, Result, Value};
use bubbly_sql::stmt::{Expr, Insert, Select, Statement};

/// The single-row table holding the declared schema applied to the database.
pub(crate) const SCHEMA_TABLE: &str = "_bubbly_schema";

const CREATE_SCHEMA_TABLE: &str = "CREATE TABLE IF NOT EXISTS \"_bubbly_schema\" \
     (\"id\" INTEGER PRIMARY KEY, \"declared\" TEXT NOT NULL)";

/// Applies a schema diff plus the bookkeeping row inside one transaction.
pub(crate) async fn apply_diff<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    declared: &[Table],
    diff: &SchemaDiff<'_>,
) -> Result<()> {
    let declared_json = serde_json::to_string(declared)
        .map_err(|err| Error::internal(format!("failed to encode schema: {err}")))?;

    runner.raw(CREATE_SCHEMA_TABLE).await?;

    in_transaction!(runner, {
        run_items(runner, cx, diff, &declared_json).await
    })
}

async fn run_items<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    diff: &SchemaDiff<'_>,
    declared_json: &str,
) -> Result<()> {
    for item in diff.items() {
        cx.ensure_active()?;

        let stmt = match item {
            DiffItem::CreateTable(table) => Statement::create_table(table),
            DiffItem::AddColumn { table, column } => Statement::add_column(*table, column),
            DiffItem::CreateIndex(index) => Statement::create_index(index),
        };
        runner.exec(&stmt).await?;
    }

    cx.ensure_active()?;

    // Replace the bookkeeping row.
    runner.raw("DELETE FROM \"_bubbly_schema\"").await?;
    runner
        .exec(
            &Insert {
                table: SCHEMA_TABLE.to_string(),
                columns: vec!["id".to_string(), "declared".to_string()],
                values: vec![
                    Value::Number(1.0),
                    Value::String(declared_json.to_string()),
                ],
                returning: None,
            }
            .into(),
        )
        .await?;

    Ok(())
}

/// Reads back the declared tables recorded by the most recent apply.
pub(crate) async fn load_declared<R: SqlRunner>(runner: &mut R) -> Result<Option<Vec<Table>>> {
    runner.raw(CREATE_SCHEMA_TABLE).await?;

    let mut select = Select::new(SCHEMA_TABLE, vec!["declared".to_string()]);
    select.filter = Some(Expr::eq(Expr::column("id"), Expr::value(Value::Number(1.0))));

    let rows = runner.exec(&select.into()).await?;
    let Some(row) = rows.first() else {
        return Ok(None);
    };

    let text = row
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::internal("schema bookkeeping row is malformed"))?;

    serde_json::from_str(text)
        .map(Some)
        .map_err(|err| Error::internal(format!("failed to decode recorded schema: {err}")))
}
