use super::{apply, resolve, save, Provider, SqlRunner};
use crate::query::Selection;

use bubbly_core::data::DataTree;
use bubbly_core::graph::SchemaGraph;
use bubbly_core::schema::{SchemaDiff, Table};
use bubbly_core::{Cx, Error, Result, Value};
use bubbly_sql::stmt::Returning;
use bubbly_sql::{Serializer, Statement};

use async_trait::async_trait;
use rusqlite::Connection as RusqliteConnection;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::trace;
use url::Url;

/// SQLite-backed provider. Holds a single connection; the store façade
/// serializes schema changes against it and SQLite handles row-level
/// concurrency.
#[derive(Debug)]
pub struct Sqlite {
    target: Target,
    connection: Mutex<RusqliteConnection>,
}

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    InMemory,
}

impl Sqlite {
    /// Create a SQLite provider from a connection URL
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url_str = url.into();
        let url = Url::parse(&url_str)
            .map_err(|err| Error::store_unavailable(format!("invalid connection URL: {err}")))?;

        if url.scheme() != "sqlite" {
            return Err(Error::store_unavailable(format!(
                "connection URL does not have a `sqlite` scheme; url={url_str}"
            )));
        }

        if url.path() == ":memory:" {
            Self::in_memory()
        } else {
            Self::open(PathBuf::from(url.path()))
        }
    }

    /// Create an in-memory SQLite database
    pub fn in_memory() -> Result<Self> {
        Self::with_target(Target::InMemory)
    }

    /// Open a SQLite database at the specified file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_target(Target::File(path.as_ref().to_path_buf()))
    }

    fn with_target(target: Target) -> Result<Self> {
        let connection = target.connect()?;

        Ok(Self {
            target,
            connection: Mutex::new(connection),
        })
    }
}

impl Target {
    fn connect(&self) -> Result<RusqliteConnection> {
        let connection = match self {
            Target::File(path) => RusqliteConnection::open(path).map_err(map_err)?,
            Target::InMemory => RusqliteConnection::open_in_memory().map_err(map_err)?,
        };

        // Foreign keys are off by default in SQLite; the cascading parent
        // keys depend on them.
        connection
            .execute_batch("PRAGMA foreign_keys = ON")
            .map_err(map_err)?;

        Ok(connection)
    }
}

#[async_trait]
impl Provider for Sqlite {
    async fn apply(&self, cx: &Cx, declared: &[Table], diff: &SchemaDiff<'_>) -> Result<()> {
        let mut connection = self.connection.lock().await;
        let mut runner = Runner {
            connection: &mut connection,
        };
        apply::apply_diff(&mut runner, cx, declared, diff).await
    }

    async fn save(&self, cx: &Cx, graph: &SchemaGraph, tree: &DataTree) -> Result<Vec<i64>> {
        let mut connection = self.connection.lock().await;
        let mut runner = Runner {
            connection: &mut connection,
        };
        save::save_tree(&mut runner, cx, graph, tree).await
    }

    async fn resolve_query(
        &self,
        cx: &Cx,
        graph: &SchemaGraph,
        selection: &Selection,
    ) -> Result<serde_json::Value> {
        let mut connection = self.connection.lock().await;
        let mut runner = Runner {
            connection: &mut connection,
        };
        resolve::resolve_selection(&mut runner, cx, graph, selection).await
    }

    async fn applied_schema(&self, _cx: &Cx) -> Result<Option<Vec<Table>>> {
        let mut connection = self.connection.lock().await;
        let mut runner = Runner {
            connection: &mut connection,
        };
        apply::load_declared(&mut runner).await
    }

    async fn reconnect(&self) -> Result<()> {
        // An in-memory database lives inside its connection; replacing the
        // connection would discard the data, and there is no transport to
        // re-establish anyway.
        if matches!(self.target, Target::InMemory) {
            return Ok(());
        }

        let fresh = self.target.connect()?;
        *self.connection.lock().await = fresh;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct Runner<'a> {
    connection: &'a mut RusqliteConnection,
}

#[async_trait]
impl SqlRunner for Runner<'_> {
    async fn exec(&mut self, stmt: &Statement) -> Result<Vec<Vec<Value>>> {
        let mut params = Vec::new();
        let sql = Serializer::sqlite().serialize(stmt, &mut params);
        trace!(%sql, "executing");

        let width = statement_width(stmt);
        let params: Vec<SqlValue> = params.into_iter().map(SqlValue).collect();

        let mut prepared = self.connection.prepare_cached(&sql).map_err(map_err)?;

        let Some(width) = width else {
            prepared
                .execute(rusqlite::params_from_iter(params.iter()))
                .map_err(map_err)?;
            return Ok(Vec::new());
        };

        let mut rows = prepared
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(map_err)?;

        let mut ret = Vec::new();
        while let Some(row) = rows.next().map_err(map_err)? {
            let mut items = Vec::with_capacity(width);
            for index in 0..width {
                items.push(value_from_row(row, index)?);
            }
            ret.push(items);
        }

        Ok(ret)
    }

    async fn raw(&mut self, sql: &str) -> Result<()> {
        self.connection.execute_batch(sql).map_err(map_err)
    }
}

/// Number of columns a statement produces, or `None` when it is a command.
fn statement_width(stmt: &Statement) -> Option<usize> {
    match stmt {
        Statement::Select(select) => match &select.returning {
            Returning::Columns(columns) => Some(columns.len()),
            Returning::One => Some(1),
        },
        Statement::Insert(insert) => insert.returning.as_ref().map(Vec::len),
        _ => None,
    }
}

fn value_from_row(row: &rusqlite::Row<'_>, index: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value = match row.get_ref(index).map_err(map_err)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i as f64),
        ValueRef::Real(r) => Value::Number(r),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(String::from_utf8_lossy(blob).into_owned()),
    };

    Ok(value)
}

/// Bridges a core value to a SQLite parameter.
struct SqlValue(Value);

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};

        let out = match &self.0 {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*b))),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < (i64::MAX as f64) {
                    ToSqlOutput::Owned(SqliteValue::Integer(*n as i64))
                } else {
                    ToSqlOutput::Owned(SqliteValue::Real(*n))
                }
            }
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            document @ (Value::Object(_) | Value::Map(_) | Value::List(_)) => {
                let text = serde_json::to_string(document)
                    .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
                ToSqlOutput::Owned(SqliteValue::Text(text))
            }
        };

        Ok(out)
    }
}

fn map_err(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation
            && message.contains("UNIQUE")
        {
            return Error::unique_violation(message.clone());
        }
    }

    Error::store_unavailable(err.to_string())
}
