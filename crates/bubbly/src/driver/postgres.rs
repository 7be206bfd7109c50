use super::{apply, resolve, save, Provider, SqlRunner};
use crate::query::Selection;

use bubbly_core::data::DataTree;
use bubbly_core::graph::SchemaGraph;
use bubbly_core::schema::{SchemaDiff, Table};
use bubbly_core::{Cx, Error, Result, Value};
use bubbly_sql::stmt::Returning;
use bubbly_sql::{Serializer, Statement};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config, NoTls};
use tracing::{error, trace};
use url::Url;

/// PostgreSQL-backed provider. The connection configuration is kept so a
/// dropped connection can be re-established for the façade's retry.
pub struct Postgres {
    config: Config,
    client: Mutex<Client>,
}

impl Postgres {
    /// Connects to a PostgreSQL database using a connection string.
    pub async fn connect(url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|err| Error::store_unavailable(format!("invalid connection URL: {err}")))?;

        if url.scheme() != "postgresql" {
            return Err(Error::store_unavailable(format!(
                "connection URL does not have a `postgresql` scheme; url={url}"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::store_unavailable("missing host in connection URL"))?;

        let mut config = Config::new();
        config.host(host);
        config.dbname(url.path().trim_start_matches('/'));

        if let Some(port) = url.port() {
            config.port(port);
        }
        if !url.username().is_empty() {
            config.user(url.username());
        }
        if let Some(password) = url.password() {
            config.password(password);
        }

        let client = spawn_connection(&config).await?;

        Ok(Self {
            config,
            client: Mutex::new(client),
        })
    }
}

/// Dials the database and spawns the task driving the connection.
async fn spawn_connection(config: &Config) -> Result<Client> {
    let (client, connection) = config
        .connect(NoTls)
        .await
        .map_err(|err| Error::store_unavailable(err.to_string()))?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "postgres connection error");
        }
    });

    Ok(client)
}

#[async_trait]
impl Provider for Postgres {
    async fn apply(&self, cx: &Cx, declared: &[Table], diff: &SchemaDiff<'_>) -> Result<()> {
        let client = self.client.lock().await;
        let mut runner = Runner { client: &client };
        apply::apply_diff(&mut runner, cx, declared, diff).await
    }

    async fn save(&self, cx: &Cx, graph: &SchemaGraph, tree: &DataTree) -> Result<Vec<i64>> {
        let client = self.client.lock().await;
        let mut runner = Runner { client: &client };
        save::save_tree(&mut runner, cx, graph, tree).await
    }

    async fn resolve_query(
        &self,
        cx: &Cx,
        graph: &SchemaGraph,
        selection: &Selection,
    ) -> Result<serde_json::Value> {
        let client = self.client.lock().await;
        let mut runner = Runner { client: &client };
        resolve::resolve_selection(&mut runner, cx, graph, selection).await
    }

    async fn applied_schema(&self, _cx: &Cx) -> Result<Option<Vec<Table>>> {
        let client = self.client.lock().await;
        let mut runner = Runner { client: &client };
        apply::load_declared(&mut runner).await
    }

    async fn reconnect(&self) -> Result<()> {
        let fresh = spawn_connection(&self.config).await?;
        // Dropping the old client terminates its connection task.
        *self.client.lock().await = fresh;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Dropping the client terminates the spawned connection task.
        Ok(())
    }
}

struct Runner<'a> {
    client: &'a Client,
}

#[async_trait]
impl SqlRunner for Runner<'_> {
    async fn exec(&mut self, stmt: &Statement) -> Result<Vec<Vec<Value>>> {
        let mut params = Vec::new();
        let sql = Serializer::postgresql().serialize(stmt, &mut params);
        trace!(%sql, "executing");

        let width = statement_width(stmt);
        let params: Vec<PgValue> = params.into_iter().map(PgValue).collect();
        let args: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|param| param as &(dyn ToSql + Sync))
            .collect();

        if width.is_none() {
            self.client.execute(&sql, &args).await.map_err(map_err)?;
            return Ok(Vec::new());
        }

        let rows = self.client.query(&sql, &args).await.map_err(map_err)?;

        rows.iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(index, column)| value_from_row(row, index, column.type_()))
                    .collect()
            })
            .collect()
    }

    async fn raw(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await.map_err(map_err)
    }
}

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

/// Converts a PostgreSQL value within a row to a core value.
fn value_from_row(row: &tokio_postgres::Row, index: usize, ty: &Type) -> Result<Value> {
    macro_rules! get_or_return_null {
        ($ty:ty) => {{
            match row
                .try_get::<usize, Option<$ty>>(index)
                .map_err(|err| Error::store_unavailable(err.to_string()))?
            {
                Some(inner) => inner,
                None => return Ok(Value::Null),
            }
        }};
    }

    let value = if *ty == Type::BOOL {
        Value::Bool(get_or_return_null!(bool))
    } else if *ty == Type::INT2 {
        Value::Number(get_or_return_null!(i16) as f64)
    } else if *ty == Type::INT4 {
        Value::Number(get_or_return_null!(i32) as f64)
    } else if *ty == Type::INT8 {
        Value::Number(get_or_return_null!(i64) as f64)
    } else if *ty == Type::FLOAT4 {
        Value::Number(get_or_return_null!(f32) as f64)
    } else if *ty == Type::FLOAT8 {
        Value::Number(get_or_return_null!(f64))
    } else if *ty == Type::NUMERIC {
        let decimal = get_or_return_null!(Decimal);
        Value::Number(decimal.to_f64().unwrap_or(f64::NAN))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
        Value::String(get_or_return_null!(String))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        Value::from(get_or_return_null!(serde_json::Value))
    } else {
        return Err(Error::internal(format!(
            "unsupported column type `{ty}` at index {index}"
        )));
    };

    Ok(value)
}

/// Bridges a core value to a PostgreSQL parameter.
#[derive(Debug)]
struct PgValue(Value);

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut tokio_postgres::types::private::BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Number(n) => match *ty {
                Type::INT2 => (*n as i16).to_sql(ty, out),
                Type::INT4 => (*n as i32).to_sql(ty, out),
                Type::INT8 => (*n as i64).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*n)
                    .map_err(|err| Box::new(err) as _)
                    .and_then(|decimal| decimal.to_sql(ty, out)),
                _ => n.to_sql(ty, out),
            },
            Value::String(s) => s.to_sql(ty, out),
            document @ (Value::Object(_) | Value::Map(_) | Value::List(_)) => {
                serde_json::Value::from(document.clone()).to_sql(ty, out)
            }
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::JSON
                | Type::JSONB
        )
    }

    to_sql_checked!();
}

fn map_err(err: tokio_postgres::Error) -> Error {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return Error::unique_violation(err.to_string());
    }

    Error::store_unavailable(err.to_string())
}
