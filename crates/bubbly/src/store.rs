//! The store façade: owns the active schema pair and serializes schema swaps
//! against live readers.

use crate::driver::{Postgres, Provider, Sqlite};
use crate::gql::{schema as gql_schema, ErrorSlot};

use bubbly_core::data::DataTree;
use bubbly_core::graph::SchemaGraph;
use bubbly_core::schema::{builder::build_db_schema, db, Schema, SchemaDiff, Table};
use bubbly_core::{Cx, DataBlocks, Error, ErrorKind, Result};

use async_graphql::dynamic::Schema as GqlSchema;
use async_graphql::{Request, ServerError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use url::Url;

/// Access to persisted data: schemas are applied through it, data blocks are
/// saved into it, and GraphQL queries are answered from it.
///
/// The in-memory schema pair (compiled schema + derived GraphQL schema) is
/// swapped atomically under the write half of one reader-writer lock;
/// readers observe either the old pair or the new one, never a mixture.
pub struct Store {
    provider: Arc<dyn Provider>,
    state: RwLock<State>,
}

struct State {
    snapshot: Option<Arc<Snapshot>>,
    gql: Option<GqlSchema>,

    /// Set when the snapshot changed without the GraphQL schema being
    /// rebuilt, e.g. right after opening a store on an existing database.
    gql_stale: bool,
}

/// The compiled forms of the active schema, handed out as one unit.
struct Snapshot {
    schema: Schema,
    graph: Arc<SchemaGraph>,
    db: db::Schema,
}

impl Store {
    /// Opens a store for the given connection URL. The provider is chosen by
    /// URL scheme: `sqlite:` or `postgresql:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|err| Error::store_unavailable(format!("invalid connection URL: {err}")))?;

        let provider: Arc<dyn Provider> = match parsed.scheme() {
            "sqlite" => Arc::new(Sqlite::new(url)?),
            "postgresql" => Arc::new(Postgres::connect(url).await?),
            scheme => {
                return Err(Error::store_unavailable(format!(
                    "unsupported provider scheme `{scheme}`"
                )));
            }
        };

        Self::open(provider).await
    }

    /// Opens a store over an already-constructed provider. If the database
    /// holds a previously applied schema, the in-memory snapshot is rebuilt
    /// from it and the GraphQL schema is rebuilt lazily.
    pub async fn open(provider: Arc<dyn Provider>) -> Result<Self> {
        let applied = provider.applied_schema(&Cx::new()).await?;
        let snapshot = applied.map(compile).transpose()?;

        let state = State {
            gql: None,
            gql_stale: snapshot.is_some(),
            snapshot: snapshot.map(Arc::new),
        };

        Ok(Self {
            provider,
            state: RwLock::new(state),
        })
    }

    /// Compiles and materializes a schema, then swaps it in as the active
    /// schema. Exclusive against queries and saves.
    pub async fn apply(&self, cx: &Cx, tables: Vec<Table>) -> Result<()> {
        cx.ensure_active()?;

        let snapshot = compile(tables)?;
        let mut state = self.state.write().await;

        {
            let applied = state.snapshot.as_ref().map(|snapshot| &snapshot.db);
            let diff = SchemaDiff::from(applied, &snapshot.db)?;
            debug!(
                tables = snapshot.schema.len(),
                additions = diff.items().len(),
                "applying schema"
            );

            let mut result = self
                .provider
                .apply(cx, snapshot.schema.declared(), &diff)
                .await;
            if retryable(&result) {
                self.provider.reconnect().await?;
                result = self
                    .provider
                    .apply(cx, snapshot.schema.declared(), &diff)
                    .await;
            }
            result?;
        }

        let snapshot = Arc::new(snapshot);
        // GraphQL requires a non-empty Query type; an empty schema simply has
        // no queryable surface yet.
        state.gql = if snapshot.graph.is_empty() {
            None
        } else {
            Some(gql_schema::build(
                snapshot.graph.clone(),
                self.provider.clone(),
            )?)
        };
        state.gql_stale = false;
        state.snapshot = Some(snapshot);

        Ok(())
    }

    /// Saves data blocks under the active schema, returning the resolved row
    /// id of every top-level block. Runs in shared mode; only the GraphQL
    /// rebuild after a schema-affecting save takes the lock exclusively.
    pub async fn save(&self, cx: &Cx, blocks: DataBlocks) -> Result<Vec<i64>> {
        cx.ensure_active()?;

        let ids = {
            let state = self.state.read().await;
            let snapshot = state.snapshot.clone().ok_or_else(no_schema)?;

            let tree = DataTree::build(&snapshot.graph, &blocks)?;
            trace!(nodes = tree.nodes.len(), "saving data tree");

            let mut result = self.provider.save(cx, &snapshot.graph, &tree).await;
            if retryable(&result) {
                self.provider.reconnect().await?;
                result = self.provider.save(cx, &snapshot.graph, &tree).await;
            }
            result?
        };

        self.rebuild_if_stale().await?;

        Ok(ids)
    }

    /// Executes a GraphQL query against the current schema, returning the
    /// nested result value. Runs in shared mode.
    pub async fn query(&self, cx: &Cx, document: &str) -> Result<serde_json::Value> {
        cx.ensure_active()?;
        self.rebuild_if_stale().await?;

        let state = self.state.read().await;
        let schema = state.gql.as_ref().ok_or_else(no_schema)?;

        let mut attempt = 0;
        loop {
            let slot = ErrorSlot::default();
            let request = Request::new(document).data(cx.clone()).data(slot.clone());
            let response = schema.execute(request).await;

            if response.errors.is_empty() {
                return response
                    .data
                    .into_json()
                    .map_err(|err| Error::internal(err.to_string()));
            }

            let err = slot
                .take()
                .unwrap_or_else(|| classify(&response.errors[0]));
            if attempt == 0 && err.kind() == ErrorKind::StoreUnavailable {
                self.provider.reconnect().await?;
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }

    /// Releases the provider's connections.
    pub async fn close(&self) -> Result<()> {
        self.provider.close().await
    }

    /// Rebuilds the GraphQL schema when the snapshot changed without it:
    /// the first save or query after opening an existing database.
    async fn rebuild_if_stale(&self) -> Result<()> {
        if !self.state.read().await.gql_stale {
            return Ok(());
        }

        let mut state = self.state.write().await;
        if state.gql_stale {
            match state.snapshot.clone() {
                Some(snapshot) if !snapshot.graph.is_empty() => {
                    state.gql = Some(gql_schema::build(
                        snapshot.graph.clone(),
                        self.provider.clone(),
                    )?);
                }
                _ => state.gql = None,
            }
            state.gql_stale = false;
        }

        Ok(())
    }
}

fn compile(tables: Vec<Table>) -> Result<Snapshot> {
    let schema = Schema::new(tables)?;
    let graph = Arc::new(SchemaGraph::build(&schema)?);
    let db = build_db_schema(&graph);

    Ok(Snapshot { schema, graph, db })
}

fn no_schema() -> Error {
    Error::schema_invalid("no schema has been applied")
}

/// The façade retries exactly one error class, once, after asking the
/// provider for a fresh connection: `StoreUnavailable`.
fn retryable<T>(result: &Result<T>) -> bool {
    matches!(result, Err(err) if err.kind() == ErrorKind::StoreUnavailable)
}

/// Maps a GraphQL execution error that did not originate in a resolver
/// (validation, parsing) to the closest client-visible kind.
fn classify(err: &ServerError) -> Error {
    let message = &err.message;

    if message.contains("Unknown field") || message.contains("Cannot query field") {
        // A top-level field addresses a table; anything deeper is a field.
        if message.contains("on type \"Query\"") {
            return Error::unknown_table(message.clone());
        }
        return Error::unknown_field(message.clone());
    }
    if message.contains("Unknown argument") {
        return Error::unknown_field(message.clone());
    }
    if message.contains("Invalid value") || message.contains("expected type") {
        return Error::type_mismatch(message.clone());
    }

    Error::internal(message.clone())
}
