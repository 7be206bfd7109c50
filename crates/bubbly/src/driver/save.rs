//! Parent-first upsert of a data tree, shared by every provider.

use super::{in_transaction, SqlRunner};

use bubbly_core::data::DataTree;
use bubbly_core::graph::{Node, SchemaGraph};
use bubbly_core::schema::{parent_id_column, ID_COLUMN};
use bubbly_core::{Cx, Error, Result, Value};
use bubbly_sql::stmt::{Expr, Insert, Select, Update};

/// Saves a normalized data tree inside one transaction, returning the row id
/// of every top-level block in input order.
pub(crate) async fn save_tree<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    graph: &SchemaGraph,
    tree: &DataTree,
) -> Result<Vec<i64>> {
    in_transaction!(runner, save_nodes(runner, cx, graph, tree).await)
}

async fn save_nodes<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    graph: &SchemaGraph,
    tree: &DataTree,
) -> Result<Vec<i64>> {
    // Resolved row id per tree node; parents always resolve before their
    // children thanks to the tree's parent-first order.
    let mut ids: Vec<i64> = Vec::with_capacity(tree.nodes.len());
    let mut roots = Vec::new();

    for data_node in &tree.nodes {
        cx.ensure_active()?;

        let node = graph.node(data_node.table);
        let mut columns: Vec<(String, Value)> = data_node.fields.clone();

        if let Some(parent_index) = data_node.parent {
            let parent = graph.node(tree.nodes[parent_index].table);
            columns.push((
                parent_id_column(parent.name()),
                Value::Number(ids[parent_index] as f64),
            ));
        }

        for parent_ref in &data_node.parent_refs {
            let parent = graph.node(parent_ref.parent);
            let id = resolve_parent(runner, parent, &parent_ref.key).await?;
            columns.push((parent_id_column(parent.name()), Value::Number(id as f64)));
        }

        let id = upsert_row(runner, graph, node, columns).await?;
        if data_node.root {
            roots.push(id);
        }
        ids.push(id);
    }

    Ok(roots)
}

/// Upserts one row: SELECT by natural key, UPDATE the non-key fields on a
/// hit, INSERT otherwise. Returns the row's id either way.
async fn upsert_row<R: SqlRunner>(
    runner: &mut R,
    graph: &SchemaGraph,
    node: &Node,
    columns: Vec<(String, Value)>,
) -> Result<i64> {
    let key_columns: Vec<String> = graph
        .natural_key(node.id)
        .iter()
        .map(|part| part.column())
        .collect();

    if !key_columns.is_empty() {
        let predicates = key_columns
            .iter()
            .map(|key| {
                let value = columns
                    .iter()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null);
                Expr::eq(Expr::column(key.clone()), Expr::Value(value))
            })
            .collect();

        let mut select = Select::new(node.name(), vec![ID_COLUMN.to_string()]);
        select.filter = Expr::and_from_vec(predicates);

        let rows = runner.exec(&select.into()).await?;
        if let Some(row) = rows.first() {
            let id = row_id(row)?;

            let assignments: Vec<(String, Value)> = columns
                .into_iter()
                .filter(|(name, _)| !key_columns.contains(name))
                .collect();
            if !assignments.is_empty() {
                let update = Update {
                    table: node.name().to_string(),
                    assignments,
                    filter: Some(Expr::eq(
                        Expr::column(ID_COLUMN),
                        Expr::value(Value::Number(id as f64)),
                    )),
                };
                runner.exec(&update.into()).await?;
            }

            return Ok(id);
        }
    }

    let (names, values) = columns.into_iter().unzip();
    let insert = Insert {
        table: node.name().to_string(),
        columns: names,
        values,
        returning: Some(vec![ID_COLUMN.to_string()]),
    };

    let rows = runner.exec(&insert.into()).await?;
    rows.first().map(|row| row_id(row)).transpose()?.ok_or_else(|| {
        Error::internal(format!(
            "insert into `{}` returned no row id",
            node.name()
        ))
    })
}

/// Looks up an existing parent row by its natural-key field values.
async fn resolve_parent<R: SqlRunner>(
    runner: &mut R,
    parent: &Node,
    key: &[(String, Value)],
) -> Result<i64> {
    let predicates = key
        .iter()
        .map(|(name, value)| Expr::eq(Expr::column(name.clone()), Expr::Value(value.clone())))
        .collect();

    let mut select = Select::new(parent.name(), vec![ID_COLUMN.to_string()]);
    select.filter = Expr::and_from_vec(predicates);

    let rows = runner.exec(&select.into()).await?;
    match rows.first() {
        Some(row) => row_id(row),
        None => {
            let rendered: Vec<String> = key
                .iter()
                .map(|(name, value)| format!("{name}={}", value.render()))
                .collect();
            Err(Error::unresolved_parent(format!(
                "table `{}` has no row matching ({})",
                parent.name(),
                rendered.join(", ")
            )))
        }
    }
}

fn row_id(row: &[Value]) -> Result<i64> {
    row.first()
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::internal("row id column is not an integer"))
}
