//! Executes a selection plan: one SELECT per selection level, linked through
//! `_id` / `<parent>_id` IN-lists, with nested rows assembled in memory.

use super::SqlRunner;
use crate::query::{FilterCond, FilterOp, Selection};

use bubbly_core::graph::{Edge, Node, Rel, SchemaGraph};
use bubbly_core::schema::{parent_id_column, FieldType, ID_COLUMN};
use bubbly_core::{Cx, Error, Result, Value};
use bubbly_sql::stmt::{BinaryOp, Direction, Expr, OrderBy, Select};

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Resolves a root selection into a JSON array of nested row objects.
pub(crate) async fn resolve_selection<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    graph: &SchemaGraph,
    selection: &Selection,
) -> Result<serde_json::Value> {
    let rows = fetch(runner, cx, graph, selection, None).await?;

    Ok(serde_json::Value::Array(
        rows.into_iter()
            .map(|row| serde_json::Value::Object(row.json))
            .collect(),
    ))
}

/// One fetched row, carrying the internals needed to link child rows to it.
struct RowData {
    /// The row's `_id`.
    id: i64,

    /// The value of the linking column when this fetch was correlated with a
    /// parent level.
    link: Option<i64>,

    /// This row's own foreign-key values, used to attach belongs-to edges.
    refs: Vec<(String, Option<i64>)>,

    /// The assembled output object.
    json: serde_json::Map<String, serde_json::Value>,
}

/// Correlation of a child fetch with the rows of its parent level.
struct Link {
    column: String,
    ids: Vec<i64>,
}

fn fetch<'a, R: SqlRunner>(
    runner: &'a mut R,
    cx: &'a Cx,
    graph: &'a SchemaGraph,
    selection: &'a Selection,
    link: Option<Link>,
) -> Pin<Box<dyn Future<Output = Result<Vec<RowData>>> + Send + 'a>> {
    Box::pin(async move {
        cx.ensure_active()?;

        let node = graph.node(selection.node);

        // Column list: _id first, then the selected fields, then the foreign
        // keys needed to attach belongs-to children, then the link column.
        let mut columns = vec![ID_COLUMN.to_string()];
        for field in &selection.fields {
            if field != ID_COLUMN && !columns.contains(field) {
                columns.push(field.clone());
            }
        }

        let mut ref_columns = Vec::new();
        for child in &selection.children {
            if edge_for(graph, selection, child)?.rel == Rel::BelongsTo {
                let column = parent_id_column(&child.table);
                if !ref_columns.contains(&column) {
                    ref_columns.push(column);
                }
            }
        }
        for column in &ref_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        if let Some(link) = &link {
            if !columns.contains(&link.column) {
                columns.push(link.column.clone());
            }
        }

        let mut select = Select::new(node.name(), columns.clone());

        let mut predicates = Vec::new();
        if let Some(link) = &link {
            predicates.push(Expr::in_list(
                Expr::column(link.column.clone()),
                link.ids
                    .iter()
                    .map(|id| Expr::value(Value::Number(*id as f64)))
                    .collect(),
                false,
            ));
        }
        for (field, value) in &selection.eq {
            predicates.push(Expr::eq(
                Expr::column(field.clone()),
                Expr::Value(value.clone()),
            ));
        }
        for cond in &selection.filter {
            predicates.push(filter_expr(Expr::column(cond.field.clone()), cond));
        }
        for child in &selection.children {
            if child.filter_on {
                predicates.push(exists_expr(graph, selection, child)?);
            }
        }
        select.filter = Expr::and_from_vec(predicates);

        // `first` keeps the natural order; `last` inverts it for the LIMIT
        // and restores row order after the fetch.
        let mut order: Vec<(String, Direction)> = if selection.order_by.is_empty() {
            vec![(ID_COLUMN.to_string(), Direction::Asc)]
        } else {
            selection.order_by.clone()
        };
        let mut reversed = false;
        if selection.first.is_some() {
            select.limit = selection.first;
        } else if let Some(last) = selection.last {
            order = order
                .into_iter()
                .map(|(column, direction)| (column, direction.reverse()))
                .collect();
            select.limit = Some(last);
            reversed = true;
        }
        select.order_by = order
            .into_iter()
            .map(|(column, direction)| OrderBy { column, direction })
            .collect();

        let mut raw = runner.exec(&select.into()).await?;
        if reversed {
            raw.reverse();
        }

        let link_column = link.as_ref().map(|link| link.column.as_str());
        let mut rows = Vec::with_capacity(raw.len());
        for values in raw {
            rows.push(decode_row(
                node,
                selection,
                &columns,
                &ref_columns,
                link_column,
                values,
            )?);
        }

        for child in &selection.children {
            let edge = *edge_for(graph, selection, child)?;
            attach_child(runner, cx, graph, selection, child, edge, &mut rows).await?;
        }

        Ok(rows)
    })
}

/// Fetches a child selection and attaches its rows under each parent row, in
/// parent-row order.
async fn attach_child<R: SqlRunner>(
    runner: &mut R,
    cx: &Cx,
    graph: &SchemaGraph,
    parent: &Selection,
    child: &Selection,
    edge: Edge,
    rows: &mut Vec<RowData>,
) -> Result<()> {
    match edge.rel {
        Rel::OneToMany | Rel::OneToOne => {
            let link_column = parent_id_column(&parent.table);
            let mut ids = Vec::new();
            for row in rows.iter() {
                if !ids.contains(&row.id) {
                    ids.push(row.id);
                }
            }

            let child_rows = fetch(
                runner,
                cx,
                graph,
                child,
                Some(Link {
                    column: link_column,
                    ids,
                }),
            )
            .await?;

            let mut grouped: HashMap<i64, Vec<serde_json::Value>> = HashMap::new();
            for row in child_rows {
                if let Some(parent_id) = row.link {
                    grouped
                        .entry(parent_id)
                        .or_default()
                        .push(serde_json::Value::Object(row.json));
                }
            }

            for row in rows.iter_mut() {
                let matched = grouped.remove(&row.id).unwrap_or_default();
                let value = if edge.rel == Rel::OneToMany {
                    serde_json::Value::Array(matched)
                } else {
                    matched.into_iter().next().unwrap_or(serde_json::Value::Null)
                };
                row.json.insert(child.table.clone(), value);
            }
        }
        Rel::BelongsTo => {
            let ref_column = parent_id_column(&child.table);
            let mut ids = Vec::new();
            for row in rows.iter() {
                if let Some(id) = row_ref(row, &ref_column) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }

            let child_rows = fetch(
                runner,
                cx,
                graph,
                child,
                Some(Link {
                    column: ID_COLUMN.to_string(),
                    ids,
                }),
            )
            .await?;

            let mut by_id: HashMap<i64, serde_json::Value> = child_rows
                .into_iter()
                .map(|row| (row.id, serde_json::Value::Object(row.json)))
                .collect();

            for row in rows.iter_mut() {
                let value = row_ref(row, &ref_column)
                    .and_then(|id| by_id.remove(&id))
                    .unwrap_or(serde_json::Value::Null);
                row.json.insert(child.table.clone(), value);
            }
        }
    }

    if child.filter_on {
        rows.retain(|row| match row.json.get(&child.table) {
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(serde_json::Value::Null) | None => false,
            Some(_) => true,
        });
    }

    Ok(())
}

fn row_ref(row: &RowData, column: &str) -> Option<i64> {
    row.refs
        .iter()
        .find(|(name, _)| name == column)
        .and_then(|(_, id)| *id)
}

fn decode_row(
    node: &Node,
    selection: &Selection,
    columns: &[String],
    ref_columns: &[String],
    link_column: Option<&str>,
    values: Vec<Value>,
) -> Result<RowData> {
    if values.len() != columns.len() {
        return Err(Error::internal(format!(
            "row width {} does not match column list {}",
            values.len(),
            columns.len()
        )));
    }

    let by_name: HashMap<&str, &Value> = columns
        .iter()
        .map(String::as_str)
        .zip(values.iter())
        .collect();

    let id = by_name
        .get(ID_COLUMN)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| Error::internal("row id column is not an integer"))?;

    let mut json = serde_json::Map::new();
    for field in &selection.fields {
        let value = *by_name
            .get(field.as_str())
            .ok_or_else(|| Error::internal(format!("column `{field}` missing from row")))?;

        if field == ID_COLUMN {
            json.insert(field.clone(), serde_json::Value::String(id.to_string()));
            continue;
        }

        let declared = node.table.field(field).ok_or_else(|| {
            Error::internal(format!(
                "field `{}` is not declared on table `{}`",
                field,
                node.name()
            ))
        })?;
        json.insert(field.clone(), field_to_json(value, declared.ty));
    }

    let refs = ref_columns
        .iter()
        .map(|column| {
            let id = by_name.get(column.as_str()).and_then(|value| value.as_i64());
            (column.clone(), id)
        })
        .collect();

    let link = link_column
        .and_then(|column| by_name.get(column))
        .and_then(|value| value.as_i64());

    Ok(RowData {
        id,
        link,
        refs,
        json,
    })
}

/// Converts a stored column value back to its declared shape: booleans may
/// come back as integers, documents as JSON text.
fn field_to_json(value: &Value, ty: FieldType) -> serde_json::Value {
    match (ty, value) {
        (_, Value::Null) => serde_json::Value::Null,
        (FieldType::Bool, Value::Number(n)) => serde_json::Value::Bool(*n != 0.0),
        (FieldType::Object | FieldType::Map | FieldType::List, Value::String(text)) => {
            serde_json::from_str(text)
                .unwrap_or_else(|_| serde_json::Value::String(text.clone()))
        }
        _ => value.clone().into(),
    }
}

fn filter_expr(column: Expr, cond: &FilterCond) -> Expr {
    let list = || {
        cond.value
            .as_list()
            .map(|items| items.iter().cloned().map(Expr::Value).collect())
            .unwrap_or_default()
    };

    match cond.op {
        FilterOp::Gt => Expr::binary_op(column, BinaryOp::Gt, Expr::Value(cond.value.clone())),
        FilterOp::Lt => Expr::binary_op(column, BinaryOp::Lt, Expr::Value(cond.value.clone())),
        FilterOp::Gte => Expr::binary_op(column, BinaryOp::Ge, Expr::Value(cond.value.clone())),
        FilterOp::Lte => Expr::binary_op(column, BinaryOp::Le, Expr::Value(cond.value.clone())),
        FilterOp::In => Expr::in_list(column, list(), false),
        FilterOp::NotIn => Expr::in_list(column, list(), true),
    }
}

/// Builds the EXISTS predicate a `filter_on` child places on its parent. The
/// child's own filters are folded in, as are its `filter_on` grandchildren,
/// recursively.
fn exists_expr(graph: &SchemaGraph, parent: &Selection, child: &Selection) -> Result<Expr> {
    let edge = edge_for(graph, parent, child)?;

    let correlation = match edge.rel {
        Rel::OneToMany | Rel::OneToOne => Expr::binary_op(
            Expr::qualified(child.table.clone(), parent_id_column(&parent.table)),
            BinaryOp::Eq,
            Expr::qualified(parent.table.clone(), ID_COLUMN),
        ),
        Rel::BelongsTo => Expr::binary_op(
            Expr::qualified(child.table.clone(), ID_COLUMN),
            BinaryOp::Eq,
            Expr::qualified(parent.table.clone(), parent_id_column(&child.table)),
        ),
    };

    let mut predicates = vec![correlation];
    for (field, value) in &child.eq {
        predicates.push(Expr::eq(
            Expr::qualified(child.table.clone(), field.clone()),
            Expr::Value(value.clone()),
        ));
    }
    for cond in &child.filter {
        predicates.push(filter_expr(
            Expr::qualified(child.table.clone(), cond.field.clone()),
            cond,
        ));
    }
    for grandchild in &child.children {
        if grandchild.filter_on {
            predicates.push(exists_expr(graph, child, grandchild)?);
        }
    }

    Ok(Expr::exists(Select::exists(
        child.table.clone(),
        Expr::and_from_vec(predicates),
    )))
}

fn edge_for<'a>(
    graph: &'a SchemaGraph,
    parent: &Selection,
    child: &Selection,
) -> Result<&'a Edge> {
    graph.edge(parent.node, child.node).ok_or_else(|| {
        Error::internal(format!(
            "no edge between `{}` and `{}`",
            parent.table, child.table
        ))
    })
}
