//! Translates a GraphQL selection tree into a [`Selection`] plan.

use crate::query::{FilterCond, FilterOp, Selection};

use bubbly_core::graph::{Node, SchemaGraph};
use bubbly_core::schema::ID_COLUMN;
use bubbly_core::{Error, Result, Value};
use bubbly_sql::stmt::Direction;

use async_graphql::{SelectionField, Value as GqlValue};

/// Builds the plan for a top-level query field. The field name addresses the
/// table; arguments and subselections are walked recursively.
pub(crate) fn selection_from_field(
    graph: &SchemaGraph,
    field: SelectionField<'_>,
) -> Result<Selection> {
    let node = graph
        .get(field.name())
        .ok_or_else(|| Error::unknown_table(format!("table `{}` is not declared", field.name())))?;

    build_selection(graph, node, field)
}

fn build_selection(
    graph: &SchemaGraph,
    node: &Node,
    field: SelectionField<'_>,
) -> Result<Selection> {
    let mut selection = Selection::new(node.id, node.name());

    let arguments = field
        .arguments()
        .map_err(|err| Error::internal(format!("failed to resolve arguments: {err}")))?;

    for (name, value) in arguments {
        match name.as_str() {
            "filter" => parse_filter(node, &value, &mut selection)?,
            "order_by" => parse_order(node, &value, &mut selection)?,
            "first" => selection.first = Some(int_argument("first", &value)?),
            "last" => selection.last = Some(int_argument("last", &value)?),
            "filter_on" => selection.filter_on = matches!(value, GqlValue::Boolean(true)),
            argument => {
                let coerced = coerce_argument(node, argument, gql_to_value(&value))?;
                selection.eq.push((argument.to_string(), coerced));
            }
        }
    }

    for sub in field.selection_set() {
        let sub_name = sub.name();

        if let Some(target) = graph.get(sub_name) {
            if graph.edge(node.id, target.id).is_some() {
                selection.children.push(build_selection(graph, target, sub)?);
                continue;
            }
        }

        if sub_name == ID_COLUMN || node.table.field(sub_name).is_some() {
            selection.fields.push(sub_name.to_string());
        } else {
            return Err(Error::unknown_field(format!(
                "field `{}` is not declared on table `{}`",
                sub_name,
                node.name()
            )));
        }
    }

    Ok(selection)
}

/// Parses the `filter` argument: each member name is a field plus an operator
/// suffix, e.g. `Capacity_gt`.
fn parse_filter(node: &Node, value: &GqlValue, selection: &mut Selection) -> Result<()> {
    let GqlValue::Object(members) = value else {
        return Err(Error::type_mismatch(format!(
            "`filter` on table `{}` must be an object",
            node.name()
        )));
    };

    'members: for (member, value) in members {
        for (suffix, op) in FilterOp::SUFFIXES {
            let Some(field) = member.as_str().strip_suffix(suffix) else {
                continue;
            };

            let coerced = match op {
                FilterOp::In | FilterOp::NotIn => {
                    let GqlValue::List(items) = value else {
                        return Err(Error::type_mismatch(format!(
                            "filter `{member}` on table `{}` takes a list",
                            node.name()
                        )));
                    };
                    let items: Vec<Value> = items
                        .iter()
                        .map(|item| coerce_argument(node, field, gql_to_value(item)))
                        .collect::<Result<_>>()?;
                    Value::List(items)
                }
                _ => coerce_argument(node, field, gql_to_value(value))?,
            };

            selection.filter.push(FilterCond {
                field: field.to_string(),
                op,
                value: coerced,
            });
            continue 'members;
        }

        return Err(Error::unknown_field(format!(
            "filter `{member}` on table `{}` has no operator suffix",
            node.name()
        )));
    }

    Ok(())
}

fn parse_order(node: &Node, value: &GqlValue, selection: &mut Selection) -> Result<()> {
    let GqlValue::Object(members) = value else {
        return Err(Error::type_mismatch(format!(
            "`order_by` on table `{}` must be an object",
            node.name()
        )));
    };

    for (member, value) in members {
        let field = member.as_str();
        if field != ID_COLUMN && node.table.field(field).is_none() {
            return Err(Error::unknown_field(format!(
                "field `{}` is not declared on table `{}`",
                field,
                node.name()
            )));
        }

        let direction = match value {
            GqlValue::Enum(name) if name.as_str() == "asc" => Direction::Asc,
            GqlValue::Enum(name) if name.as_str() == "desc" => Direction::Desc,
            GqlValue::String(name) if name == "asc" => Direction::Asc,
            GqlValue::String(name) if name == "desc" => Direction::Desc,
            other => {
                return Err(Error::type_mismatch(format!(
                    "order_by `{field}` expects asc or desc, got {other}"
                )));
            }
        };

        selection.order_by.push((field.to_string(), direction));
    }

    Ok(())
}

fn int_argument(name: &str, value: &GqlValue) -> Result<u64> {
    match value {
        GqlValue::Number(number) => number
            .as_u64()
            .ok_or_else(|| Error::type_mismatch(format!("`{name}` must be a non-negative Int"))),
        other => Err(Error::type_mismatch(format!(
            "`{name}` must be an Int, got {other}"
        ))),
    }
}

/// Coerces an argument value to the declared type of the named field. `_id`
/// arguments arrive as strings and are parsed to the internal integer form.
fn coerce_argument(node: &Node, field: &str, value: Value) -> Result<Value> {
    if field == ID_COLUMN {
        return match &value {
            Value::Number(_) => Ok(value),
            Value::String(text) => text.parse::<i64>().map(|id| Value::Number(id as f64)).map_err(
                |_| {
                    Error::type_mismatch(format!(
                        "argument `_id` on table `{}`: {} is not a row id",
                        node.name(),
                        value.render()
                    ))
                },
            ),
            _ => Err(Error::type_mismatch(format!(
                "argument `_id` on table `{}`: {} is not a row id",
                node.name(),
                value.render()
            ))),
        };
    }

    let declared = node.table.field(field).ok_or_else(|| {
        Error::unknown_field(format!(
            "field `{}` is not declared on table `{}`",
            field,
            node.name()
        ))
    })?;

    value.coerce(declared.ty).ok_or_else(|| {
        Error::type_mismatch(format!(
            "argument `{}` on table `{}`: cannot coerce {} to {}",
            field,
            node.name(),
            value.render(),
            declared.ty.name()
        ))
    })
}

fn gql_to_value(value: &GqlValue) -> Value {
    match value {
        GqlValue::Null => Value::Null,
        GqlValue::Boolean(b) => Value::Bool(*b),
        GqlValue::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
        GqlValue::String(text) => Value::String(text.clone()),
        GqlValue::Enum(name) => Value::String(name.to_string()),
        GqlValue::List(items) => Value::List(items.iter().map(gql_to_value).collect()),
        GqlValue::Object(members) => Value::Object(
            members
                .iter()
                .map(|(name, value)| (name.to_string(), gql_to_value(value)))
                .collect(),
        ),
        GqlValue::Binary(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bubbly_core::schema::{Schema, Table};

    fn graph() -> SchemaGraph {
        let tables: Vec<Table> = serde_json::from_value(serde_json::json!([
            {
                "name": "restaurants",
                "fields": [
                    {"name": "Name", "type": "string", "unique": true},
                    {"name": "Capacity", "type": "number"}
                ]
            }
        ]))
        .unwrap();
        SchemaGraph::build(&Schema::new(tables).unwrap()).unwrap()
    }

    #[test]
    fn filter_suffixes_are_matched_longest_first() {
        let graph = graph();
        let node = graph.get("restaurants").unwrap();
        let mut selection = Selection::new(node.id, node.name());

        let filter = GqlValue::from_json(serde_json::json!({
            "Capacity_gte": 5,
            "Capacity_gt": 2
        }))
        .unwrap();

        parse_filter(node, &filter, &mut selection).unwrap();
        assert_eq!(selection.filter.len(), 2);
        assert!(selection.filter.iter().all(|cond| cond.field == "Capacity"));

        let mut ops: Vec<FilterOp> = selection.filter.iter().map(|cond| cond.op).collect();
        ops.sort_by_key(|op| *op as usize);
        assert_eq!(ops, [FilterOp::Gt, FilterOp::Gte]);
    }

    #[test]
    fn filter_without_suffix_is_rejected() {
        let graph = graph();
        let node = graph.get("restaurants").unwrap();
        let mut selection = Selection::new(node.id, node.name());

        let filter = GqlValue::from_json(serde_json::json!({"Capacity": 5})).unwrap();
        let err = parse_filter(node, &filter, &mut selection).unwrap_err();
        assert!(err.to_string().contains("operator suffix"));
    }

    #[test]
    fn id_argument_parses_from_string() {
        let graph = graph();
        let node = graph.get("restaurants").unwrap();

        let coerced =
            coerce_argument(node, "_id", Value::String("42".to_string())).unwrap();
        assert_eq!(coerced, Value::Number(42.0));

        let err = coerce_argument(node, "_id", Value::String("abc".to_string())).unwrap_err();
        assert_eq!(err.kind(), bubbly_core::ErrorKind::TypeMismatch);
    }

    #[test]
    fn in_filter_coerces_each_item() {
        let graph = graph();
        let node = graph.get("restaurants").unwrap();
        let mut selection = Selection::new(node.id, node.name());

        let filter =
            GqlValue::from_json(serde_json::json!({"Capacity_in": [1, "2", 3]})).unwrap();
        parse_filter(node, &filter, &mut selection).unwrap();

        assert_eq!(
            selection.filter[0].value,
            Value::List(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ])
        );
    }
}
