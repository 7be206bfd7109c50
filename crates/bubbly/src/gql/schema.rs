//! Builds the GraphQL schema for a schema graph.
//!
//! Every table becomes an object type and a root query field; every graph
//! edge becomes a field on its source type, a list when the edge is
//! OneToMany. Argument sets, filters and orderings are generated per table
//! in graph traversal order, so the schema is deterministic for a given
//! graph.

use super::{resolve, ErrorSlot};
use crate::driver::Provider;
use crate::query::FilterOp;

use bubbly_core::graph::{Node, SchemaGraph};
use bubbly_core::schema::{FieldType, ID_COLUMN};
use bubbly_core::{Cx, Error, Result};

use async_graphql::dynamic::{
    Enum, Field, FieldFuture, FieldValue, InputObject, InputValue, Object, ResolverContext,
    Scalar, Schema, TypeRef,
};
use async_graphql::Value as GqlValue;
use std::sync::Arc;
use tracing::trace;

/// The shared `Order` enum accepted by every `order_by` member.
const ORDER_TYPE: &str = "Order";

fn filter_type_name(table: &str) -> String {
    format!("{table}_filter")
}

fn order_type_name(table: &str) -> String {
    format!("{table}_order")
}

/// Generates the GraphQL schema wrapping the given provider.
pub(crate) fn build(graph: Arc<SchemaGraph>, provider: Arc<dyn Provider>) -> Result<Schema> {
    let mut builder = Schema::build("Query", None, None)
        .register(Scalar::new("Map"))
        .register(Scalar::new("List"))
        .register(Enum::new(ORDER_TYPE).item("asc").item("desc"));

    let mut query = Object::new("Query");

    let mut names = Vec::new();
    graph.traverse(|node| names.push(node.name().to_string()));

    for name in &names {
        let node = graph.get(name).expect("traversal yielded unknown node");
        trace!(table = name, "adding table");

        let mut object = Object::new(name);
        object = object.field(Field::new(
            ID_COLUMN,
            TypeRef::named(TypeRef::STRING),
            extract_scalar(ID_COLUMN),
        ));
        for field in &node.table.fields {
            object = object.field(Field::new(
                &field.name,
                TypeRef::named(scalar_name(field.ty)),
                extract_scalar(&field.name),
            ));
        }
        for edge in &node.edges {
            let target = graph.node(edge.to);
            let ty = if edge.is_scalar() {
                TypeRef::named(target.name())
            } else {
                TypeRef::named_nn_list(target.name())
            };
            let field = Field::new(
                target.name(),
                ty,
                extract_edge(target.name(), !edge.is_scalar()),
            );
            object = object.field(add_arguments(field, target));
        }
        builder = builder.register(object);

        let mut filter = InputObject::new(filter_type_name(name));
        for (argument, scalar) in argument_scalars(node) {
            for (suffix, op) in FilterOp::SUFFIXES {
                let ty = match op {
                    FilterOp::In | FilterOp::NotIn => TypeRef::named_nn_list(scalar),
                    _ => TypeRef::named(scalar),
                };
                filter = filter.field(InputValue::new(format!("{argument}{suffix}"), ty));
            }
        }
        builder = builder.register(filter);

        let mut order = InputObject::new(order_type_name(name));
        for (argument, _) in argument_scalars(node) {
            order = order.field(InputValue::new(argument, TypeRef::named(ORDER_TYPE)));
        }
        builder = builder.register(order);

        let root = Field::new(
            name,
            TypeRef::named_nn_list_nn(name),
            root_resolver(graph.clone(), provider.clone()),
        );
        query = query.field(add_arguments(root, node));
    }

    builder
        .register(query)
        .finish()
        .map_err(|err| Error::internal(format!("failed to build GraphQL schema: {err}")))
}

/// The full argument set of a table: equality per field plus `_id`, `filter`,
/// `order_by`, pagination, and `filter_on`.
fn add_arguments(mut field: Field, node: &Node) -> Field {
    for (argument, scalar) in argument_scalars(node) {
        field = field.argument(InputValue::new(argument, TypeRef::named(scalar)));
    }

    field
        .argument(InputValue::new(
            "filter",
            TypeRef::named(filter_type_name(node.name())),
        ))
        .argument(InputValue::new(
            "order_by",
            TypeRef::named(order_type_name(node.name())),
        ))
        .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("last", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new(
            "filter_on",
            TypeRef::named(TypeRef::BOOLEAN),
        ))
}

fn argument_scalars(node: &Node) -> Vec<(String, &'static str)> {
    let mut arguments: Vec<(String, &'static str)> = node
        .table
        .fields
        .iter()
        .map(|field| (field.name.clone(), scalar_name(field.ty)))
        .collect();
    arguments.push((ID_COLUMN.to_string(), TypeRef::STRING));
    arguments
}

fn scalar_name(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Bool => TypeRef::BOOLEAN,
        FieldType::Number => TypeRef::INT,
        FieldType::String => TypeRef::STRING,
        FieldType::Object | FieldType::Map => "Map",
        FieldType::List => "List",
    }
}

/// The resolver for top-level query fields: walks the request's selection
/// tree into a plan, hands it to the provider, and returns the assembled
/// rows. Nested fields then project out of the returned values.
fn root_resolver(
    graph: Arc<SchemaGraph>,
    provider: Arc<dyn Provider>,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx: ResolverContext| {
        let graph = graph.clone();
        let provider = provider.clone();

        FieldFuture::new(async move {
            let cx = ctx.data::<Cx>().map(Clone::clone).unwrap_or_default();
            let slot = ctx.data::<ErrorSlot>().ok().cloned();

            let outcome = async {
                let selection = resolve::selection_from_field(&graph, ctx.field())?;
                trace!(table = %selection.table, "resolving query");
                provider.resolve_query(&cx, &graph, &selection).await
            }
            .await;

            match outcome {
                Ok(json) => {
                    let value = GqlValue::from_json(json)
                        .map_err(|err| Error::internal(err.to_string()))?;
                    match value {
                        GqlValue::List(items) => Ok(Some(FieldValue::list(items))),
                        _ => Err(Error::internal("provider returned a non-list value").into()),
                    }
                }
                Err(err) => {
                    if let Some(slot) = slot {
                        slot.set(err.clone());
                    }
                    Err(async_graphql::Error::new(err.to_string()))
                }
            }
        })
    }
}

/// Projects a scalar member out of the parent's resolved object.
fn extract_scalar(
    name: &str,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    let name = name.to_string();
    move |ctx: ResolverContext| {
        let name = name.clone();
        FieldFuture::new(async move {
            match member(&ctx, &name) {
                None | Some(GqlValue::Null) => Ok(None),
                Some(value) => Ok(Some(FieldValue::value(value))),
            }
        })
    }
}

/// Projects an edge member: a list of row objects for OneToMany edges, a
/// single row object otherwise.
fn extract_edge(
    name: &str,
    list: bool,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    let name = name.to_string();
    move |ctx: ResolverContext| {
        let name = name.clone();
        FieldFuture::new(async move {
            match member(&ctx, &name) {
                Some(GqlValue::List(items)) if list => Ok(Some(FieldValue::list(items))),
                None | Some(GqlValue::Null) => Ok(None),
                Some(value) if !list => Ok(Some(FieldValue::value(value))),
                Some(_) => Ok(None),
            }
        })
    }
}

fn member(ctx: &ResolverContext<'_>, name: &str) -> Option<GqlValue> {
    match ctx.parent_value.as_value() {
        Some(GqlValue::Object(map)) => map.get(name).cloned(),
        _ => None,
    }
}
