//! Lowers the schema graph into the database-level schema.

use super::{db, parent_id_column, FieldType, ID_COLUMN};
use crate::graph::{Node, SchemaGraph};

/// Builds the database-level schema for a graph: one table per node with the
/// declared columns plus `_id` and one `<parent>_id` foreign key per parent
/// join, and a unique index over the natural key when it is non-empty.
///
/// Tables are emitted in graph traversal order, so two builds of the same
/// schema produce identical output.
pub fn build_db_schema(graph: &SchemaGraph) -> db::Schema {
    let mut schema = db::Schema::default();

    graph.traverse(|node| {
        schema.tables.push(build_table(graph, node));
    });

    schema
}

fn build_table(graph: &SchemaGraph, node: &Node) -> db::Table {
    let mut columns = vec![db::Column {
        name: ID_COLUMN.to_string(),
        ty: db::Type::Integer,
        primary_key: true,
        references: None,
    }];

    for field in &node.table.fields {
        columns.push(db::Column {
            name: field.name.clone(),
            ty: column_type(field.ty),
            primary_key: false,
            references: None,
        });
    }

    for edge in node.belongs_to_edges() {
        let parent = graph.node(edge.to).name();
        columns.push(db::Column {
            name: parent_id_column(parent),
            ty: db::Type::Integer,
            primary_key: false,
            references: Some(parent.to_string()),
        });
    }

    let mut table = db::Table {
        name: node.name().to_string(),
        columns,
        indices: Vec::new(),
    };

    let key_columns: Vec<String> = graph
        .natural_key(node.id)
        .iter()
        .map(|part| part.column())
        .collect();
    if !key_columns.is_empty() {
        table.indices.push(db::Index {
            name: index_name(node.name(), &key_columns),
            on: node.name().to_string(),
            columns: key_columns,
            unique: true,
        });
    }

    table
}

fn column_type(ty: FieldType) -> db::Type {
    match ty {
        FieldType::Bool => db::Type::Boolean,
        FieldType::Number => db::Type::Numeric,
        FieldType::String => db::Type::Text,
        FieldType::Object | FieldType::Map | FieldType::List => db::Type::Json,
    }
}

fn index_name(table: &str, columns: &[String]) -> String {
    let mut name = format!("index_{table}_by");

    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            name.push_str("_and");
        }
        name.push('_');
        name.push_str(column);
    }

    name
}
