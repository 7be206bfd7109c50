use crate::graph::{NodeId, Rel, SchemaGraph};
use crate::value::Value;
use crate::{Error, Result};

use serde::Deserialize;

/// An ordered sequence of top-level data blocks, the unit handed to `Save`.
pub type DataBlocks = Vec<DataBlock>;

/// A piece of data shaped like a subtree of the schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataBlock {
    /// The declared table this block targets.
    #[serde(rename = "tableName")]
    pub table_name: String,

    /// Field values for the row.
    #[serde(default)]
    pub fields: Vec<DataField>,

    /// Child blocks; each must target a declared child of this block's table.
    #[serde(default, rename = "childBlocks")]
    pub child_blocks: Vec<DataBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataField {
    pub name: String,
    pub value: Value,
}

/// Data blocks normalized against the schema graph: a flat list of nodes in
/// parent-first order, children holding the index of their parent.
///
/// Field values are coerced to their declared types during normalization, so
/// a `TypeMismatch` is raised before any row is written.
#[derive(Debug)]
pub struct DataTree {
    pub nodes: Vec<DataNode>,
}

#[derive(Debug)]
pub struct DataNode {
    /// The graph node for the block's table.
    pub table: NodeId,

    /// Coerced field values, in block order.
    pub fields: Vec<(String, Value)>,

    /// Index of the parent data node within the tree, when this block was
    /// nested inside another.
    pub parent: Option<usize>,

    /// Parents referenced by natural-key value instead of nesting.
    pub parent_refs: Vec<ParentRef>,

    /// True for top-level blocks; their resolved row ids are reported back.
    pub root: bool,
}

/// A reference to an existing parent row by its natural-key field values.
#[derive(Debug)]
pub struct ParentRef {
    pub parent: NodeId,
    pub key: Vec<(String, Value)>,
}

impl DataTree {
    /// Normalizes the given blocks against the schema graph.
    pub fn build(graph: &SchemaGraph, blocks: &[DataBlock]) -> Result<Self> {
        let mut tree = Self { nodes: Vec::new() };

        for block in blocks {
            let node = graph.get(&block.table_name).ok_or_else(|| {
                Error::unknown_table(format!("table `{}` is not declared", block.table_name))
            })?;
            tree.push_block(graph, block, node.id, None)?;
        }

        Ok(tree)
    }

    fn push_block(
        &mut self,
        graph: &SchemaGraph,
        block: &DataBlock,
        table: NodeId,
        parent: Option<usize>,
    ) -> Result<()> {
        let (fields, parent_refs) = normalize_fields(graph, block, table)?;

        let index = self.nodes.len();
        self.nodes.push(DataNode {
            table,
            fields,
            parent,
            parent_refs,
            root: parent.is_none(),
        });

        for child in &block.child_blocks {
            let child_node = graph.get(&child.table_name).ok_or_else(|| {
                Error::unknown_table(format!("table `{}` is not declared", child.table_name))
            })?;

            let is_child = graph
                .edge(table, child_node.id)
                .map(|edge| edge.rel != Rel::BelongsTo)
                .unwrap_or(false);
            if !is_child {
                return Err(Error::unknown_table(format!(
                    "table `{}` is not a child of `{}`",
                    child.table_name, block.table_name
                )));
            }

            self.push_block(graph, child, child_node.id, Some(index))?;
        }

        Ok(())
    }
}

/// Splits a block's fields into coerced column values and parent references.
///
/// A field whose name matches a parent table of the block and whose value is
/// an object is a reference to an existing parent row by natural-key values.
fn normalize_fields(
    graph: &SchemaGraph,
    block: &DataBlock,
    table: NodeId,
) -> Result<(Vec<(String, Value)>, Vec<ParentRef>)> {
    let node = graph.node(table);

    let mut fields = Vec::with_capacity(block.fields.len());
    let mut parent_refs = Vec::new();

    for data_field in &block.fields {
        let parent_edge = node
            .belongs_to_edges()
            .find(|edge| graph.node(edge.to).name() == data_field.name);

        if let (Some(edge), Some(entries)) = (parent_edge, data_field.value.as_entries()) {
            let parent = graph.node(edge.to);
            let mut key = Vec::with_capacity(entries.len());

            for (name, value) in entries {
                let field = parent.table.field(name).ok_or_else(|| {
                    Error::unknown_field(format!(
                        "field `{}` is not declared on table `{}`",
                        name,
                        parent.name()
                    ))
                })?;
                key.push((name.clone(), coerce(parent.name(), field, value)?));
            }

            parent_refs.push(ParentRef {
                parent: edge.to,
                key,
            });
            continue;
        }

        let field = node.table.field(&data_field.name).ok_or_else(|| {
            Error::unknown_field(format!(
                "field `{}` is not declared on table `{}`",
                data_field.name,
                node.name()
            ))
        })?;

        fields.push((
            data_field.name.clone(),
            coerce(node.name(), field, &data_field.value)?,
        ));
    }

    Ok((fields, parent_refs))
}

fn coerce(table: &str, field: &crate::schema::Field, value: &Value) -> Result<Value> {
    value.coerce(field.ty).ok_or_else(|| {
        Error::type_mismatch(format!(
            "table `{}` field `{}`: cannot coerce {} to {}",
            table,
            field.name,
            value.render(),
            field.ty.name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, Table};
    use crate::ErrorKind;

    fn zoo_graph() -> SchemaGraph {
        let tables: Vec<Table> = serde_json::from_value(serde_json::json!([
            {
                "name": "zoo",
                "fields": [
                    {"name": "Name", "type": "string", "unique": true},
                    {"name": "State", "type": "string"}
                ],
                "tables": [
                    {
                        "name": "shops",
                        "fields": [
                            {"name": "Name", "type": "string", "unique": true},
                            {"name": "Open", "type": "bool"}
                        ]
                    }
                ]
            }
        ]))
        .unwrap();
        SchemaGraph::build(&Schema::new(tables).unwrap()).unwrap()
    }

    fn blocks(json: serde_json::Value) -> DataBlocks {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn nested_blocks_are_parent_first() {
        let graph = zoo_graph();
        let tree = DataTree::build(
            &graph,
            &blocks(serde_json::json!([{
                "tableName": "zoo",
                "fields": [{"name": "Name", "value": "Boise Zoo"}],
                "childBlocks": [{
                    "tableName": "shops",
                    "fields": [{"name": "Name", "value": "Gift"}, {"name": "Open", "value": true}]
                }]
            }])),
        )
        .unwrap();

        assert_eq!(tree.nodes.len(), 2);
        assert!(tree.nodes[0].root);
        assert_eq!(tree.nodes[1].parent, Some(0));
        assert!(!tree.nodes[1].root);
    }

    #[test]
    fn values_are_coerced_during_normalization() {
        let graph = zoo_graph();
        let err = DataTree::build(
            &graph,
            &blocks(serde_json::json!([{
                "tableName": "shops",
                "fields": [{"name": "Open", "value": "definitely"}]
            }])),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.to_string().contains("table `shops` field `Open`"));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let graph = zoo_graph();
        let err = DataTree::build(
            &graph,
            &blocks(serde_json::json!([{"tableName": "aquarium"}])),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownTable);
    }

    #[test]
    fn child_block_must_target_a_declared_child() {
        let graph = zoo_graph();
        let err = DataTree::build(
            &graph,
            &blocks(serde_json::json!([{
                "tableName": "shops",
                "childBlocks": [{"tableName": "zoo"}]
            }])),
        )
        .unwrap_err();

        assert!(err.to_string().contains("not a child of"));
    }

    #[test]
    fn parent_reference_by_natural_key() {
        let graph = zoo_graph();
        let tree = DataTree::build(
            &graph,
            &blocks(serde_json::json!([{
                "tableName": "shops",
                "fields": [
                    {"name": "Name", "value": "Gift"},
                    {"name": "zoo", "value": {"Name": "Boise Zoo"}}
                ]
            }])),
        )
        .unwrap();

        let shop = &tree.nodes[0];
        assert_eq!(shop.fields.len(), 1);
        assert_eq!(shop.parent_refs.len(), 1);
        assert_eq!(shop.parent_refs[0].key[0].0, "Name");
    }
}
