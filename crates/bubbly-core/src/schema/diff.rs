use super::db;
use crate::{Error, Result};

/// The difference between the schema previously applied to the database and a
/// newly compiled one, as an ordered list of additive DDL items.
///
/// Evolution is strictly additive: a change that would drop or retype an
/// existing table, column, or index is rejected with `SchemaEvolutionUnsafe`
/// instead of being guessed at.
#[derive(Debug)]
pub struct SchemaDiff<'a> {
    items: Vec<DiffItem<'a>>,
}

#[derive(Debug)]
pub enum DiffItem<'a> {
    CreateTable(&'a db::Table),
    AddColumn {
        table: &'a str,
        column: &'a db::Column,
    },
    CreateIndex(&'a db::Index),
}

impl<'a> SchemaDiff<'a> {
    /// Computes the diff from `applied` to `to`. `None` means nothing has been
    /// applied yet, so every table is created.
    pub fn from(applied: Option<&'a db::Schema>, to: &'a db::Schema) -> Result<Self> {
        let mut items = Vec::new();

        let applied: &'a [db::Table] = applied
            .map(|schema| schema.tables.as_slice())
            .unwrap_or(&[]);

        for from in applied {
            if to.table(&from.name).is_none() {
                return Err(Error::schema_evolution_unsafe(format!(
                    "table `{}` would be dropped",
                    from.name
                )));
            }
        }

        for table in &to.tables {
            let Some(from) = applied.iter().find(|from| from.name == table.name) else {
                items.push(DiffItem::CreateTable(table));
                for index in &table.indices {
                    items.push(DiffItem::CreateIndex(index));
                }
                continue;
            };

            diff_columns(from, table, &mut items)?;
            diff_indices(from, table, &mut items)?;
        }

        Ok(Self { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DiffItem<'a>] {
        &self.items
    }
}

fn diff_columns<'a>(
    from: &'a db::Table,
    to: &'a db::Table,
    items: &mut Vec<DiffItem<'a>>,
) -> Result<()> {
    for column in &from.columns {
        match to.column(&column.name) {
            None => {
                return Err(Error::schema_evolution_unsafe(format!(
                    "column `{}.{}` would be dropped",
                    from.name, column.name
                )));
            }
            Some(new) if new.ty != column.ty => {
                return Err(Error::schema_evolution_unsafe(format!(
                    "column `{}.{}` would change type from {} to {}",
                    from.name, column.name, column.ty, new.ty
                )));
            }
            Some(_) => {}
        }
    }

    for column in &to.columns {
        if from.column(&column.name).is_none() {
            items.push(DiffItem::AddColumn {
                table: &to.name,
                column,
            });
        }
    }

    Ok(())
}

fn diff_indices<'a>(
    from: &'a db::Table,
    to: &'a db::Table,
    items: &mut Vec<DiffItem<'a>>,
) -> Result<()> {
    for index in &from.indices {
        let survives = to
            .indices
            .iter()
            .any(|new| new.name == index.name && new.columns == index.columns);
        if !survives {
            return Err(Error::schema_evolution_unsafe(format!(
                "unique index `{}` would be dropped",
                index.name
            )));
        }
    }

    for index in &to.indices {
        if !from.indices.iter().any(|old| old.name == index.name) {
            items.push(DiffItem::CreateIndex(index));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SchemaGraph;
    use crate::schema::{builder::build_db_schema, Schema, Table};

    fn db_schema(json: serde_json::Value) -> db::Schema {
        let tables: Vec<Table> = serde_json::from_value(json).unwrap();
        let graph = SchemaGraph::build(&Schema::new(tables).unwrap()).unwrap();
        build_db_schema(&graph)
    }

    fn zoo(fields: serde_json::Value) -> db::Schema {
        db_schema(serde_json::json!([{"name": "zoo", "fields": fields}]))
    }

    #[test]
    fn identical_schemas_produce_an_empty_diff() {
        let a = zoo(serde_json::json!([{"name": "Name", "type": "string", "unique": true}]));
        let b = zoo(serde_json::json!([{"name": "Name", "type": "string", "unique": true}]));

        assert!(SchemaDiff::from(Some(&a), &b).unwrap().is_empty());
    }

    #[test]
    fn first_apply_creates_everything() {
        let to = zoo(serde_json::json!([{"name": "Name", "type": "string", "unique": true}]));
        let diff = SchemaDiff::from(None, &to).unwrap();

        assert!(matches!(diff.items()[0], DiffItem::CreateTable(t) if t.name == "zoo"));
        assert!(matches!(diff.items()[1], DiffItem::CreateIndex(i) if i.unique));
    }

    #[test]
    fn new_column_is_added() {
        let from = zoo(serde_json::json!([{"name": "Name", "type": "string"}]));
        let to = zoo(serde_json::json!([
            {"name": "Name", "type": "string"},
            {"name": "State", "type": "string"}
        ]));

        let diff = SchemaDiff::from(Some(&from), &to).unwrap();
        assert_eq!(diff.items().len(), 1);
        assert!(
            matches!(diff.items()[0], DiffItem::AddColumn { table, column } if table == "zoo" && column.name == "State")
        );
    }

    #[test]
    fn retyped_column_is_rejected() {
        let from = zoo(serde_json::json!([{"name": "Name", "type": "string"}]));
        let to = zoo(serde_json::json!([{"name": "Name", "type": "number"}]));

        let err = SchemaDiff::from(Some(&from), &to).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::SchemaEvolutionUnsafe);
        assert!(err.to_string().contains("change type"));
    }

    #[test]
    fn dropped_column_is_rejected() {
        let from = zoo(serde_json::json!([
            {"name": "Name", "type": "string"},
            {"name": "State", "type": "string"}
        ]));
        let to = zoo(serde_json::json!([{"name": "Name", "type": "string"}]));

        let err = SchemaDiff::from(Some(&from), &to).unwrap_err();
        assert!(err.to_string().contains("would be dropped"));
    }

    #[test]
    fn dropped_table_is_rejected() {
        let from = db_schema(serde_json::json!([{"name": "zoo"}, {"name": "aquarium"}]));
        let to = db_schema(serde_json::json!([{"name": "zoo"}]));

        let err = SchemaDiff::from(Some(&from), &to).unwrap_err();
        assert!(err.to_string().contains("table `aquarium` would be dropped"));
    }
}
