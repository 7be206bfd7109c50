pub mod builder;

pub mod db;

mod diff;
pub use diff::{DiffItem, SchemaDiff};

mod table;
pub use table::{Field, FieldType, Join, Table};

use crate::{Error, Result};

use indexmap::IndexMap;

/// Name of the implicit surrogate-key column present on every table.
pub const ID_COLUMN: &str = "_id";

/// Name of the implicit foreign-key column referencing a parent table.
pub fn parent_id_column(parent: &str) -> String {
    format!("{parent}_id")
}

/// The compiled, flattened schema: every declared table (nested children
/// included) addressable by name.
///
/// Nesting is normalized away at construction: a child nested inside a parent
/// table becomes an explicit [`Join`] on the child, carrying the child's
/// `single`/`unique` properties. The original declaration is kept for
/// persistence.
#[derive(Debug, Clone)]
pub struct Schema {
    /// The declaration as handed in, before flattening.
    declared: Vec<Table>,

    /// Flattened `name -> Table` map, in declaration (pre-order) order. The
    /// stored tables have empty `tables`; nesting appears as joins.
    tables: IndexMap<String, Table>,
}

impl Schema {
    /// Compiles a schema description into its flattened form.
    ///
    /// Fails with `SchemaInvalid` on duplicate table names, duplicate field
    /// names, or fields colliding with the implicit `_id` / `<parent>_id`
    /// columns.
    pub fn new(declared: Vec<Table>) -> Result<Self> {
        let mut tables = IndexMap::new();
        flatten(&declared, None, &mut tables)?;

        for table in tables.values() {
            verify_fields(table)?;
        }

        Ok(Self { declared, tables })
    }

    /// The original declaration, before flattening.
    pub fn declared(&self) -> &[Table] {
        &self.declared
    }

    /// Get a table by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Iterate over all tables in declaration (pre-order) order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Flattens nested tables depth-first, rewriting nesting as explicit joins on
/// the child.
fn flatten(
    tables: &[Table],
    parent: Option<&str>,
    out: &mut IndexMap<String, Table>,
) -> Result<()> {
    for table in tables {
        if out.contains_key(&table.name) {
            return Err(Error::schema_invalid(format!(
                "duplicate table `{}`",
                table.name
            )));
        }

        let mut flat = table.clone();
        flat.tables = Vec::new();

        if let Some(parent) = parent {
            flat.joins.push(Join {
                table: parent.to_string(),
                single: table.single,
                unique: table.unique,
            });
        }

        out.insert(flat.name.clone(), flat);
        flatten(&table.tables, Some(&table.name), out)?;
    }

    Ok(())
}

fn verify_fields(table: &Table) -> Result<()> {
    let mut seen = Vec::with_capacity(table.fields.len());

    for field in &table.fields {
        let implicit = field.name == ID_COLUMN
            || table
                .joins
                .iter()
                .any(|join| field.name == parent_id_column(&join.table));
        if implicit {
            return Err(Error::schema_invalid(format!(
                "field `{}` on table `{}` collides with an implicit column",
                field.name, table.name
            )));
        }
        if seen.contains(&&field.name) {
            return Err(Error::schema_invalid(format!(
                "duplicate field `{}` on table `{}`",
                field.name, table.name
            )));
        }
        seen.push(&field.name);
    }

    Ok(())
}
