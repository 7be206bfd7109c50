//! Database-level schema: what the relational store actually holds after
//! materialization.

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<Table>,
}

impl Schema {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// The name of the table in the database.
    pub name: String,

    /// Column definitions, implicit columns included.
    pub columns: Vec<Column>,

    /// Indices defined on this table.
    pub indices: Vec<Index>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// The name of the column in the database.
    pub name: String,

    /// The database storage type of the column.
    pub ty: Type,

    /// True if the column is the table's auto-incrementing primary key.
    pub primary_key: bool,

    /// Set when the column is a foreign key; names the referenced parent
    /// table. Foreign keys reference `parent(_id)` with ON DELETE CASCADE.
    pub references: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Boolean,
    Numeric,
    Text,
    Json,
    Integer,
}

impl fmt::Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Boolean => "BOOLEAN",
            Type::Numeric => "NUMERIC",
            Type::Text => "TEXT",
            Type::Json => "JSON",
            Type::Integer => "INTEGER",
        };
        fmt.write_str(name)
    }
}

/// A named index. Names are deterministic so that re-applying a schema
/// recognizes the indices it created earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    /// Index name, unique within the schema.
    pub name: String,

    /// The table being indexed.
    pub on: String,

    /// The indexed columns, in natural-key order.
    pub columns: Vec<String>,

    /// When `true`, indexed entries are unique.
    pub unique: bool,
}
