use super::{ColumnDef, Statement};

use bubbly_core::schema::db;

#[derive(Debug, Clone)]
pub struct AddColumn {
    /// The table being altered
    pub table: String,

    /// The column to add
    pub column: ColumnDef,
}

impl Statement {
    pub fn add_column(table: impl Into<String>, column: &db::Column) -> Self {
        AddColumn {
            table: table.into(),
            column: ColumnDef::from_schema(column),
        }
        .into()
    }
}

impl From<AddColumn> for Statement {
    fn from(value: AddColumn) -> Self {
        Self::AddColumn(value)
    }
}
