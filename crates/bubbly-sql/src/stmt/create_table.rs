use super::Statement;

use bubbly_core::schema::db;

#[derive(Debug, Clone)]
pub struct CreateTable {
    /// Name of the table
    pub name: String,

    /// Column definitions
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub ty: db::Type,
    pub primary_key: bool,
    pub references: Option<String>,
}

impl ColumnDef {
    pub fn from_schema(column: &db::Column) -> Self {
        Self {
            name: column.name.clone(),
            ty: column.ty,
            primary_key: column.primary_key,
            references: column.references.clone(),
        }
    }
}

impl Statement {
    pub fn create_table(table: &db::Table) -> Self {
        CreateTable {
            name: table.name.clone(),
            columns: table.columns.iter().map(ColumnDef::from_schema).collect(),
        }
        .into()
    }
}

impl From<CreateTable> for Statement {
    fn from(value: CreateTable) -> Self {
        Self::CreateTable(value)
    }
}
