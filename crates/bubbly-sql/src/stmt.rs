mod add_column;
pub use add_column::AddColumn;

mod create_index;
pub use create_index::CreateIndex;

mod create_table;
pub use create_table::{ColumnDef, CreateTable};

mod expr;
pub use expr::{BinaryOp, ColumnRef, Direction, Expr};

mod insert;
pub use insert::Insert;

mod select;
pub use select::{OrderBy, Returning, Select};

mod update;
pub use update::Update;

/// A SQL statement, ready to be serialized for a database flavor.
#[derive(Debug, Clone)]
pub enum Statement {
    CreateTable(CreateTable),
    AddColumn(AddColumn),
    CreateIndex(CreateIndex),
    Select(Select),
    Insert(Insert),
    Update(Update),
}
