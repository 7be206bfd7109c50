use super::Statement;

use bubbly_core::Value;

#[derive(Debug, Clone)]
pub struct Insert {
    /// The table to insert into
    pub table: String,

    /// The columns being set
    pub columns: Vec<String>,

    /// One value per column
    pub values: Vec<Value>,

    /// Columns returned for the inserted row
    pub returning: Option<Vec<String>>,
}

impl From<Insert> for Statement {
    fn from(value: Insert) -> Self {
        Self::Insert(value)
    }
}
