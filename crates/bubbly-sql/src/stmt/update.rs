use super::{Expr, Statement};

use bubbly_core::Value;

#[derive(Debug, Clone)]
pub struct Update {
    /// The table to update
    pub table: String,

    /// Column assignments
    pub assignments: Vec<(String, Value)>,

    /// WHERE clause
    pub filter: Option<Expr>,
}

impl From<Update> for Statement {
    fn from(value: Update) -> Self {
        Self::Update(value)
    }
}
