use super::{Direction, Expr, Statement};

#[derive(Debug, Clone)]
pub struct Select {
    /// The table to select from
    pub table: String,

    /// What the query returns
    pub returning: Returning,

    /// WHERE clause
    pub filter: Option<Expr>,

    /// ORDER BY clauses, applied in order
    pub order_by: Vec<OrderBy>,

    /// LIMIT clause
    pub limit: Option<u64>,
}

/// The projection of a SELECT.
#[derive(Debug, Clone)]
pub enum Returning {
    /// Named columns of the selected table.
    Columns(Vec<String>),

    /// The literal `1`, as used by EXISTS subqueries.
    One,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

impl Select {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            returning: Returning::Columns(columns),
            filter: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// An `EXISTS`-shaped subquery over the table.
    pub fn exists(table: impl Into<String>, filter: Option<Expr>) -> Self {
        Self {
            table: table.into(),
            returning: Returning::One,
            filter,
            order_by: Vec::new(),
            limit: None,
        }
    }
}

impl From<Select> for Statement {
    fn from(value: Select) -> Self {
        Self::Select(value)
    }
}
