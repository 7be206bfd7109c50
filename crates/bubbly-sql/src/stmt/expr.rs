use super::Select;

use bubbly_core::Value;

/// A filter expression over a single table (optionally correlated with an
/// outer table through qualified column references).
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal value, bound as a statement parameter.
    Value(Value),

    /// A column reference, optionally table-qualified.
    Column(ColumnRef),

    /// A binary comparison.
    BinaryOp {
        lhs: Box<Expr>,
        op: BinaryOp,
        rhs: Box<Expr>,
    },

    /// `expr [NOT] IN (list)`
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negate: bool,
    },

    /// Conjunction of the operands.
    And(Vec<Expr>),

    /// `expr IS NULL`
    IsNull(Box<Expr>),

    /// `EXISTS (subquery)`, for child filters that gate the parent.
    Exists(Box<Select>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

impl Expr {
    pub fn column(column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef {
            table: None,
            column: column.into(),
        })
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef {
            table: Some(table.into()),
            column: column.into(),
        })
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    /// Equality with SQL null semantics: comparing against a null value
    /// becomes `IS NULL` so that natural-key lookups can match null parts.
    pub fn eq(lhs: Expr, rhs: Expr) -> Self {
        if matches!(rhs, Expr::Value(Value::Null)) {
            return Expr::IsNull(Box::new(lhs));
        }
        Expr::binary_op(lhs, BinaryOp::Eq, rhs)
    }

    pub fn binary_op(lhs: Expr, op: BinaryOp, rhs: Expr) -> Self {
        Expr::BinaryOp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    pub fn in_list(expr: Expr, list: Vec<Expr>, negate: bool) -> Self {
        Expr::InList {
            expr: Box::new(expr),
            list,
            negate,
        }
    }

    pub fn exists(select: Select) -> Self {
        Expr::Exists(Box::new(select))
    }

    /// Combines the expressions into a conjunction; `None` when empty.
    pub fn and_from_vec(mut exprs: Vec<Expr>) -> Option<Expr> {
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}
