//! The selection plan handed from the GraphQL layer to a provider.

use bubbly_core::graph::NodeId;
use bubbly_core::Value;
use bubbly_sql::stmt::Direction;

/// A selection over one table: which fields to return, how to filter, order
/// and paginate the rows, and which edges to follow into nested selections.
///
/// Argument values are already coerced to their declared field types when the
/// plan is built, so providers translate them to SQL without further checks.
#[derive(Debug, Clone)]
pub struct Selection {
    /// The graph node being selected.
    pub node: NodeId,

    /// The table name, denormalized for SQL generation.
    pub table: String,

    /// Scalar fields to return, in selection order. `_id` is always fetched
    /// whether or not it is listed here.
    pub fields: Vec<String>,

    /// Equality predicates from plain arguments.
    pub eq: Vec<(String, Value)>,

    /// Operator predicates from the `filter` argument.
    pub filter: Vec<FilterCond>,

    /// `order_by` argument; ascending `_id` when empty.
    pub order_by: Vec<(String, Direction)>,

    /// `first` pagination argument.
    pub first: Option<u64>,

    /// `last` pagination argument.
    pub last: Option<u64>,

    /// When true on a child selection, parent rows without at least one
    /// matching child are dropped.
    pub filter_on: bool,

    /// Edge subselections.
    pub children: Vec<Selection>,
}

impl Selection {
    pub fn new(node: NodeId, table: impl Into<String>) -> Self {
        Self {
            node,
            table: table.into(),
            fields: Vec::new(),
            eq: Vec::new(),
            filter: Vec::new(),
            order_by: Vec::new(),
            first: None,
            last: None,
            filter_on: false,
            children: Vec::new(),
        }
    }
}

/// One operator predicate from a `filter` argument, e.g. `Capacity_gt: 5`.
#[derive(Debug, Clone)]
pub struct FilterCond {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
}

impl FilterOp {
    /// The argument-name suffixes, checked longest-first so that `_gte` is
    /// not mistaken for `_gt`.
    pub const SUFFIXES: [(&'static str, FilterOp); 6] = [
        ("_not_in", FilterOp::NotIn),
        ("_gte", FilterOp::Gte),
        ("_lte", FilterOp::Lte),
        ("_gt", FilterOp::Gt),
        ("_lt", FilterOp::Lt),
        ("_in", FilterOp::In),
    ];
}
