use crate::stmt::{
    AddColumn, BinaryOp, ColumnDef, ColumnRef, CreateIndex, CreateTable, Direction, Expr, Insert,
    Returning, Select, Statement, Update,
};

use bubbly_core::schema::db;
use bubbly_core::Value;

use std::fmt::{self, Write};

/// Serialize a statement to a SQL string, collecting bound parameters.
#[derive(Debug)]
pub struct Serializer {
    /// The database flavor handles the differences between SQL dialects:
    /// placeholder style, column type spellings, serial primary keys.
    flavor: Flavor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Sqlite,
    Postgresql,
}

impl Serializer {
    pub fn sqlite() -> Self {
        Self {
            flavor: Flavor::Sqlite,
        }
    }

    pub fn postgresql() -> Self {
        Self {
            flavor: Flavor::Postgresql,
        }
    }

    pub fn serialize(&self, stmt: &Statement, params: &mut Vec<Value>) -> String {
        let mut fmt = Formatter {
            dst: String::new(),
            params,
            flavor: self.flavor,
        };

        fmt.statement(stmt);
        fmt.dst.push(';');
        fmt.dst
    }
}

struct Formatter<'a> {
    /// Where to write the serialized SQL
    dst: String,

    /// Where to store parameters
    params: &'a mut Vec<Value>,

    flavor: Flavor,
}

/// A double-quoted SQL identifier.
struct Ident<'a>(&'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_char('"')?;
        for c in self.0.chars() {
            if c == '"' {
                fmt.write_char('"')?;
            }
            fmt.write_char(c)?;
        }
        fmt.write_char('"')
    }
}

impl Formatter<'_> {
    fn statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::CreateTable(stmt) => self.create_table(stmt),
            Statement::AddColumn(stmt) => self.add_column(stmt),
            Statement::CreateIndex(stmt) => self.create_index(stmt),
            Statement::Select(stmt) => self.select(stmt),
            Statement::Insert(stmt) => self.insert(stmt),
            Statement::Update(stmt) => self.update(stmt),
        }
    }

    fn create_table(&mut self, stmt: &CreateTable) {
        write!(self.dst, "CREATE TABLE {} (", Ident(&stmt.name)).unwrap();
        for (i, column) in stmt.columns.iter().enumerate() {
            if i > 0 {
                self.dst.push_str(", ");
            }
            self.column_def(column);
        }
        self.dst.push(')');
    }

    fn add_column(&mut self, stmt: &AddColumn) {
        write!(self.dst, "ALTER TABLE {} ADD COLUMN ", Ident(&stmt.table)).unwrap();
        self.column_def(&stmt.column);
    }

    fn create_index(&mut self, stmt: &CreateIndex) {
        let unique = if stmt.unique { "UNIQUE " } else { "" };
        write!(
            self.dst,
            "CREATE {}INDEX {} ON {} (",
            unique,
            Ident(&stmt.name),
            Ident(&stmt.on)
        )
        .unwrap();
        for (i, column) in stmt.columns.iter().enumerate() {
            if i > 0 {
                self.dst.push_str(", ");
            }
            write!(self.dst, "{}", Ident(column)).unwrap();
        }
        self.dst.push(')');
    }

    fn column_def(&mut self, def: &ColumnDef) {
        write!(self.dst, "{}", Ident(&def.name)).unwrap();

        if def.primary_key {
            let spelling = match self.flavor {
                Flavor::Sqlite => " INTEGER PRIMARY KEY AUTOINCREMENT",
                Flavor::Postgresql => " BIGSERIAL PRIMARY KEY",
            };
            self.dst.push_str(spelling);
            return;
        }

        self.dst.push(' ');
        self.dst.push_str(self.column_type(def.ty));

        if let Some(parent) = &def.references {
            write!(
                self.dst,
                " REFERENCES {} ({}) ON DELETE CASCADE",
                Ident(parent),
                Ident("_id")
            )
            .unwrap();
        }
    }

    fn column_type(&self, ty: db::Type) -> &'static str {
        match (self.flavor, ty) {
            (_, db::Type::Boolean) => "BOOLEAN",
            (_, db::Type::Numeric) => "NUMERIC",
            (_, db::Type::Text) => "TEXT",
            // SQLite has no JSON storage class; documents are stored as text.
            (Flavor::Sqlite, db::Type::Json) => "TEXT",
            (Flavor::Postgresql, db::Type::Json) => "JSONB",
            (Flavor::Sqlite, db::Type::Integer) => "INTEGER",
            (Flavor::Postgresql, db::Type::Integer) => "BIGINT",
        }
    }

    fn select(&mut self, stmt: &Select) {
        self.dst.push_str("SELECT ");
        match &stmt.returning {
            Returning::Columns(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        self.dst.push_str(", ");
                    }
                    write!(self.dst, "{}", Ident(column)).unwrap();
                }
            }
            Returning::One => self.dst.push('1'),
        }

        write!(self.dst, " FROM {}", Ident(&stmt.table)).unwrap();

        if let Some(filter) = &stmt.filter {
            self.dst.push_str(" WHERE ");
            self.expr(filter);
        }

        for (i, order) in stmt.order_by.iter().enumerate() {
            self.dst
                .push_str(if i == 0 { " ORDER BY " } else { ", " });
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            write!(self.dst, "{} {}", Ident(&order.column), direction).unwrap();
        }

        if let Some(limit) = stmt.limit {
            write!(self.dst, " LIMIT {limit}").unwrap();
        }
    }

    fn insert(&mut self, stmt: &Insert) {
        write!(self.dst, "INSERT INTO {}", Ident(&stmt.table)).unwrap();

        if stmt.columns.is_empty() {
            self.dst.push_str(" DEFAULT VALUES");
        } else {
            self.dst.push_str(" (");
            for (i, column) in stmt.columns.iter().enumerate() {
                if i > 0 {
                    self.dst.push_str(", ");
                }
                write!(self.dst, "{}", Ident(column)).unwrap();
            }
            self.dst.push_str(") VALUES (");
            for (i, value) in stmt.values.iter().enumerate() {
                if i > 0 {
                    self.dst.push_str(", ");
                }
                self.value(value);
            }
            self.dst.push(')');
        }

        if let Some(returning) = &stmt.returning {
            self.dst.push_str(" RETURNING ");
            for (i, column) in returning.iter().enumerate() {
                if i > 0 {
                    self.dst.push_str(", ");
                }
                write!(self.dst, "{}", Ident(column)).unwrap();
            }
        }
    }

    fn update(&mut self, stmt: &Update) {
        write!(self.dst, "UPDATE {} SET ", Ident(&stmt.table)).unwrap();

        for (i, (column, value)) in stmt.assignments.iter().enumerate() {
            if i > 0 {
                self.dst.push_str(", ");
            }
            write!(self.dst, "{} = ", Ident(column)).unwrap();
            self.value(value);
        }

        if let Some(filter) = &stmt.filter {
            self.dst.push_str(" WHERE ");
            self.expr(filter);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Value(value) => self.value(value),
            Expr::Column(column) => self.column_ref(column),
            Expr::BinaryOp { lhs, op, rhs } => {
                self.expr(lhs);
                let op = match op {
                    BinaryOp::Eq => " = ",
                    BinaryOp::Ne => " <> ",
                    BinaryOp::Gt => " > ",
                    BinaryOp::Ge => " >= ",
                    BinaryOp::Lt => " < ",
                    BinaryOp::Le => " <= ",
                };
                self.dst.push_str(op);
                self.expr(rhs);
            }
            Expr::InList { expr, list, negate } => {
                // An empty IN list can never match; serialize the constant
                // outcome instead of invalid SQL.
                if list.is_empty() {
                    self.dst.push_str(if *negate { "TRUE" } else { "FALSE" });
                    return;
                }
                self.expr(expr);
                self.dst.push_str(if *negate { " NOT IN (" } else { " IN (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.dst.push_str(", ");
                    }
                    self.expr(item);
                }
                self.dst.push(')');
            }
            Expr::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        self.dst.push_str(" AND ");
                    }
                    self.expr(operand);
                }
            }
            Expr::IsNull(operand) => {
                self.expr(operand);
                self.dst.push_str(" IS NULL");
            }
            Expr::Exists(select) => {
                self.dst.push_str("EXISTS (");
                self.select(select);
                self.dst.push(')');
            }
        }
    }

    fn column_ref(&mut self, column: &ColumnRef) {
        if let Some(table) = &column.table {
            write!(self.dst, "{}.", Ident(table)).unwrap();
        }
        write!(self.dst, "{}", Ident(&column.column)).unwrap();
    }

    fn value(&mut self, value: &Value) {
        self.params.push(value.clone());
        match self.flavor {
            Flavor::Sqlite => self.dst.push('?'),
            Flavor::Postgresql => write!(self.dst, "${}", self.params.len()).unwrap(),
        }
    }
}
