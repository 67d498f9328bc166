//! Command descriptors produced by the parser.

use std::fmt;
use std::str::FromStr;

use crate::error::DbError;
use crate::schema::ColumnDef;
use crate::value::Value;

#[derive(Debug, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    InsertInto(InsertInto),
    Select(Select),
    Update(Update),
    Delete(Delete),
    DropTable(String),
}

impl Statement {
    /// Command family, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable(_) => "CREATE TABLE",
            Self::InsertInto(_) => "INSERT",
            Self::Select(_) => "SELECT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
            Self::DropTable(_) => "DROP TABLE",
        }
    }

    /// Name of the table the command targets first.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(create) => &create.name,
            Self::InsertInto(insert) => &insert.table,
            Self::Select(select) => &select.table,
            Self::Update(update) => &update.table,
            Self::Delete(delete) => &delete.table,
            Self::DropTable(name) => name,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, PartialEq)]
pub struct InsertInto {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Value>,
}

/// A column name, optionally qualified by its table (`orders.amount`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// A single `column = value` equality test.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: ColumnRef,
    pub value: Value,
}

impl Predicate {
    /// `column = value` on an unqualified column.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: ColumnRef::bare(column),
            value: value.into(),
        }
    }
}

impl FromStr for Predicate {
    type Err = DbError;

    /// Parses the text of a WHERE clause, e.g. `name='Alice'` or `t.id = 2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_predicate(s)
    }
}

#[derive(Debug, PartialEq)]
pub enum ColumnsSelect {
    Star,
    ColumnsNames(Vec<ColumnRef>),
}

/// `INNER JOIN table ON left = right`.
#[derive(Debug, PartialEq)]
pub struct Join {
    pub table: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, PartialEq)]
pub struct Select {
    pub columns: ColumnsSelect,
    pub table: String,
    pub join: Option<Join>,
    pub where_clause: Option<Predicate>,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub where_clause: Option<Predicate>,
}

#[derive(Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub where_clause: Option<Predicate>,
}
