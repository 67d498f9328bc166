use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::value::Value;

/// Column level constraint tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    PrimaryKey,
    Unique,
    NotNull,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKey => write!(f, "PRIMARY KEY"),
            Self::Unique => write!(f, "UNIQUE"),
            Self::NotNull => write!(f, "NOT NULL"),
        }
    }
}

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// Constraint tags in declaration order, without duplicates.
    pub constraints: Vec<Constraint>,
}

impl ColumnDef {
    /// A column without constraints.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint, ignoring repeats.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn has(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    /// PRIMARY KEY and UNIQUE columns reject duplicate values and always
    /// carry a hash index.
    pub fn is_unique(&self) -> bool {
        self.has(Constraint::PrimaryKey) || self.has(Constraint::Unique)
    }

    /// Checks a raw value against this column and returns its coerced form.
    ///
    /// # Errors
    /// - [DbError::NullConstraintViolation] for `NULL` in a NOT NULL column.
    /// - [DbError::TypeConversion] when the value does not fit the type.
    pub fn validate(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            if self.has(Constraint::NotNull) {
                return Err(DbError::NullConstraintViolation(self.name.clone()));
            }
            return Ok(Value::Null);
        }
        self.data_type
            .coerce(value)
            .ok_or_else(|| DbError::TypeConversion {
                column: self.name.clone(),
                value: value.to_string(),
                expected: self.data_type.to_string(),
            })
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        for constraint in &self.constraints {
            write!(f, " {constraint}")?;
        }
        Ok(())
    }
}

/// Ordered column definitions of a table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// Position of a column by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
