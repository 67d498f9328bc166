//! Error type shared by every engine operation.
//!
//! Failures are values: each public operation returns [`Result`] and the
//! variant tells the caller exactly which rule was broken.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, DbError>;

/// Every way an engine operation can fail.
#[derive(Debug, Error)]
pub enum DbError {
    /// `CREATE TABLE` for a name that is already in the catalog.
    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    /// Table names must start with a letter or underscore and contain only
    /// letters, digits or underscores.
    #[error(
        "table name '{0}' is invalid: names must start with a letter or underscore \
         and contain only letters, digits or underscores"
    )]
    InvalidTableName(String),

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// The number of values does not match the number of columns.
    #[error("table '{table}' has {expected} columns ({columns}), but {found} values were provided")]
    ColumnCountMismatch {
        table: String,
        expected: usize,
        found: usize,
        /// Comma separated column names, for the message.
        columns: String,
    },

    #[error("column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Two column definitions share the same name.
    #[error("column '{0}' is defined more than once")]
    DuplicateColumn(String),

    /// A value could not be coerced to the column type.
    #[error("cannot convert {value} to {expected} for column '{column}'")]
    TypeConversion {
        column: String,
        value: String,
        expected: String,
    },

    #[error("column '{0}' cannot be NULL")]
    NullConstraintViolation(String),

    /// A PRIMARY KEY or UNIQUE column already holds the value.
    #[error("duplicate value {value} for unique column '{column}'")]
    UniqueConstraintViolation { column: String, value: String },

    /// The WHERE clause is not a single `column = value` test.
    #[error("malformed predicate near '{0}': only `column = value` is supported")]
    MalformedPredicate(String),

    /// The JOIN condition is not `left.col = right.col` over the joined tables.
    #[error("malformed join condition: {0}")]
    MalformedJoinCondition(String),

    /// The command text could not be parsed.
    #[error("syntax error: {message} near '{fragment}'")]
    Syntax { message: String, fragment: String },

    /// A persisted table unit is inconsistent.
    #[error("table '{table}' is corrupt: {reason}")]
    Corrupt { table: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub(crate) fn syntax(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        Self::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
