pub mod ast;
pub mod catalog;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod index;
pub mod parser;
pub mod schema;
pub mod storage;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use ast::Predicate;
pub use catalog::Catalog;
pub use config::DatabaseConfig;
pub use data_type::DataType;
pub use database::{Database, QueryOutput, QueryResult};
pub use error::{DbError, Result};
pub use schema::{ColumnDef, Constraint, Schema};
pub use table::Table;
pub use value::Value;
