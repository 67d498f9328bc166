use std::collections::HashMap;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::Predicate;
use crate::error::{DbError, Result};
use crate::index::HashIndex;
use crate::schema::{ColumnDef, Schema};
use crate::value::Value;

/// One stored row: a value per column, in schema order.
pub type Row = Vec<Value>;

/// A table: schema, rows and equality indexes.
///
/// This struct is also the persisted unit. It serializes to one self contained
/// document holding the name, the ordered column names, the column
/// definitions, the rows and the index contents.
///
/// A row is identified by its position in `rows`. Deleting rows shifts the
/// positions that follow, so every delete rebuilds the indexes instead of
/// patching them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    name: String,
    column_names: Vec<String>,
    #[serde(rename = "columns")]
    schema: Schema,
    rows: Vec<Row>,
    indexes: HashMap<String, HashIndex>,
    /// Bumped on every committed mutation; lets the catalog skip writes for
    /// operations that changed nothing.
    #[serde(skip)]
    revision: u64,
}

impl Table {
    /// Creates an empty table.
    ///
    /// PRIMARY KEY and UNIQUE columns get a hash index straight away.
    ///
    /// # Errors
    /// - [DbError::InvalidTableName] if `name` is not an identifier.
    /// - [DbError::DuplicateColumn] if two columns share a name.
    pub fn new(name: impl Into<String>, schema: Schema) -> Result<Self> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(DbError::InvalidTableName(name));
        }
        for (i, column) in schema.columns.iter().enumerate() {
            if schema.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::DuplicateColumn(column.name.clone()));
            }
        }
        let indexes = schema
            .columns
            .iter()
            .filter(|c| c.is_unique())
            .map(|c| (c.name.clone(), HashIndex::new()))
            .collect();
        Ok(Self {
            name,
            column_names: schema.names(),
            schema,
            rows: Vec::new(),
            indexes,
            revision: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.schema.columns
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_row(&self, row_idx: usize) -> Option<&Row> {
        self.rows.get(row_idx)
    }

    pub fn get_col(&self, name: &str) -> Option<&ColumnDef> {
        self.schema.columns.iter().find(|col| col.name == name)
    }

    pub fn indexes(&self) -> &HashMap<String, HashIndex> {
        &self.indexes
    }

    pub fn index(&self, column: &str) -> Option<&HashIndex> {
        self.indexes.get(column)
    }

    /// Names of the indexed columns, in schema order.
    pub fn indexed_columns(&self) -> Vec<&str> {
        self.schema
            .columns
            .iter()
            .filter(|c| self.indexes.contains_key(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    /// Validates and appends a row, then indexes it.
    ///
    /// Nothing is written unless every value passes its column check and
    /// every unique constraint holds against the current rows.
    ///
    /// Returns the position of the new row.
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.schema.len() {
            return Err(DbError::ColumnCountMismatch {
                table: self.name.clone(),
                expected: self.schema.len(),
                found: values.len(),
                columns: self.column_names.join(", "),
            });
        }
        let row = values
            .iter()
            .zip(&self.schema.columns)
            .map(|(value, column)| column.validate(value))
            .collect::<Result<Row>>()?;
        self.check_constraints(&row, None)?;

        let position = self.rows.len();
        for (column, index) in self.indexes.iter_mut() {
            if let Some(col_idx) = self.schema.position(column) {
                index.insert(&row[col_idx], position);
            }
        }
        self.rows.push(row);
        self.revision += 1;
        Ok(position)
    }

    /// Applies `assignments` to every row matching `predicate` (all rows when
    /// `None`) and returns how many rows were updated.
    ///
    /// Rows are committed one at a time: each candidate row is validated and
    /// checked against the rest of the table before it replaces the old one.
    /// If a later row fails, the rows before it stay updated.
    ///
    /// # Errors
    /// [DbError::ColumnNotFound] for an unknown assignment target (checked
    /// before any row is touched), otherwise the first validation or
    /// constraint failure.
    pub fn update(
        &mut self,
        predicate: Option<&Predicate>,
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let targets = assignments
            .iter()
            .map(|(column, value)| {
                self.schema
                    .position(column)
                    .map(|idx| (idx, value))
                    .ok_or_else(|| DbError::column_not_found(&self.name, column))
            })
            .collect::<Result<Vec<_>>>()?;
        let positions = self.matching_positions(predicate)?;

        for &position in &positions {
            let mut candidate = self.rows[position].clone();
            for &(col_idx, value) in &targets {
                candidate[col_idx] = self.schema.columns[col_idx].validate(value)?;
            }
            self.check_constraints(&candidate, Some(position))?;

            let previous = std::mem::replace(&mut self.rows[position], candidate);
            for (column, index) in self.indexes.iter_mut() {
                if let Some(col_idx) = self.schema.position(column) {
                    let new_value = &self.rows[position][col_idx];
                    if previous[col_idx].key() != new_value.key() {
                        index.remove(&previous[col_idx], position);
                        index.insert(new_value, position);
                    }
                }
            }
            self.revision += 1;
        }
        Ok(positions.len())
    }

    /// Removes every row matching `predicate` and returns how many were
    /// removed. Without a predicate the table is emptied.
    pub fn delete(&mut self, predicate: Option<&Predicate>) -> Result<usize> {
        let Some(predicate) = predicate else {
            let count = self.rows.len();
            self.clear();
            return Ok(count);
        };
        let positions = self.matching_positions(Some(predicate))?;
        if positions.is_empty() {
            return Ok(0);
        }

        let mut doomed = bitvec![0; self.rows.len()];
        for &position in &positions {
            doomed.set(position, true);
        }
        let mut cursor = 0;
        self.rows.retain(|_| {
            let keep = !doomed[cursor];
            cursor += 1;
            keep
        });
        self.rebuild_indexes();
        self.revision += 1;
        Ok(positions.len())
    }

    /// Removes all rows, keeping the schema and the (now empty) indexes.
    pub fn clear(&mut self) {
        self.rows.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
        self.revision += 1;
    }

    /// Rows matching `predicate`, in table order. All rows when `None`.
    pub fn select(&self, predicate: Option<&Predicate>) -> Result<Vec<Row>> {
        Ok(self
            .matching_positions(predicate)?
            .into_iter()
            .map(|position| self.rows[position].clone())
            .collect())
    }

    /// Positions of the rows matching `predicate`, ascending.
    ///
    /// Uses the column's hash index when there is one, a full scan otherwise.
    pub fn matching_positions(&self, predicate: Option<&Predicate>) -> Result<Vec<usize>> {
        let Some(predicate) = predicate else {
            return Ok((0..self.rows.len()).collect());
        };
        let (col_idx, literal) = self.resolve_predicate(predicate)?;
        let Some(literal) = literal else {
            return Ok(Vec::new());
        };
        let column = &self.schema.columns[col_idx].name;
        match self.indexes.get(column) {
            Some(index) => {
                debug!(table = %self.name, %column, "index lookup");
                Ok(index.lookup(&literal).to_vec())
            }
            None => Ok(self.scan(col_idx, &literal)),
        }
    }

    /// Same as [Table::matching_positions] but never touches an index.
    pub fn scan_positions(&self, predicate: &Predicate) -> Result<Vec<usize>> {
        let (col_idx, literal) = self.resolve_predicate(predicate)?;
        Ok(literal.map_or_else(Vec::new, |literal| self.scan(col_idx, &literal)))
    }

    /// Builds a hash index on `column` from the current rows. Rebuilds it if
    /// it already exists.
    pub fn create_index(&mut self, column: &str) -> Result<()> {
        let col_idx = self
            .schema
            .position(column)
            .ok_or_else(|| DbError::column_not_found(&self.name, column))?;
        let index = HashIndex::build(self.rows.iter().map(|row| &row[col_idx]));
        self.indexes.insert(column.to_string(), index);
        self.revision += 1;
        Ok(())
    }

    /// Verifies a freshly loaded table and repairs stale index contents.
    ///
    /// # Errors
    /// [DbError::Corrupt] when the column names disagree with the column
    /// definitions, an index names an unknown column, or a row has the wrong
    /// number of values.
    pub(crate) fn check_integrity(&mut self) -> Result<()> {
        let corrupt = |reason: String| DbError::Corrupt {
            table: self.name.clone(),
            reason,
        };
        if self.column_names != self.schema.names() {
            return Err(corrupt("column names do not match column definitions".into()));
        }
        if let Some(column) = self.indexes.keys().find(|c| self.schema.position(c).is_none()) {
            return Err(corrupt(format!("index on unknown column '{column}'")));
        }
        if let Some(position) = self.rows.iter().position(|r| r.len() != self.schema.len()) {
            return Err(corrupt(format!(
                "row {position} has {} values, expected {}",
                self.rows[position].len(),
                self.schema.len()
            )));
        }

        for column in self.schema.columns.iter().filter(|c| c.is_unique()) {
            self.indexes.entry(column.name.clone()).or_default();
        }
        for (column, index) in self.indexes.iter_mut() {
            if let Some(col_idx) = self.schema.position(column) {
                let rebuilt = HashIndex::build(self.rows.iter().map(|row| &row[col_idx]));
                if *index != rebuilt {
                    warn!(table = %self.name, %column, "stored index is stale, rebuilt it");
                    *index = rebuilt;
                }
            }
        }
        Ok(())
    }

    /// Returns the first unique constraint `row` would break, ignoring the
    /// row at `exclude` (the row an update replaces).
    fn check_constraints(&self, row: &Row, exclude: Option<usize>) -> Result<()> {
        for (col_idx, column) in self.schema.columns.iter().enumerate() {
            if !column.is_unique() {
                continue;
            }
            let value = &row[col_idx];
            let Some(key) = value.key() else {
                continue;
            };
            let clash = match self.indexes.get(&column.name) {
                Some(index) => index.lookup(value).iter().any(|p| Some(*p) != exclude),
                None => self.rows.iter().enumerate().any(|(p, other)| {
                    Some(p) != exclude && other[col_idx].key().as_ref() == Some(&key)
                }),
            };
            if clash {
                return Err(DbError::UniqueConstraintViolation {
                    column: column.name.clone(),
                    value: key,
                });
            }
        }
        Ok(())
    }

    /// Resolves the predicate column and normalises its literal to the column
    /// type. A literal that cannot be normalised comes back as `None`: it can
    /// not equal any stored value.
    fn resolve_predicate(&self, predicate: &Predicate) -> Result<(usize, Option<Value>)> {
        let column = &predicate.column;
        if column.table.as_ref().is_some_and(|t| *t != self.name) {
            return Err(DbError::column_not_found(&self.name, &column.to_string()));
        }
        let col_idx = self
            .schema
            .position(&column.column)
            .ok_or_else(|| DbError::column_not_found(&self.name, &column.column))?;
        let literal = self.schema.columns[col_idx]
            .data_type
            .normalize_literal(&predicate.value)
            .filter(|v| !v.is_null());
        Ok((col_idx, literal))
    }

    fn scan(&self, col_idx: usize, literal: &Value) -> Vec<usize> {
        let key = literal.key();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row[col_idx].key().is_some() && row[col_idx].key() == key)
            .map(|(position, _)| position)
            .collect()
    }

    fn rebuild_indexes(&mut self) {
        debug!(table = %self.name, "rebuilding indexes");
        for (column, index) in self.indexes.iter_mut() {
            if let Some(col_idx) = self.schema.position(column) {
                *index = HashIndex::build(self.rows.iter().map(|row| &row[col_idx]));
            }
        }
    }
}

/// Letter or underscore first, then letters, digits or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
