use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::schema::Schema;
use crate::storage::{JsonDirStorage, MemoryStorage, TableStorage};
use crate::table::Table;

/// Registry of all tables by name.
///
/// The catalog is rebuilt from storage when it is opened and writes a table
/// back in full after every mutation that changed it. There is no locking:
/// two processes sharing a data directory can overwrite each other.
pub struct Catalog {
    tables: HashMap<String, Table>,
    storage: Box<dyn TableStorage>,
}

impl Catalog {
    /// Opens the catalog over `storage`, discovering every persisted table.
    pub fn with_storage(storage: Box<dyn TableStorage>) -> Result<Self> {
        let tables: HashMap<String, Table> = storage
            .load_all()?
            .into_iter()
            .map(|table| (table.name().to_string(), table))
            .collect();
        info!(tables = tables.len(), "catalog opened");
        Ok(Self { tables, storage })
    }

    /// Opens the JSON directory named by `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::with_storage(Box::new(JsonDirStorage::open(config)?))
    }

    /// A catalog that never touches the file system.
    pub fn in_memory() -> Self {
        Self {
            tables: HashMap::new(),
            storage: Box::new(MemoryStorage::new()),
        }
    }

    /// Creates and persists an empty table.
    ///
    /// # Errors
    /// [DbError::TableAlreadyExists], [DbError::InvalidTableName],
    /// [DbError::DuplicateColumn] or a storage failure. The catalog is left
    /// unchanged on error.
    pub fn create(&mut self, name: &str, schema: Schema) -> Result<()> {
        if self.tables.contains_key(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        let table = Table::new(name, schema)?;
        self.storage.save(&table)?;
        info!(table = name, columns = table.columns().len(), "table created");
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Removes a table and its persisted unit.
    pub fn drop(&mut self, name: &str) -> Result<()> {
        if !self.tables.contains_key(name) {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        self.storage.remove(name)?;
        self.tables.remove(name);
        info!(table = name, "table dropped");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Like [Catalog::get] but reports a missing table as an error.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs a mutation against table `name`, then persists the table if the
    /// mutation changed it.
    ///
    /// The table is saved even when `mutate` fails part way, so rows an UPDATE
    /// committed before its failing row are not lost on restart.
    ///
    /// When `mutate` succeeds but the table cannot be saved, the in-memory
    /// table is rolled back and the storage error is returned.
    pub fn mutate<T>(
        &mut self,
        name: &str,
        mutate: impl FnOnce(&mut Table) -> Result<T>,
    ) -> Result<T> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        let snapshot = table.clone();
        let outcome = mutate(&mut *table);
        if table.revision() == snapshot.revision() {
            return outcome;
        }
        match (outcome, self.storage.save(table)) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(save_err)) => {
                warn!(table = name, error = %save_err, "could not persist mutation, rolled back");
                *table = snapshot;
                Err(save_err)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(save_err)) => {
                warn!(table = name, error = %save_err, "could not persist partial mutation");
                Err(err)
            }
        }
    }
}
