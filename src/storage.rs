//! Whole-table persistence.
//!
//! A table is always read and written as one unit. The [TableStorage] trait
//! keeps that policy out of the catalog so an incremental backend can replace
//! it without touching callers.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::table::Table;

/// Backend holding the persisted table units.
pub trait TableStorage {
    /// Loads every persisted table.
    fn load_all(&self) -> Result<Vec<Table>>;

    /// Writes `table` in full, replacing any previous version.
    fn save(&mut self, table: &Table) -> Result<()>;

    /// Deletes the unit of table `name`. Missing units are not an error.
    fn remove(&mut self, name: &str) -> Result<()>;
}

/// One JSON document per table in a directory: `<dir>/<table>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStorage {
    dir: PathBuf,
    pretty: bool,
}

impl JsonDirStorage {
    /// Opens the data directory of `config`, creating it when missing.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            dir: config.data_dir.clone(),
            pretty: config.pretty_json,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn load_file(&self, path: &Path) -> Result<Table> {
        let reader = BufReader::new(File::open(path)?);
        let mut table: Table = serde_json::from_reader(reader)?;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != table.name() {
            return Err(DbError::Corrupt {
                table: stem.to_string(),
                reason: format!("document holds table '{}'", table.name()),
            });
        }
        table.check_integrity()?;
        Ok(table)
    }
}

impl TableStorage for JsonDirStorage {
    fn load_all(&self) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                tables.push(self.load_file(&path)?);
            }
        }
        tables.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(tables)
    }

    fn save(&mut self, table: &Table) -> Result<()> {
        let target = self.path_of(table.name());
        let staging = self.dir.join(format!("{}.json.tmp", table.name()));

        let mut writer = BufWriter::new(File::create(&staging)?);
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, table)?;
        } else {
            serde_json::to_writer(&mut writer, table)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&staging, &target)?;
        debug!(table = table.name(), path = %target.display(), "table saved");
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_of(name)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Keeps the serialized documents in memory.
///
/// Tables still go through the full serialize/deserialize cycle, so this
/// behaves like [JsonDirStorage] without touching the file system.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    documents: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn document(&self, name: &str) -> Option<&str> {
        self.documents.get(name).map(String::as_str)
    }
}

impl TableStorage for MemoryStorage {
    fn load_all(&self) -> Result<Vec<Table>> {
        let mut tables = self
            .documents
            .values()
            .map(|doc| {
                let mut table: Table = serde_json::from_str(doc)?;
                table.check_integrity()?;
                Ok(table)
            })
            .collect::<Result<Vec<_>>>()?;
        tables.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(tables)
    }

    fn save(&mut self, table: &Table) -> Result<()> {
        let document = serde_json::to_string(table)?;
        self.documents.insert(table.name().to_string(), document);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        self.documents.remove(name);
        Ok(())
    }
}
