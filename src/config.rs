//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where and how tables are persisted.
///
/// # Example
///
/// ```rust
/// use minirdb::DatabaseConfig;
///
/// let config = DatabaseConfig::with_data_dir("/tmp/minirdb");
/// assert!(config.pretty_json);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding one `<table>.json` document per table.
    pub data_dir: PathBuf,

    /// Indent the persisted documents.
    pub pretty_json: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            pretty_json: true,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with the specified data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}
