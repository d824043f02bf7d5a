//! Loader and session configuration.
//!
//! Settings come from an optional JSON file (`~/.psq/config.json` by default)
//! and are then overridden by command-line flags. Every component receives its
//! options explicitly; there is no global state.

use crate::types::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "~/.psq/config.json";

/// Rows buffered before a flush is triggered.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10_000;

/// Rows bound into a single multi-row INSERT.
pub const DEFAULT_ROWS_PER_STATEMENT: usize = 100;

/// SQLite's `SQLITE_MAX_VARIABLE_NUMBER` for bundled builds (3.32+).
pub const DEFAULT_MAX_BOUND_PARAMETERS: usize = 32_766;

/// Uniform column type of a destination table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Numeric,
}

impl ColumnType {
    /// SQL type name used in DDL.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Numeric => "NUMERIC",
        }
    }
}

/// What to do with nested map values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestedMode {
    /// Each leaf becomes its own column named by its dotted path
    #[default]
    Flatten,
    /// Nested maps are stored as `NULL`
    Drop,
}

/// Options for one bulk loader instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Column type applied to every column of the table
    pub column_type: ColumnType,

    /// Nested map handling
    pub nested: NestedMode,

    /// Buffered rows that trigger a flush
    pub batch_threshold: usize,

    /// Upper bound on rows per INSERT statement
    pub rows_per_statement: usize,

    /// Store limit on bound parameters per statement
    pub max_bound_parameters: usize,

    /// Explicit column list; when set, columns are not inferred from records
    pub columns: Option<Vec<String>>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            column_type: ColumnType::default(),
            nested: NestedMode::default(),
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            rows_per_statement: DEFAULT_ROWS_PER_STATEMENT,
            max_bound_parameters: DEFAULT_MAX_BOUND_PARAMETERS,
            columns: None,
        }
    }
}

impl LoaderOptions {
    /// Rows per INSERT statement for a table with `columns` columns.
    ///
    /// Bounded by both `rows_per_statement` and the parameter ceiling, and
    /// never less than one row.
    pub fn rows_per_statement_for(&self, columns: usize) -> usize {
        let by_parameters = if columns == 0 {
            self.rows_per_statement
        } else {
            self.max_bound_parameters / columns
        };

        self.rows_per_statement.min(by_parameters).max(1)
    }

    /// Check option invariants.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConfigError` if a limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.batch_threshold == 0 {
            return Err(DatabaseError::ConfigError("batch_threshold must be positive".to_string()));
        }
        if self.rows_per_statement == 0 {
            return Err(DatabaseError::ConfigError("rows_per_statement must be positive".to_string()));
        }
        if self.max_bound_parameters == 0 {
            return Err(DatabaseError::ConfigError("max_bound_parameters must be positive".to_string()));
        }
        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err(DatabaseError::ConfigError("column override is empty".to_string()));
            }
        }
        Ok(())
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Options passed to every loader
    pub loader: LoaderOptions,

    /// Filter rows with the query's WHERE clause while loading
    pub pushdown: bool,

    /// Convert numeric-looking CSV fields to numbers
    pub convert_numbers: bool,

    /// Destination tables are named `{table_prefix}{index}`
    pub table_prefix: String,

    /// Store file; an in-memory store is used when unset
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loader: LoaderOptions::default(),
            pushdown: true,
            convert_numbers: false,
            table_prefix: "t_".to_string(),
            db_path: None,
        }
    }
}

impl Config {
    /// Default config file path with `~` expanded.
    pub fn default_config_file() -> PathBuf {
        PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_FILE).into_owned())
    }

    /// Load configuration from the default file, or defaults if it is absent.
    pub fn load() -> Result<Self> {
        let file = Self::default_config_file();
        if file.exists() {
            Self::load_from(&file)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConfigError` if the file is not valid
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| DatabaseError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| DatabaseError::ConfigError(format!("Serialize error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check configuration invariants.
    pub fn validate(&self) -> Result<()> {
        self.loader.validate()?;

        let prefix_ok = self
            .table_prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self
                .table_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !prefix_ok {
            return Err(DatabaseError::ConfigError(format!(
                "Invalid table prefix: {:?}",
                self.table_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rows_per_statement_bounds() {
        let opts = LoaderOptions::default();
        assert_eq!(opts.rows_per_statement_for(3), 100);
        assert_eq!(opts.rows_per_statement_for(1000), 32);

        let opts = LoaderOptions {
            max_bound_parameters: 10,
            ..LoaderOptions::default()
        };
        assert_eq!(opts.rows_per_statement_for(4), 2);
        assert_eq!(opts.rows_per_statement_for(20), 1);
    }

    #[test]
    fn test_partial_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"pushdown": false, "loader": {"column_type": "numeric"}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.pushdown);
        assert_eq!(config.loader.column_type, ColumnType::Numeric);
        assert_eq!(config.loader.batch_threshold, DEFAULT_BATCH_THRESHOLD);
        assert_eq!(config.table_prefix, "t_");
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            convert_numbers: true,
            table_prefix: "src_".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config() {
        let config = Config {
            table_prefix: "bad prefix".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            table_prefix: "1t".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            loader: LoaderOptions {
                batch_threshold: 0,
                ..LoaderOptions::default()
            },
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DatabaseError::ConfigError(_))));
    }
}
