//! Query session combining record sources, bulk loaders and the store.
//!
//! This is the main entry point for running a query over files.

use crate::config::{ColumnType, Config, LoaderOptions};
use crate::ingest::{records_at_path, SourceInput};
use crate::otel::{db_span, DbOperation};
use crate::query::{compile, rewrite_with, RowPredicate, SourceRef};
use crate::storage::schema::quote_ident;
use crate::storage::{
    execute_query, BulkLoader, LoaderStats, QueryResult, RowWriter, SourceTables, StoreLocation,
};
use crate::types::{DatabaseError, Result, RowValue};
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A table loaded during this session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadedTable {
    input: SourceInput,
    filtered: bool,
    stats: LoaderStats,
}

/// Query session over one store.
///
/// The session keeps an anchor connection open for its whole lifetime; for
/// in-memory stores this is what keeps the shared database alive between
/// loader connections.
pub struct Session {
    config: Config,
    tables: SourceTables,
    location: StoreLocation,
    anchor: Connection,
    loaded: HashMap<String, LoadedTable>,
}

impl Session {
    /// Open a session.
    ///
    /// Uses the file store at `config.db_path` if set, otherwise a fresh
    /// in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConfigError` for an invalid configuration or
    /// `DatabaseError::StoreError` if the store cannot be opened
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut session = Session::open(Config::default())?;
    /// let result = session.run("SELECT * FROM {}", &[SourceInput::new("users.csv")])?;
    /// ```
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let location = match &config.db_path {
            Some(path) => StoreLocation::File(path.clone()),
            None => StoreLocation::memory(),
        };
        let anchor = location.open()?;

        Ok(Self {
            tables: SourceTables::new(config.table_prefix.clone()),
            config,
            location,
            anchor,
            loaded: HashMap::new(),
        })
    }

    /// Open an in-memory session with default settings.
    pub fn open_temp() -> Result<Self> {
        Self::open(Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tables(&self) -> &SourceTables {
        &self.tables
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Store connection the session queries through.
    pub fn connection(&self) -> &Connection {
        &self.anchor
    }

    /// Loader counters for a table loaded in this session.
    pub fn load_stats(&self, table: &str) -> Option<LoaderStats> {
        self.loaded.get(table).map(|loaded| loaded.stats)
    }

    /// Run a query over `sources`.
    ///
    /// Placeholders are replaced with table names, every referenced source is
    /// loaded, and the final SQL is executed against the store. When pushdown
    /// is enabled the WHERE clause filters rows of the single FROM source
    /// while it loads. Pushdown compares values as text, so it is not used
    /// with NUMERIC columns.
    ///
    /// # Arguments
    ///
    /// * `query` - Query text with `{N}` / `{N, "path"}` placeholders
    /// * `sources` - Inputs, addressed by position
    ///
    /// # Errors
    ///
    /// - `DatabaseError::UnknownSource` if a placeholder has no input
    /// - `DatabaseError::PathNotFound` if a path does not address a list
    /// - any loader or store error
    pub fn run(&mut self, query: &str, sources: &[SourceInput]) -> Result<QueryResult> {
        let tables = self.tables.clone();
        let rewritten = rewrite_with(query, |source, _| match &source.path {
            Some(path) => tables.path_table(source.index, path),
            None => tables.table(source.index),
        });
        debug!(sql = %rewritten.sql, "Rewrote query");

        if let Some(missing) = rewritten.references.iter().find(|r| r.index >= sources.len()) {
            return Err(DatabaseError::UnknownSource(missing.index));
        }

        let pushdown = if !self.config.pushdown {
            None
        } else if self.config.loader.column_type == ColumnType::Numeric {
            debug!("Numeric columns compare as numbers, loading unfiltered");
            None
        } else {
            let compiled = compile(&rewritten.sql);
            if compiled.is_none() {
                debug!("Query not eligible for pushdown, loading unfiltered");
            }
            compiled
        };

        for source in &rewritten.references {
            let table = self.table_for(source);
            let predicate = pushdown
                .as_ref()
                .filter(|p| p.predicate.has_filter() && p.relation.eq_ignore_ascii_case(&table))
                .map(|p| p.predicate.clone());

            self.load_reference(source, &table, &sources[source.index], predicate)?;
        }

        execute_query(&self.anchor, &rewritten.sql)
    }

    /// Load a whole source into `t_N`.
    ///
    /// # Returns
    ///
    /// Counters of the finished loader
    pub fn load_source(
        &mut self,
        index: usize,
        input: &SourceInput,
        predicate: Option<RowPredicate>,
    ) -> Result<LoaderStats> {
        let table = self.tables.table(index);
        let rows = input.records(self.config.convert_numbers)?;
        self.load_rows(&table, input, rows, predicate)
    }

    /// Load the rows found at `path` inside a source into its derived table.
    pub fn load_path(
        &mut self,
        index: usize,
        input: &SourceInput,
        path: &str,
        predicate: Option<RowPredicate>,
    ) -> Result<LoaderStats> {
        let table = self.tables.path_table(index, path);
        let document = input.document(self.config.convert_numbers)?;
        let rows = records_at_path(&document, index, path)?;
        self.load_rows(&table, input, rows.into_iter().map(Ok), predicate)
    }

    fn table_for(&self, source: &SourceRef) -> String {
        match &source.path {
            Some(path) => self.tables.path_table(source.index, path),
            None => self.tables.table(source.index),
        }
    }

    fn load_reference(
        &mut self,
        source: &SourceRef,
        table: &str,
        input: &SourceInput,
        predicate: Option<RowPredicate>,
    ) -> Result<()> {
        if let Some(loaded) = self.loaded.get(table) {
            if !loaded.filtered && loaded.input == *input {
                debug!(table = %table, "Source already loaded");
                return Ok(());
            }
        }

        match &source.path {
            Some(path) => self.load_path(source.index, input, path, predicate)?,
            None => self.load_source(source.index, input, predicate)?,
        };
        Ok(())
    }

    fn load_rows<I>(
        &mut self,
        table: &str,
        input: &SourceInput,
        rows: I,
        predicate: Option<RowPredicate>,
    ) -> Result<LoaderStats>
    where
        I: IntoIterator<Item = Result<RowValue>>,
    {
        let span = db_span(DbOperation::Load, Some(table), Some(&self.location.connection_string()));
        let _guard = span.enter();

        self.drop_table(table)?;
        let filtered = predicate.is_some();

        let outcome = stream_rows(
            &self.location,
            table,
            self.config.loader.clone(),
            predicate,
            rows,
        );
        let stats = match outcome {
            Ok(stats) => stats,
            Err(e) => {
                warn!(table = %table, error = %e, "Load failed, discarding table");
                if let Err(drop_err) = self.drop_table(table) {
                    warn!(table = %table, error = %drop_err, "Failed to drop table");
                }
                return Err(e);
            }
        };

        info!(
            table = %table,
            rows = stats.rows_written,
            skipped = stats.rows_skipped,
            columns = stats.columns,
            "Loaded source"
        );
        self.loaded.insert(
            table.to_string(),
            LoadedTable {
                input: input.clone(),
                filtered,
                stats,
            },
        );
        Ok(stats)
    }

    fn drop_table(&mut self, table: &str) -> Result<()> {
        self.anchor
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
        self.loaded.remove(table);
        Ok(())
    }
}

/// Drive one loader over a row stream.
fn stream_rows<I>(
    location: &StoreLocation,
    table: &str,
    options: LoaderOptions,
    predicate: Option<RowPredicate>,
    rows: I,
) -> Result<LoaderStats>
where
    I: IntoIterator<Item = Result<RowValue>>,
{
    let mut loader = BulkLoader::open(location, table, options, predicate)?;
    for (index, row) in rows.into_iter().enumerate() {
        loader.write_row(&row?, index)?;
    }
    loader.close()?;
    Ok(loader.stats())
}
