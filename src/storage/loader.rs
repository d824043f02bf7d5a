//! Streaming bulk loader.
//!
//! A loader owns one destination table. The table is created from the first
//! accepted record, columns are added as new keys appear, and rows are
//! buffered and flushed in transactions of multi-row INSERT statements.
//!
//! ```text
//! Empty --first row--> TableCreated --row--> Buffering --threshold--> Flushing
//!                                              ^                        |
//!                                              +------------------------+
//! any state --close--> Closed
//! ```

use crate::config::LoaderOptions;
use crate::otel::{db_span, record_db_metrics, DbOperation};
use crate::query::RowPredicate;
use crate::storage::batch::{coerce, insert_sql, RowBuffer};
use crate::storage::schema::{add_column_sql, create_table_sql, FieldSet};
use crate::storage::store::StoreLocation;
use crate::types::{DatabaseError, Result, RowRecord, RowValue};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info, warn};

/// Lifecycle of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// No accepted rows, no table
    Empty,
    /// Table exists, nothing buffered
    TableCreated,
    /// Rows buffered since the last flush
    Buffering,
    /// Writing buffered rows
    Flushing,
    /// Released; further writes fail
    Closed,
}

/// Counters for one loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Rows accepted and buffered or written
    pub rows_written: usize,
    /// Rows rejected by the predicate
    pub rows_skipped: usize,
    /// Completed flush transactions
    pub flushes: usize,
    /// INSERT statements executed
    pub statements: usize,
    /// Columns in the destination table
    pub columns: usize,
}

/// Sink for decoded rows.
///
/// Parsers drive a writer row by row and close it when their source is
/// exhausted.
pub trait RowWriter {
    /// Accept one row.
    ///
    /// # Arguments
    ///
    /// * `row` - Decoded row; must be a map
    /// * `index` - Position of the row in its source, used in error messages
    fn write_row(&mut self, row: &RowValue, index: usize) -> Result<()>;

    /// Switch to a hierarchical namespace.
    fn set_namespace(&mut self, key: &str) -> Result<()>;

    /// Flush pending rows and release resources.
    fn close(&mut self) -> Result<()>;
}

/// Streaming loader for one destination table.
pub struct BulkLoader {
    conn: Option<Connection>,
    namespace: String,
    table: String,
    options: LoaderOptions,
    predicate: Option<RowPredicate>,
    fields: FieldSet,
    skipped_fields: FieldSet,
    buffer: RowBuffer,
    state: LoaderState,
    stats: LoaderStats,
}

impl BulkLoader {
    /// Open a loader writing to `table` in the store at `location`.
    ///
    /// The table itself is created lazily on the first accepted row.
    ///
    /// # Arguments
    ///
    /// * `location` - Store to connect to
    /// * `table` - Destination table name
    /// * `options` - Column typing, nesting and batching options
    /// * `predicate` - Optional row filter from a pushed-down WHERE clause
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConfigError` for invalid options or
    /// `DatabaseError::StoreError` if the store cannot be opened
    pub fn open(
        location: &StoreLocation,
        table: impl Into<String>,
        options: LoaderOptions,
        predicate: Option<RowPredicate>,
    ) -> Result<Self> {
        options.validate()?;
        let conn = location.open()?;
        let skipped_fields = match &options.columns {
            Some(columns) => FieldSet::from_override(columns),
            None => FieldSet::default(),
        };

        Ok(Self {
            conn: Some(conn),
            namespace: location.connection_string(),
            table: table.into(),
            options,
            predicate,
            fields: FieldSet::default(),
            skipped_fields,
            buffer: RowBuffer::default(),
            state: LoaderState::Empty,
            stats: LoaderStats::default(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }

    /// Current column list of the destination table.
    pub fn columns(&self) -> Vec<String> {
        self.fields.to_vec()
    }

    /// Rows buffered since the last flush.
    pub fn buffered_rows(&self) -> usize {
        self.buffer.rows()
    }

    /// Accept one record.
    ///
    /// Creates the table on the first accepted record, adds columns for keys
    /// not seen before, and flushes once the buffer reaches the batch
    /// threshold.
    ///
    /// # Errors
    ///
    /// - `DatabaseError::LoaderClosed` after `close`
    /// - `DatabaseError::UnsupportedRecordShape` if the first record yields no columns
    /// - `DatabaseError::StoreError` if DDL or a flush fails
    pub fn write_record(&mut self, record: &RowRecord, index: usize) -> Result<()> {
        self.ensure_open()?;

        if let Some(predicate) = &self.predicate {
            if predicate.should_skip(record) {
                for column in self.skipped_fields.discover(record, self.options.nested) {
                    self.skipped_fields.push(column);
                }
                self.stats.rows_skipped += 1;
                return Ok(());
            }
        }

        if self.state == LoaderState::Empty {
            self.create_table(record, index)?;
        }

        let discovered = self.fields.discover(record, self.options.nested);
        if !discovered.is_empty() {
            self.add_columns(discovered)?;
        }

        let row = self
            .fields
            .iter()
            .map(|field| coerce(record.get_path(field)))
            .collect::<Result<Vec<_>>>()?;
        self.buffer.push_row(row);
        self.stats.rows_written += 1;
        self.state = LoaderState::Buffering;

        if self.buffer.rows() >= self.options.batch_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write buffered rows in one transaction.
    ///
    /// Rows are bound into INSERT statements of at most
    /// `rows_per_statement_for(columns)` rows each; a final statement carries
    /// the remainder. A no-op when nothing is buffered.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::StoreError` if a statement or the commit fails.
    /// The failed batch is rolled back; earlier flushes stay committed.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.buffer.is_empty() {
            return Ok(());
        }

        let span = db_span(DbOperation::BatchInsert, Some(&self.table), Some(&self.namespace));
        let _guard = span.enter();

        self.state = LoaderState::Flushing;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DatabaseError::LoaderClosed(self.table.clone()))?;

        let width = self.buffer.width();
        let rows = self.buffer.rows();
        let rows_per_statement = self.options.rows_per_statement_for(width);
        let (full, remainder) = self
            .buffer
            .values()
            .split_at((rows / rows_per_statement) * rows_per_statement * width);

        let mut statements = 0;
        let tx = conn.transaction()?;
        if !full.is_empty() {
            let mut stmt = tx.prepare(&insert_sql(&self.table, width, rows_per_statement))?;
            for chunk in full.chunks(rows_per_statement * width) {
                stmt.execute(params_from_iter(chunk))?;
                statements += 1;
            }
        }
        if !remainder.is_empty() {
            let sql = insert_sql(&self.table, width, remainder.len() / width);
            tx.execute(&sql, params_from_iter(remainder))?;
            statements += 1;
        }
        tx.commit()?;

        record_db_metrics(None, Some(rows));
        debug!(
            table = %self.table,
            rows = rows,
            statements = statements,
            "Flushed rows"
        );

        self.buffer.clear();
        self.stats.flushes += 1;
        self.stats.statements += statements;
        self.state = LoaderState::TableCreated;
        Ok(())
    }

    /// Flush remaining rows and release the connection.
    ///
    /// Columns seen only in skipped rows are added before the connection is
    /// released, so the table has the same columns as an unfiltered load
    /// (created empty if every row was skipped). Closing an already closed
    /// loader succeeds without effect.
    pub fn close(&mut self) -> Result<()> {
        if self.state == LoaderState::Closed {
            return Ok(());
        }

        self.flush()?;
        self.add_skipped_columns()?;
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DatabaseError::StoreError(e))?;
        }
        self.state = LoaderState::Closed;

        info!(
            table = %self.table,
            rows_written = self.stats.rows_written,
            rows_skipped = self.stats.rows_skipped,
            flushes = self.stats.flushes,
            "Closed loader"
        );
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == LoaderState::Closed {
            return Err(DatabaseError::LoaderClosed(self.table.clone()));
        }
        Ok(())
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DatabaseError::LoaderClosed(self.table.clone()))
    }

    fn create_table(&mut self, record: &RowRecord, index: usize) -> Result<()> {
        let fields = match &self.options.columns {
            Some(columns) => FieldSet::from_override(columns),
            None => FieldSet::infer(record, self.options.nested),
        };
        if fields.is_empty() {
            return Err(DatabaseError::shape(format!(
                "row {} has no fields to derive columns from",
                index
            )));
        }
        self.create_table_with(fields)
    }

    fn create_table_with(&mut self, fields: FieldSet) -> Result<()> {
        let span = db_span(DbOperation::CreateTable, Some(&self.table), Some(&self.namespace));
        let _guard = span.enter();

        let sql = create_table_sql(&self.table, &fields, self.options.column_type);
        self.connection()?.execute(&sql, [])?;
        debug!(table = %self.table, columns = fields.len(), "Created table");

        self.buffer = RowBuffer::new(fields.len());
        self.stats.columns = fields.len();
        self.fields = fields;
        self.state = LoaderState::TableCreated;
        Ok(())
    }

    fn add_columns(&mut self, columns: Vec<String>) -> Result<()> {
        let span = db_span(DbOperation::AlterTable, Some(&self.table), Some(&self.namespace));
        let _guard = span.enter();

        for column in columns {
            let sql = add_column_sql(&self.table, &column, self.options.column_type);
            self.connection()?.execute(&sql, [])?;
            debug!(table = %self.table, column = %column, "Added column");
            self.fields.push(column);
        }

        self.buffer.widen(self.fields.len());
        self.stats.columns = self.fields.len();
        Ok(())
    }

    fn add_skipped_columns(&mut self) -> Result<()> {
        if self.stats.rows_skipped == 0 || self.skipped_fields.is_empty() {
            return Ok(());
        }

        if self.state == LoaderState::Empty {
            let fields = std::mem::take(&mut self.skipped_fields);
            debug!(table = %self.table, "Every row skipped, creating empty table");
            return self.create_table_with(fields);
        }

        let missing: Vec<String> = self
            .skipped_fields
            .iter()
            .filter(|column| !self.fields.contains(column))
            .map(String::from)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.add_columns(missing)
    }
}

impl RowWriter for BulkLoader {
    fn write_row(&mut self, row: &RowValue, index: usize) -> Result<()> {
        self.ensure_open()?;
        match row.as_record() {
            Some(record) => self.write_record(record, index),
            None => Err(DatabaseError::shape(format!(
                "row {} is not a map: {}",
                index,
                row.render()
            ))),
        }
    }

    fn set_namespace(&mut self, key: &str) -> Result<()> {
        Err(DatabaseError::NamespaceUnsupported(key.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        BulkLoader::close(self)
    }
}

impl Drop for BulkLoader {
    fn drop(&mut self) {
        if self.state != LoaderState::Closed && !self.buffer.is_empty() {
            warn!(
                table = %self.table,
                rows = self.buffer.rows(),
                "Loader dropped with unflushed rows"
            );
        }
    }
}
