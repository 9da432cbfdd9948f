//! The contract every database driver implements.
//!
//! A driver provides a [`BackendFactory`] producing a [`SessionBackend`],
//! which in turn hands out [`StatementBackend`]s, [`BlobBackend`]s and
//! [`RowIdBackend`]s. Statement backends create one binder object per bound
//! variable, in four flavours: scalar and bulk, input ("use") and output
//! ("into"). The engine talks to drivers exclusively through these traits;
//! drivers register themselves under a name via
//! [`crate::register_backend`].
//!
//! Cell data crosses the boundary as [`crate::Value`]s of the requested
//! [`ExchangeKind`]. Host-type conversion happens on the engine's side of
//! the seam, driver-type coercion on the backend's.

use crate::{
    error::Error,
    exchange::{DataKind, DbType, ExchangeKind, Value},
    parse::PlaceholderStyle,
    session::{ConnectParameters, FailoverCallback},
};

use std::sync::Arc;

/// Outcome of a driver level execute or fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    /// The requested amount of work was done in full.
    Success,
    /// The end of the rowset was reached. Not an error: a fetch may still
    /// have delivered the remaining rows of the set.
    NoData,
}

/// Tells a backend whether a statement is worth preparing server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Executed once, then discarded.
    OneTime,
    /// Kept around and re-executed, possibly with different parameters.
    Repeatable,
}

/// A single cell as delivered by a driver binder.
#[derive(Debug, Clone)]
pub struct FetchedCell {
    /// The cell value, `None` for SQL NULL.
    pub value: Option<Value>,
    /// True if the driver had to cut a variable width value short.
    pub truncated: bool,
}

impl FetchedCell {
    pub fn null() -> Self {
        FetchedCell {
            value: None,
            truncated: false,
        }
    }

    pub fn new(value: Value) -> Self {
        FetchedCell {
            value: Some(value),
            truncated: false,
        }
    }
}

/// Creates session backends for one driver. Registered process wide under
/// the driver's name.
pub trait BackendFactory: Send + Sync {
    fn make_session(&self, parameters: &ConnectParameters) -> Result<Box<dyn SessionBackend>, Error>;
}

/// A live connection, as seen by the engine.
///
/// The default method bodies implement the standard SQL behaviour; drivers
/// override where their dialect deviates.
pub trait SessionBackend {
    fn is_connected(&mut self) -> bool;

    fn begin(&mut self) -> Result<(), Error>;
    fn commit(&mut self) -> Result<(), Error>;
    fn rollback(&mut self) -> Result<(), Error>;

    /// Next value of the named sequence. `Ok(None)` if the backend does not
    /// support sequences. Every driver implements this or
    /// [`Self::last_insert_id`], or auto generated keys are unavailable.
    fn next_sequence_value(&mut self, _sequence: &str) -> Result<Option<i64>, Error> {
        Ok(None)
    }

    /// Key generated for the most recently inserted row. `Ok(None)` if the
    /// backend cannot tell.
    fn last_insert_id(&mut self, _table: &str) -> Result<Option<i64>, Error> {
        Ok(None)
    }

    /// Parameterless query yielding the table names of the current schema in
    /// a column aliased `TABLE_NAME`.
    fn table_names_query(&self) -> String {
        "select table_name as \"TABLE_NAME\" from information_schema.tables \
         where table_schema = 'public'"
            .to_string()
    }

    /// Query with a single parameter `:t` (the table name) yielding column
    /// descriptions with columns aliased `COLUMN_NAME`, `DATA_TYPE`,
    /// `CHARACTER_MAXIMUM_LENGTH` and `IS_NULLABLE` (`'YES'`/`'NO'`).
    fn column_descriptions_query(&self) -> String {
        "select column_name as \"COLUMN_NAME\", data_type as \"DATA_TYPE\", \
         character_maximum_length as \"CHARACTER_MAXIMUM_LENGTH\", \
         is_nullable as \"IS_NULLABLE\" from information_schema.columns \
         where table_schema = 'public' and table_name = :t"
            .to_string()
    }

    /// Column type text for DDL, e.g. `varchar(20)` for `(Text, 20, 0)`.
    fn create_column_type(
        &self,
        db_type: DbType,
        precision: usize,
        scale: usize,
    ) -> Result<String, Error> {
        let text = match db_type {
            DbType::Text | DbType::WideText => {
                if precision == 0 {
                    "text".to_string()
                } else {
                    format!("varchar({precision})")
                }
            }
            DbType::Date => "timestamp".to_string(),
            DbType::Double => {
                if precision == 0 {
                    "numeric".to_string()
                } else {
                    format!("numeric({precision}, {scale})")
                }
            }
            DbType::I8 | DbType::U8 | DbType::I16 | DbType::U16 => "smallint".to_string(),
            DbType::I32 | DbType::U32 => "integer".to_string(),
            DbType::I64 | DbType::U64 => "bigint".to_string(),
            DbType::Blob => "blob".to_string(),
            DbType::Xml => "xml".to_string(),
        };
        Ok(text)
    }

    fn add_column(
        &self,
        table: &str,
        column: &str,
        db_type: DbType,
        precision: usize,
        scale: usize,
    ) -> Result<String, Error> {
        let column_type = self.create_column_type(db_type, precision, scale)?;
        Ok(format!("alter table {table} add column {column} {column_type}"))
    }

    fn alter_column(
        &self,
        table: &str,
        column: &str,
        db_type: DbType,
        precision: usize,
        scale: usize,
    ) -> Result<String, Error> {
        let column_type = self.create_column_type(db_type, precision, scale)?;
        Ok(format!(
            "alter table {table} alter column {column} type {column_type}"
        ))
    }

    fn drop_column(&self, table: &str, column: &str) -> Result<String, Error> {
        Ok(format!("alter table {table} drop column {column}"))
    }

    fn constraint_unique(&self, name: &str, columns: &str) -> String {
        format!("constraint {name} unique ({columns})")
    }

    fn constraint_primary_key(&self, name: &str, columns: &str) -> String {
        format!("constraint {name} primary key ({columns})")
    }

    fn constraint_foreign_key(
        &self,
        name: &str,
        columns: &str,
        ref_table: &str,
        ref_columns: &str,
    ) -> String {
        format!(
            "constraint {name} foreign key ({columns}) references {ref_table} ({ref_columns})"
        )
    }

    /// Expression producing an empty large object in an insert statement.
    fn empty_blob_expr(&self) -> String {
        "lo_creat(-1)".to_string()
    }

    /// Name of the null coalescing function of the dialect.
    fn nvl_function(&self) -> String {
        "coalesce".to_string()
    }

    /// What to put after `from` in statements that select computed values
    /// only. Empty if the dialect allows leaving the clause out entirely.
    fn dummy_from_table(&self) -> String;

    /// Installed by the session when the application registers a failover
    /// callback. Backends without failover support can ignore it.
    fn set_failover_callback(&mut self, _callback: Arc<dyn FailoverCallback>) {}

    fn backend_name(&self) -> &'static str;

    fn make_statement(&mut self) -> Result<Box<dyn StatementBackend>, Error>;
    fn make_rowid(&mut self) -> Result<Box<dyn RowIdBackend>, Error>;
    fn make_blob(&mut self) -> Result<Box<dyn BlobBackend>, Error>;
}

/// One statement, as seen by the engine.
///
/// Column and parameter positions are zero based throughout.
pub trait StatementBackend {
    /// Placeholder form the engine should rewrite `:name` parameters into
    /// before calling [`Self::prepare`].
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Whether `"..."` quotes identifiers in this dialect. Affects how the
    /// engine scans the statement text for parameters.
    fn supports_quoted_identifiers(&self) -> bool {
        true
    }

    /// `query` is already rewritten to the native placeholder form; `names`
    /// are the distinct parameter names in order of first occurrence.
    fn prepare(&mut self, query: &str, names: &[String], kind: StatementKind) -> Result<(), Error>;

    /// Runs the statement. `execute(0)` runs it without fetching anything.
    /// With `rows > 0` and a result set, the backend follows through with an
    /// immediate `fetch(rows)` and returns its result. With bulk input
    /// bindings staged, `rows` is the number of logical rows and a driver
    /// without native array binding executes the statement once per row.
    fn execute(&mut self, rows: usize) -> Result<ExecResult, Error>;

    /// Advances the fetch window by up to `rows` rows. Returns
    /// [`ExecResult::NoData`] when the rowset is exhausted mid-window, with
    /// the remaining rows delivered (Oracle semantics).
    fn fetch(&mut self, rows: usize) -> Result<ExecResult, Error>;

    /// Rows changed by the last insert, update or delete; accumulated over
    /// the whole loop for a bulk execution. `Ok(None)` if the driver cannot
    /// tell.
    fn affected_rows(&mut self) -> Result<Option<u64>, Error>;

    /// Rows delivered into the current fetch window.
    fn rows_in_window(&self) -> usize;

    /// Name of the parameter at `index`, as extracted during prepare.
    fn parameter_name(&self, index: usize) -> Option<String>;

    /// Wraps a bare procedure invocation into whatever the dialect needs to
    /// actually call it.
    fn rewrite_for_procedure_call(&self, query: &str) -> String;

    /// Returns the column count of the result set. May run the query with a
    /// window of one row as a side effect; if it does, the backend remembers
    /// this and the next [`Self::execute`] reuses the buffered result
    /// instead of running the query again (once).
    fn prepare_for_describe(&mut self) -> Result<usize, Error>;

    /// Type and name of the result column at `position`.
    fn describe_column(&mut self, position: usize) -> Result<(DbType, String), Error>;

    /// Lets a backend coerce the column type used for dynamic fetches, e.g.
    /// to widen types whose describe information it cannot fully trust. Only
    /// consulted when the engine picks the host representation itself.
    fn exchange_db_type_for(&self, db_type: DbType) -> DbType {
        db_type
    }

    /// Projection onto the coarse kind set. Overridable because some drivers
    /// historically mapped individual types differently and calling code
    /// relies on it.
    fn to_data_kind(&self, db_type: DbType) -> DataKind {
        db_type.data_kind()
    }

    fn make_into_binder(&mut self) -> Result<Box<dyn IntoTypeBackend>, Error>;
    fn make_use_binder(&mut self) -> Result<Box<dyn UseTypeBackend>, Error>;
    fn make_vector_into_binder(&mut self) -> Result<Box<dyn VectorIntoTypeBackend>, Error>;
    fn make_vector_use_binder(&mut self) -> Result<Box<dyn VectorUseTypeBackend>, Error>;

    /// Releases driver resources. Also called on drop; must not panic.
    fn clean_up(&mut self);
}

/// Driver side of a scalar output binding.
pub trait IntoTypeBackend {
    /// Associates the binder with the result column at `*position` and
    /// advances the position.
    fn define_by_pos(&mut self, position: &mut usize, kind: ExchangeKind) -> Result<(), Error>;

    /// Called once per execute, before the driver runs the statement. A
    /// chance to pre-allocate.
    fn pre_exec(&mut self, _rows: usize) -> Result<(), Error> {
        Ok(())
    }

    /// Called immediately before a driver fetch.
    fn pre_fetch(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// The cell delivered for the bound column, or `None` at the end of the
    /// rowset (`got_data` false).
    fn post_fetch(&mut self, got_data: bool) -> Result<Option<FetchedCell>, Error>;

    fn clean_up(&mut self) {}
}

/// Driver side of a bulk output binding.
pub trait VectorIntoTypeBackend {
    /// `capacity` is the size of the bound range, i.e. the most rows one
    /// fetch may deliver into this binder.
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        kind: ExchangeKind,
        capacity: usize,
    ) -> Result<(), Error>;

    fn pre_exec(&mut self, _rows: usize) -> Result<(), Error> {
        Ok(())
    }

    fn pre_fetch(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// One cell per row delivered into the current window, in row order.
    fn post_fetch(&mut self, got_data: bool) -> Result<Vec<FetchedCell>, Error>;

    fn clean_up(&mut self) {}
}

/// Driver side of a scalar input binding.
pub trait UseTypeBackend {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        kind: ExchangeKind,
        read_only: bool,
    ) -> Result<(), Error>;

    fn bind_by_name(&mut self, name: &str, kind: ExchangeKind, read_only: bool)
        -> Result<(), Error>;

    fn pre_exec(&mut self, _rows: usize) -> Result<(), Error> {
        Ok(())
    }

    /// Stages the value for the next execution. `None` binds SQL NULL.
    fn pre_use(&mut self, value: Option<&Value>) -> Result<(), Error>;

    /// Value written back by the database for an IN/OUT parameter, if the
    /// backend supports those.
    fn post_use(&mut self, _got_data: bool) -> Result<Option<FetchedCell>, Error> {
        Ok(None)
    }

    fn clean_up(&mut self) {}
}

/// Driver side of a bulk input binding.
pub trait VectorUseTypeBackend {
    fn bind_by_pos(&mut self, position: &mut usize, kind: ExchangeKind) -> Result<(), Error>;

    fn bind_by_name(&mut self, name: &str, kind: ExchangeKind) -> Result<(), Error>;

    fn pre_exec(&mut self, _rows: usize) -> Result<(), Error> {
        Ok(())
    }

    /// Stages one value per logical row for the next execution.
    fn pre_use(&mut self, values: Vec<Option<Value>>) -> Result<(), Error>;

    fn clean_up(&mut self) {}
}

/// Driver representation of a row identifier.
pub trait RowIdBackend {
    fn value(&self) -> Option<i64>;
    fn set_value(&mut self, value: i64);
}

/// Driver representation of a large object.
///
/// Writes past the current length zero-fill the gap, so that
/// `offset + n <= len()` holds after every successful write.
pub trait BlobBackend {
    fn len(&mut self) -> Result<usize, Error>;

    /// Reads up to `buf.len()` bytes starting at `offset`. Returns the
    /// number of bytes read.
    fn read_from_start(&mut self, buf: &mut [u8], offset: usize) -> Result<usize, Error>;

    /// Writes `data` starting at `offset`, extending the object as needed.
    /// Returns the number of bytes written.
    fn write_from_start(&mut self, data: &[u8], offset: usize) -> Result<usize, Error>;

    /// Appends `data`, returning the number of bytes written.
    fn append(&mut self, data: &[u8]) -> Result<usize, Error>;

    /// Truncates the object to `new_len` bytes.
    fn trim(&mut self, new_len: usize) -> Result<(), Error>;
}
