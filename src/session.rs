//! The session façade: one live connection and everything created from it.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    backend::{SessionBackend, StatementKind},
    error::Error,
    query::Query,
    registry,
    row::Row,
    var::Var,
};

/// Option key marking a connection as a reconnect of an existing session.
/// Drivers suppress any interactive prompt (e.g. driver completion dialogs)
/// when it is set.
pub const OPTION_RECONNECT: &str = "reconnect";

/// Option key selecting how much a driver may prompt the user to complete
/// the connection string, for drivers which support prompting at all.
pub const OPTION_DRIVER_COMPLETION: &str = "completion";

/// Backend name plus the driver specific connection string, optionally
/// augmented by a key/value option map.
///
/// The core imposes no format on the connection string; drivers which need
/// structure parse it themselves.
#[derive(Debug, Clone)]
pub struct ConnectParameters {
    backend_name: String,
    connect_string: String,
    options: HashMap<String, String>,
}

impl ConnectParameters {
    pub fn new(backend_name: &str, connect_string: &str) -> Self {
        Self {
            backend_name: backend_name.to_string(),
            connect_string: connect_string.to_string(),
            options: HashMap::new(),
        }
    }

    /// Splits a `backend://connect-string` URL.
    pub fn parse_url(url: &str) -> Result<Self, Error> {
        match url.split_once("://") {
            Some((backend_name, connect_string)) => {
                Ok(Self::new(backend_name, connect_string))
            }
            None => Err(Error::Usage(format!(
                "Invalid connection string '{url}', expected backend://options."
            ))),
        }
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn connect_string(&self) -> &str {
        &self.connect_string
    }

    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.insert(name.to_string(), value.to_string());
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// True if the option is set to a truthy value (`1`, `true`, `yes`,
    /// `on`).
    pub fn option_flag(&self, name: &str) -> bool {
        self.option(name)
            .map(|value| {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            })
            .unwrap_or(false)
    }
}

/// Hooks invoked by drivers with failover support while they recover a lost
/// connection. The core never calls these itself.
pub trait FailoverCallback {
    /// The driver detected a lost connection and starts recovery.
    fn started(&self) {}

    /// Recovery succeeded; the session is usable again.
    fn finished(&self) {}

    /// Recovery failed. Return a new connect string to retry against, or
    /// `None` to give up.
    fn failed(&self) -> Option<String> {
        None
    }

    /// Recovery was abandoned.
    fn aborted(&self) {}
}

/// Description of one column, as reported by the metadata queries.
#[derive(Debug, Clone)]
pub struct ColumnDescription {
    pub name: String,
    pub type_name: String,
    pub max_length: Option<i64>,
    pub nullable: bool,
}

/// A live connection to one database.
///
/// Opened through the process wide backend registry:
///
/// ```no_run
/// use sqlbind::Session;
///
/// # fn main() -> Result<(), sqlbind::Error> {
/// let mut session = Session::open("sqlite3://db=:memory:")?;
/// session.once("create table t(v integer)").execute()?;
/// # Ok(())
/// # }
/// ```
///
/// A session and everything derived from it is single threaded; open one
/// session per thread to use a database concurrently.
pub struct Session {
    backend: Box<dyn SessionBackend>,
    parameters: ConnectParameters,
}

impl Session {
    /// Opens a session from a `backend://connect-string` URL.
    pub fn open(url: &str) -> Result<Self, Error> {
        Self::with_parameters(ConnectParameters::parse_url(url)?)
    }

    /// Opens a session from a backend name and its connection string.
    pub fn open_backend(backend_name: &str, connect_string: &str) -> Result<Self, Error> {
        Self::with_parameters(ConnectParameters::new(backend_name, connect_string))
    }

    pub fn with_parameters(parameters: ConnectParameters) -> Result<Self, Error> {
        let factory = registry::find_backend(parameters.backend_name())?;
        let backend = factory.make_session(&parameters)?;
        debug!("Connected to backend '{}'.", parameters.backend_name());
        Ok(Session {
            backend,
            parameters,
        })
    }

    pub fn is_connected(&mut self) -> bool {
        self.backend.is_connected()
    }

    /// Tears down the current backend session and connects anew with the
    /// preserved parameters. Drivers suppress interactive prompts for the
    /// new connection.
    ///
    /// Statements created before the reconnect keep talking to the old
    /// connection and should be dropped.
    pub fn reconnect(&mut self) -> Result<(), Error> {
        let factory = registry::find_backend(self.parameters.backend_name())?;
        let mut parameters = self.parameters.clone();
        parameters.set_option(OPTION_RECONNECT, "1");
        self.backend = factory.make_session(&parameters)?;
        debug!(
            "Reconnected to backend '{}'.",
            self.parameters.backend_name()
        );
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), Error> {
        self.backend.begin()
    }

    pub fn commit(&mut self) -> Result<(), Error> {
        self.backend.commit()
    }

    pub fn rollback(&mut self) -> Result<(), Error> {
        self.backend.rollback()
    }

    /// Starts a one-time statement; bindings and further text attach to the
    /// returned builder.
    pub fn once<'s, 'u>(&'s mut self, query: &str) -> Query<'s, 'u> {
        Query::new(self, StatementKind::OneTime, query)
    }

    /// Starts a statement meant for repeated execution.
    pub fn prepare<'s, 'u>(&'s mut self, query: &str) -> Query<'s, 'u> {
        Query::new(self, StatementKind::Repeatable, query)
    }

    /// Next value of the named sequence. `Ok(None)` if the backend has no
    /// sequences; use [`Session::last_insert_id`] then.
    pub fn next_sequence_value(&mut self, sequence: &str) -> Result<Option<i64>, Error> {
        self.backend.next_sequence_value(sequence)
    }

    /// Key generated for the most recently inserted row. `Ok(None)` if the
    /// backend cannot tell.
    pub fn last_insert_id(&mut self, table: &str) -> Result<Option<i64>, Error> {
        self.backend.last_insert_id(table)
    }

    /// Names of the tables in the current schema.
    pub fn table_names(&mut self) -> Result<Vec<String>, Error> {
        let query = self.backend.table_names_query();
        let name = Var::new(String::new());
        let mut statement = Query::new(self, StatementKind::OneTime, &query)
            .into(&name)
            .statement()?;
        let mut names = Vec::new();
        if statement.execute()? {
            names.push(name.get());
            while statement.fetch()? {
                names.push(name.get());
            }
        }
        Ok(names)
    }

    /// Descriptions of the columns of `table`.
    pub fn column_descriptions(&mut self, table: &str) -> Result<Vec<ColumnDescription>, Error> {
        let query = self.backend.column_descriptions_query();
        let row = Var::new(Row::new());
        let mut statement = Query::new(self, StatementKind::OneTime, &query)
            .into_row(&row)
            .bind_val_named("t", table.to_string())
            .statement()?;
        let mut columns = Vec::new();
        let mut got_data = statement.execute()?;
        while got_data {
            {
                let row = row.borrow();
                let max_length = if row.has_column("CHARACTER_MAXIMUM_LENGTH") {
                    row.get_named::<Option<i64>>("CHARACTER_MAXIMUM_LENGTH")?
                } else {
                    None
                };
                columns.push(ColumnDescription {
                    name: row.get_named("COLUMN_NAME")?,
                    type_name: row.get_named("DATA_TYPE")?,
                    max_length,
                    nullable: row.get_named::<String>("IS_NULLABLE")? == "YES",
                });
            }
            got_data = statement.fetch()?;
        }
        Ok(columns)
    }

    /// Installs the failover hooks; drivers with failover support invoke
    /// them while recovering a lost connection.
    pub fn set_failover_callback(&mut self, callback: Arc<dyn FailoverCallback>) {
        self.backend.set_failover_callback(callback);
    }

    /// Column type text for DDL in the backend's dialect.
    pub fn create_column_type(
        &self,
        db_type: crate::DbType,
        precision: usize,
        scale: usize,
    ) -> Result<String, Error> {
        self.backend.create_column_type(db_type, precision, scale)
    }

    /// What to put after `from` when selecting computed values only; empty
    /// if the dialect needs no from clause at all.
    pub fn dummy_from_table(&self) -> String {
        self.backend.dummy_from_table()
    }

    /// Name of the null coalescing function of the dialect.
    pub fn nvl_function(&self) -> String {
        self.backend.nvl_function()
    }

    /// Expression producing an empty large object in an insert statement.
    pub fn empty_blob_expr(&self) -> String {
        self.backend.empty_blob_expr()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn connect_parameters(&self) -> &ConnectParameters {
        &self.parameters
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn SessionBackend {
        self.backend.as_mut()
    }
}
