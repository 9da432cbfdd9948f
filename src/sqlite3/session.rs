use std::{ffi::c_int, rc::Rc};

use libsqlite3_sys as ffi;
use log::debug;

use crate::{
    backend::{BlobBackend, RowIdBackend, SessionBackend, StatementBackend},
    error::Error,
    exchange::DbType,
    session::ConnectParameters,
};

use super::{blob::Sqlite3Blob, handle::ConnectionHandle, statement::Sqlite3Statement};

pub(crate) struct Sqlite3Session {
    conn: Rc<ConnectionHandle>,
}

impl Sqlite3Session {
    pub fn new(parameters: &ConnectParameters) -> Result<Self, Error> {
        let mut path = String::new();
        let mut timeout_seconds: Option<u32> = None;
        let mut readonly = false;
        let mut synchronous: Option<String> = None;

        // Space separated key=value pairs; a bare token is the database
        // path. The reconnect flag needs no handling: sqlite never prompts.
        for token in parameters.connect_string().split_whitespace() {
            match token.split_once('=') {
                Some(("db", value)) | Some(("dbname", value)) => path = value.to_string(),
                Some(("timeout", value)) => {
                    timeout_seconds = Some(value.parse().map_err(|_| Error::Connection {
                        message: format!("Invalid timeout value '{value}'."),
                        code: None,
                    })?)
                }
                Some(("readonly", value)) => {
                    readonly = matches!(value, "1" | "true" | "yes");
                }
                Some(("synchronous", value)) => synchronous = Some(value.to_string()),
                Some((key, _)) => {
                    return Err(Error::Connection {
                        message: format!("Unknown connection option '{key}'."),
                        code: None,
                    });
                }
                None => path = token.to_string(),
            }
        }
        if path.is_empty() {
            return Err(Error::Connection {
                message: "Database name is missing in the connection string.".to_string(),
                code: None,
            });
        }

        let flags = if readonly {
            ffi::SQLITE_OPEN_READONLY
        } else {
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        };
        let conn = Rc::new(ConnectionHandle::open(&path, flags)?);
        if let Some(seconds) = timeout_seconds {
            conn.busy_timeout(seconds.saturating_mul(1000) as c_int);
        }
        if let Some(mode) = synchronous {
            conn.exec(&format!("pragma synchronous = {mode}"))?;
        }
        debug!("Opened sqlite3 database '{path}'.");
        Ok(Sqlite3Session { conn })
    }
}

impl SessionBackend for Sqlite3Session {
    fn is_connected(&mut self) -> bool {
        // The engine is embedded; the connection lives as long as the
        // handle does.
        true
    }

    fn begin(&mut self) -> Result<(), Error> {
        self.conn.exec("begin")
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.conn.exec("commit")
    }

    fn rollback(&mut self) -> Result<(), Error> {
        self.conn.exec("rollback")
    }

    fn last_insert_id(&mut self, _table: &str) -> Result<Option<i64>, Error> {
        // Rowids are database wide, the table does not matter.
        Ok(Some(self.conn.last_insert_rowid()))
    }

    fn table_names_query(&self) -> String {
        "select name as \"TABLE_NAME\" from sqlite_master \
         where type = 'table' and name not like 'sqlite_%'"
            .to_string()
    }

    fn column_descriptions_query(&self) -> String {
        "select name as \"COLUMN_NAME\", type as \"DATA_TYPE\", \
         case \"notnull\" when 0 then 'YES' else 'NO' end as \"IS_NULLABLE\" \
         from pragma_table_info(:t)"
            .to_string()
    }

    fn create_column_type(
        &self,
        db_type: DbType,
        precision: usize,
        _scale: usize,
    ) -> Result<String, Error> {
        let text = match db_type {
            DbType::Text | DbType::WideText | DbType::Xml => {
                if precision == 0 {
                    "text".to_string()
                } else {
                    format!("varchar({precision})")
                }
            }
            DbType::Date => "datetime".to_string(),
            DbType::Double => "real".to_string(),
            DbType::I8 | DbType::U8 => "tinyint".to_string(),
            DbType::I16 | DbType::U16 => "smallint".to_string(),
            DbType::I32 | DbType::U32 => "integer".to_string(),
            DbType::I64 | DbType::U64 => "bigint".to_string(),
            DbType::Blob => "blob".to_string(),
        };
        Ok(text)
    }

    fn empty_blob_expr(&self) -> String {
        "x''".to_string()
    }

    fn nvl_function(&self) -> String {
        "ifnull".to_string()
    }

    fn dummy_from_table(&self) -> String {
        // No from clause needed to select computed values.
        String::new()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite3"
    }

    fn make_statement(&mut self) -> Result<Box<dyn StatementBackend>, Error> {
        Ok(Box::new(Sqlite3Statement::new(Rc::clone(&self.conn))))
    }

    fn make_rowid(&mut self) -> Result<Box<dyn RowIdBackend>, Error> {
        Ok(Box::new(Sqlite3RowId::default()))
    }

    fn make_blob(&mut self) -> Result<Box<dyn BlobBackend>, Error> {
        Ok(Box::new(Sqlite3Blob::default()))
    }
}

/// SQLite rowids are plain 64 bit integers.
#[derive(Default)]
pub(crate) struct Sqlite3RowId {
    value: Option<i64>,
}

impl RowIdBackend for Sqlite3RowId {
    fn value(&self) -> Option<i64> {
        self.value
    }

    fn set_value(&mut self, value: i64) {
        self.value = Some(value);
    }
}
