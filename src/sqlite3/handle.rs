//! Owned wrappers over the raw SQLite handles.
//!
//! These types guarantee the C objects are released exactly once and
//! translate error codes into [`Error`] values carrying the message from
//! `sqlite3_errmsg`. Everything above this module is safe code.

use std::{
    ffi::{c_char, c_int, CStr, CString},
    ptr,
    rc::Rc,
};

use libsqlite3_sys as ffi;

use crate::error::Error;

// The vendored libsqlite3-sys bindings omit this declaration even though
// the bundled library exports it; declare it ourselves.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
}

fn c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }
}

/// An open database, closed on drop.
pub(crate) struct ConnectionHandle {
    raw: *mut ffi::sqlite3,
}

impl ConnectionHandle {
    pub fn open(path: &str, flags: c_int) -> Result<Self, Error> {
        let c_path = CString::new(path).map_err(|_| Error::Connection {
            message: "Database path contains a NUL byte.".to_string(),
            code: None,
        })?;
        let mut raw = ptr::null_mut();
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut raw, flags, ptr::null()) };
        if rc != ffi::SQLITE_OK {
            // A handle may be returned even on failure; it carries the
            // message and must still be closed.
            let message = if raw.is_null() {
                c_str(unsafe { ffi::sqlite3_errstr(rc) })
            } else {
                let message = c_str(unsafe { ffi::sqlite3_errmsg(raw) });
                unsafe {
                    ffi::sqlite3_close(raw);
                }
                message
            };
            return Err(Error::Connection {
                message,
                code: Some(rc),
            });
        }
        Ok(ConnectionHandle { raw })
    }

    pub fn last_error(&self) -> (String, i32) {
        unsafe {
            (
                c_str(ffi::sqlite3_errmsg(self.raw)),
                ffi::sqlite3_extended_errcode(self.raw),
            )
        }
    }

    pub fn busy_timeout(&self, milliseconds: c_int) {
        unsafe {
            ffi::sqlite3_busy_timeout(self.raw, milliseconds);
        }
    }

    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.raw) }
    }

    pub fn changes(&self) -> u64 {
        unsafe { ffi::sqlite3_changes(self.raw) as u64 }
    }

    /// Runs a statement which neither takes parameters nor returns rows.
    pub fn exec(self: &Rc<Self>, sql: &str) -> Result<(), Error> {
        let statement = StatementHandle::prepare(Rc::clone(self), sql)?;
        statement.step().map_err(|(message, code)| Error::Execute {
            message,
            code: Some(code),
        })?;
        Ok(())
    }

    fn raw(&self) -> *mut ffi::sqlite3 {
        self.raw
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        // close_v2 defers teardown until outstanding statements are
        // finalized and rolls back any transaction left open.
        unsafe {
            sqlite3_close_v2(self.raw);
        }
    }
}

/// One of SQLite's fundamental value types, copied out of the current row.
#[derive(Debug, Clone)]
pub(crate) enum RawCell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A prepared statement, finalized on drop. Keeps its connection alive.
pub(crate) struct StatementHandle {
    raw: *mut ffi::sqlite3_stmt,
    conn: Rc<ConnectionHandle>,
}

impl StatementHandle {
    pub fn prepare(conn: Rc<ConnectionHandle>, sql: &str) -> Result<Self, Error> {
        let c_sql = CString::new(sql).map_err(|_| Error::Prepare {
            message: "Statement text contains a NUL byte.".to_string(),
            code: None,
        })?;
        let mut raw = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(conn.raw(), c_sql.as_ptr(), -1, &mut raw, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            let (message, code) = conn.last_error();
            return Err(Error::Prepare {
                message,
                code: Some(code),
            });
        }
        if raw.is_null() {
            return Err(Error::Prepare {
                message: "Statement text is empty.".to_string(),
                code: None,
            });
        }
        Ok(StatementHandle { raw, conn })
    }

    /// True if a row is available, false at the end of the statement.
    pub fn step(&self) -> Result<bool, (String, i32)> {
        match unsafe { ffi::sqlite3_step(self.raw) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => Err(self.conn.last_error()),
        }
    }

    pub fn reset(&self) {
        unsafe {
            ffi::sqlite3_reset(self.raw);
        }
    }

    pub fn clear_bindings(&self) {
        unsafe {
            ffi::sqlite3_clear_bindings(self.raw);
        }
    }

    fn check_bind(&self, rc: c_int) -> Result<(), Error> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            let (message, code) = self.conn.last_error();
            Err(Error::Bind(format!("{message} (error code {code})")))
        }
    }

    /// Parameter indices are 1 based, as in the C API.
    pub fn bind_null(&self, index: usize) -> Result<(), Error> {
        self.check_bind(unsafe { ffi::sqlite3_bind_null(self.raw, index as c_int) })
    }

    pub fn bind_int64(&self, index: usize, value: i64) -> Result<(), Error> {
        self.check_bind(unsafe { ffi::sqlite3_bind_int64(self.raw, index as c_int, value) })
    }

    pub fn bind_double(&self, index: usize, value: f64) -> Result<(), Error> {
        self.check_bind(unsafe { ffi::sqlite3_bind_double(self.raw, index as c_int, value) })
    }

    pub fn bind_text(&self, index: usize, value: &str) -> Result<(), Error> {
        self.check_bind(unsafe {
            ffi::sqlite3_bind_text(
                self.raw,
                index as c_int,
                value.as_ptr() as *const c_char,
                value.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            )
        })
    }

    pub fn bind_blob(&self, index: usize, value: &[u8]) -> Result<(), Error> {
        // A null pointer with length zero binds NULL, not an empty blob.
        if value.is_empty() {
            return self
                .check_bind(unsafe { ffi::sqlite3_bind_zeroblob(self.raw, index as c_int, 0) });
        }
        self.check_bind(unsafe {
            ffi::sqlite3_bind_blob(
                self.raw,
                index as c_int,
                value.as_ptr() as *const std::ffi::c_void,
                value.len() as c_int,
                ffi::SQLITE_TRANSIENT(),
            )
        })
    }

    /// Index of a named parameter (including the `:`), 0 if unknown.
    pub fn parameter_index(&self, name: &str) -> usize {
        let Ok(c_name) = CString::new(name) else {
            return 0;
        };
        unsafe { ffi::sqlite3_bind_parameter_index(self.raw, c_name.as_ptr()) as usize }
    }

    pub fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.raw) as usize }
    }

    /// Column indices are 0 based, as in the C API.
    pub fn column_name(&self, index: usize) -> String {
        c_str(unsafe { ffi::sqlite3_column_name(self.raw, index as c_int) })
    }

    pub fn column_decltype(&self, index: usize) -> Option<String> {
        let decl = unsafe { ffi::sqlite3_column_decltype(self.raw, index as c_int) };
        if decl.is_null() { None } else { Some(c_str(decl)) }
    }

    /// Copies the cell of the current row out in its fundamental type.
    pub fn column_value(&self, index: usize) -> RawCell {
        let index = index as c_int;
        match unsafe { ffi::sqlite3_column_type(self.raw, index) } {
            ffi::SQLITE_INTEGER => RawCell::Int(unsafe { ffi::sqlite3_column_int64(self.raw, index) }),
            ffi::SQLITE_FLOAT => RawCell::Float(unsafe { ffi::sqlite3_column_double(self.raw, index) }),
            ffi::SQLITE_NULL => RawCell::Null,
            ffi::SQLITE_BLOB => {
                let len = unsafe { ffi::sqlite3_column_bytes(self.raw, index) } as usize;
                if len == 0 {
                    RawCell::Blob(Vec::new())
                } else {
                    let data = unsafe { ffi::sqlite3_column_blob(self.raw, index) } as *const u8;
                    RawCell::Blob(unsafe { std::slice::from_raw_parts(data, len) }.to_vec())
                }
            }
            // Everything else reads as text. The length is in bytes, so
            // embedded NULs survive.
            _ => {
                let data = unsafe { ffi::sqlite3_column_text(self.raw, index) } as *const u8;
                let len = unsafe { ffi::sqlite3_column_bytes(self.raw, index) } as usize;
                if data.is_null() || len == 0 {
                    RawCell::Text(String::new())
                } else {
                    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
                    RawCell::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
        }
    }
}

impl Drop for StatementHandle {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}
