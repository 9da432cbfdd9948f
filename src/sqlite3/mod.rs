//! The bundled SQLite driver.
//!
//! Implements the backend contract over the raw C API. Also serves as the
//! reference implementation for driver authors: it shows the fetch window
//! emulation, the per-row execution loop for bulk input, and the describe
//! seams in the smallest possible setting.
//!
//! Connection strings are either a bare database path or space separated
//! `key=value` pairs: `db=` (or `dbname=`), `timeout=` (busy timeout in
//! seconds), `readonly=1` and `synchronous=`. `:memory:` opens an in-memory
//! database.

mod blob;
mod handle;
mod session;
mod statement;

use crate::{
    backend::{BackendFactory, SessionBackend},
    error::Error,
    session::ConnectParameters,
};

/// Factory for SQLite sessions, registered as `sqlite3`.
pub struct Sqlite3Factory;

impl BackendFactory for Sqlite3Factory {
    fn make_session(
        &self,
        parameters: &ConnectParameters,
    ) -> Result<Box<dyn SessionBackend>, Error> {
        Ok(Box::new(session::Sqlite3Session::new(parameters)?))
    }
}
