//! # About
//!
//! `sqlbind` gives applications one uniform way to prepare SQL statements,
//! bind input parameters, fetch results into host variables (individually or
//! in bulk), iterate dynamically typed rows and control transactions, across
//! a pluggable set of database drivers. A SQLite driver is bundled; other
//! drivers implement the traits in [`backend`] and register themselves with
//! [`register_backend`].
//!
//! ```
//! use sqlbind::{Session, Var};
//!
//! fn main() -> Result<(), sqlbind::Error> {
//!     let mut session = Session::open("sqlite3://db=:memory:")?;
//!     session.once("create table t(v integer)").execute()?;
//!     session
//!         .once("insert into t(v) values(:v)")
//!         .bind_val(42_i32)
//!         .execute()?;
//!
//!     let v = Var::new(0_i32);
//!     session.once("select v from t").into(&v).execute()?;
//!     assert_eq!(42, v.get());
//!     Ok(())
//! }
//! ```
//!
//! A session and everything created from it is meant for one thread; open
//! one session per thread to use a database concurrently.

mod blob;
mod convert;
mod error;
mod exchange;
mod indicator;
mod into_type;
mod parse;
mod procedure;
mod query;
mod registry;
mod row;
mod rowid;
mod session;
mod statement;
mod transaction;
mod use_type;
mod var;

pub mod backend;

#[cfg(feature = "sqlite3")]
pub mod sqlite3;

pub use self::{
    blob::Blob,
    convert::{Exchangeable, TypeConversion},
    error::Error,
    exchange::{DataKind, DbType, ExchangeKind, LongText, Value, XmlValue},
    indicator::Indicator,
    parse::PlaceholderStyle,
    procedure::Procedure,
    query::Query,
    registry::register_backend,
    row::{ColumnProperties, Row},
    rowid::RowId,
    session::{
        ColumnDescription, ConnectParameters, FailoverCallback, Session, OPTION_DRIVER_COMPLETION,
        OPTION_RECONNECT,
    },
    statement::Statement,
    transaction::Transaction,
    var::Var,
};
// Reexports
pub use chrono;
pub use widestring::{U16Str, U16String};
