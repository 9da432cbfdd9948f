use thiserror::Error as ThisError;

/// Error type used for all failures surfaced by this crate.
///
/// Every variant corresponds to one failure category. Variants describing
/// driver-side failures carry the message reported by the backend and, where
/// the driver provides one, its native error code.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The driver could not establish a connection, or lost it.
    #[error("Cannot establish connection to the database: {message}")]
    Connection {
        /// Message reported by the driver.
        message: String,
        /// Native error code of the driver, if it provides one.
        code: Option<i32>,
    },
    /// The backend refused the statement text.
    #[error("Cannot prepare statement: {message}")]
    Prepare { message: String, code: Option<i32> },
    /// Binding by an unknown parameter name, mixing binding modes, or an
    /// exchange kind the backend does not support.
    #[error("Cannot bind variable: {0}")]
    Bind(String),
    /// The driver reported a runtime error while executing the statement.
    #[error("Cannot execute statement: {message}")]
    Execute { message: String, code: Option<i32> },
    /// The driver reported an error while streaming results.
    #[error("Cannot fetch data: {message}")]
    Fetch { message: String, code: Option<i32> },
    /// Null without an indicator, intolerable truncation, or an unknown
    /// backend type encountered during describe.
    #[error("{0}")]
    Type(String),
    /// A user type conversion rejected a value.
    #[error("Cannot convert data: {0}")]
    Conversion(String),
    /// A contract violation on the caller's side, e.g. mixing bulk and
    /// scalar bindings or indexing a row out of range.
    #[error("Invalid use of the library: {0}")]
    Usage(String),
}

impl Error {
    /// The native error code of the backend, if this error carries one.
    pub fn native_code(&self) -> Option<i32> {
        match self {
            Error::Connection { code, .. }
            | Error::Prepare { code, .. }
            | Error::Execute { code, .. }
            | Error::Fetch { code, .. } => *code,
            _ => None,
        }
    }

    pub(crate) fn null_no_indicator() -> Self {
        Error::Type("Null value fetched and no indicator defined.".to_string())
    }

    pub(crate) fn null_not_allowed() -> Self {
        Error::Type("Null value not allowed for this type.".to_string())
    }
}
