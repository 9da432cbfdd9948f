use crate::{backend::RowIdBackend, error::Error, session::Session};

/// An owning handle to a driver specific row identifier.
///
/// Fetch one with an into binding, then use it as a parameter to address the
/// same row again.
pub struct RowId {
    backend: Box<dyn RowIdBackend>,
}

impl RowId {
    pub fn new(session: &mut Session) -> Result<Self, Error> {
        Ok(RowId {
            backend: session.backend_mut().make_rowid()?,
        })
    }

    /// The identifier as a 64 bit integer, `None` until one was fetched.
    pub fn value(&self) -> Option<i64> {
        self.backend.value()
    }

    pub(crate) fn set(&mut self, value: i64) {
        self.backend.set_value(value);
    }
}
