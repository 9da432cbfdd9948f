use crate::{error::Error, statement::Statement};

/// A stored procedure call.
///
/// Built from a [`crate::Query`] holding the bare invocation text, e.g.
/// `"order_totals(:customer)"`; the backend rewrites it into whatever its
/// dialect needs to actually call a procedure. Parameters bind like on any
/// other statement, including IN/OUT bindings where the backend supports
/// output parameters.
pub struct Procedure<'u> {
    statement: Statement<'u>,
}

impl<'u> Procedure<'u> {
    pub(crate) fn from_statement(statement: Statement<'u>) -> Self {
        Procedure { statement }
    }

    /// Runs the procedure. Returns true if data was delivered into the
    /// output bindings.
    pub fn execute(&mut self) -> Result<bool, Error> {
        self.statement.execute()
    }

    /// Advances to the next window of rows, for procedures returning
    /// result sets.
    pub fn fetch(&mut self) -> Result<bool, Error> {
        self.statement.fetch()
    }

    pub fn affected_rows(&mut self) -> Result<Option<u64>, Error> {
        self.statement.affected_rows()
    }

    /// The rewritten statement text.
    pub fn query(&self) -> &str {
        self.statement.query()
    }
}
