//! The builder surface gluing statement text and bindings together.
//!
//! A [`Query`] accumulates SQL text fragments and into/use bindings, then
//! either executes once or produces a [`Statement`] for repeated execution.
//!
//! ```no_run
//! use sqlbind::{Session, Var};
//!
//! fn count_users(session: &mut Session) -> Result<i64, sqlbind::Error> {
//!     let count = Var::new(0_i64);
//!     session
//!         .once("select count(*) from users")
//!         .into(&count)
//!         .execute()?;
//!     Ok(count.get())
//! }
//! ```

use std::fmt;
use std::fmt::Write as _;

use crate::{
    blob::Blob,
    convert::TypeConversion,
    error::Error,
    indicator::Indicator,
    into_type::{BlobInto, IntoValue, RowIdInto, VectorInto},
    procedure::Procedure,
    row::Row,
    rowid::RowId,
    session::Session,
    statement::{BindingParts, Statement},
    use_type::{BlobUse, RowIdUse, UseValue, VectorUse},
    var::Var,
    backend::StatementKind,
};

/// Accumulates statement text and bindings; see the module documentation.
///
/// The lifetime `'u` is that of the borrowed host variables. Building the
/// statement releases the session borrow, so the session stays usable while
/// the statement lives.
pub struct Query<'s, 'u> {
    session: &'s mut Session,
    kind: StatementKind,
    text: String,
    parts: BindingParts<'u>,
}

impl<'s, 'u> Query<'s, 'u> {
    pub(crate) fn new(session: &'s mut Session, kind: StatementKind, text: &str) -> Self {
        Query {
            session,
            kind,
            text: text.to_string(),
            parts: BindingParts::default(),
        }
    }

    /// Appends a text fragment to the statement.
    pub fn sql<D: fmt::Display>(mut self, fragment: D) -> Self {
        write!(self.text, "{fragment}").expect("writing to a string cannot fail");
        self
    }

    /// Fetches a result column into `target`.
    pub fn into<T: TypeConversion + 'u>(mut self, target: &'u Var<T>) -> Self {
        self.parts.has_scalar_into = true;
        self.parts.intos.push(Box::new(IntoValue::new(target, None)));
        self
    }

    /// Fetches a result column into `target`, reporting nulls and
    /// truncation through `ind` instead of failing the fetch.
    pub fn into_ind<T: TypeConversion + 'u>(
        mut self,
        target: &'u Var<T>,
        ind: &'u Var<Indicator>,
    ) -> Self {
        self.parts.has_scalar_into = true;
        self.parts
            .intos
            .push(Box::new(IntoValue::new(target, Some(ind))));
        self
    }

    /// Fetches a window of rows into `target`. The vector's length is the
    /// window capacity; after each fetch it is resized to the rows actually
    /// delivered.
    pub fn into_vec<T: TypeConversion + 'u>(mut self, target: &'u Var<Vec<T>>) -> Self {
        self.parts.has_bulk_into = true;
        self.parts
            .intos
            .push(Box::new(VectorInto::new(target, None)));
        self
    }

    /// Bulk fetch with per-row indicators. The indicator vector must be at
    /// least as long as the data vector.
    pub fn into_vec_ind<T: TypeConversion + 'u>(
        mut self,
        target: &'u Var<Vec<T>>,
        inds: &'u Var<Vec<Indicator>>,
    ) -> Self {
        self.parts.has_bulk_into = true;
        self.parts
            .intos
            .push(Box::new(VectorInto::new(target, Some(inds))));
        self
    }

    /// Bulk fetch into the half open range `[begin, end)` of `target`.
    /// `end` is shrunk when the rowset delivers fewer rows.
    pub fn into_vec_range<T: TypeConversion + 'u>(
        mut self,
        target: &'u Var<Vec<T>>,
        begin: usize,
        end: &'u Var<usize>,
    ) -> Self {
        self.parts.has_bulk_into = true;
        self.parts
            .intos
            .push(Box::new(VectorInto::with_range(target, begin, end)));
        self
    }

    /// Fetches a large object column into a [`Blob`] handle.
    pub fn into_blob(mut self, target: &'u Var<Blob>) -> Self {
        self.parts.has_scalar_into = true;
        self.parts.intos.push(Box::new(BlobInto::new(target, None)));
        self
    }

    pub fn into_blob_ind(mut self, target: &'u Var<Blob>, ind: &'u Var<Indicator>) -> Self {
        self.parts.has_scalar_into = true;
        self.parts
            .intos
            .push(Box::new(BlobInto::new(target, Some(ind))));
        self
    }

    /// Fetches a row identifier column into a [`RowId`] handle.
    pub fn into_rowid(mut self, target: &'u Var<RowId>) -> Self {
        self.parts.has_scalar_into = true;
        self.parts
            .intos
            .push(Box::new(RowIdInto::new(target, None)));
        self
    }

    /// Fetches whole rows into a dynamically typed [`Row`]. The row's
    /// columns are described from the result set on the first execution.
    pub fn into_row(mut self, target: &'u Var<Row>) -> Self {
        self.parts.row = Some(target);
        self
    }

    /// Binds an input parameter by position. Rebind by changing the
    /// variable between executions.
    pub fn bind<T: TypeConversion + 'u>(mut self, value: &'u Var<T>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(UseValue::shared(value, None, None)));
        self
    }

    /// Binds an input parameter by name.
    pub fn bind_named<T: TypeConversion + 'u>(mut self, name: &str, value: &'u Var<T>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(UseValue::shared(
            value,
            None,
            Some(name.to_string()),
        )));
        self
    }

    /// Binds an input parameter with an indicator; a null indicator binds
    /// SQL NULL regardless of the variable's value.
    pub fn bind_ind<T: TypeConversion + 'u>(
        mut self,
        value: &'u Var<T>,
        ind: &'u Var<Indicator>,
    ) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(UseValue::shared(value, Some(ind), None)));
        self
    }

    pub fn bind_named_ind<T: TypeConversion + 'u>(
        mut self,
        name: &str,
        value: &'u Var<T>,
        ind: &'u Var<Indicator>,
    ) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(UseValue::shared(
            value,
            Some(ind),
            Some(name.to_string()),
        )));
        self
    }

    /// Binds a plain borrow. The value cannot change between executions.
    pub fn bind_ref<T: TypeConversion + 'u>(mut self, value: &'u T) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(UseValue::borrowed(value, None, None)));
        self
    }

    pub fn bind_ref_named<T: TypeConversion + 'u>(mut self, name: &str, value: &'u T) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(UseValue::borrowed(
            value,
            None,
            Some(name.to_string()),
        )));
        self
    }

    /// Binds an owned value. Convenient for one-shot statements.
    pub fn bind_val<T: TypeConversion + 'u>(mut self, value: T) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(UseValue::owned(value, None)));
        self
    }

    pub fn bind_val_named<T: TypeConversion + 'u>(mut self, name: &str, value: T) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(UseValue::owned(value, Some(name.to_string()))));
        self
    }

    /// Binds an IN/OUT procedure parameter: the value is passed in and
    /// overwritten with what the database reports back, on backends which
    /// support output parameters.
    pub fn bind_inout<T: TypeConversion + 'u>(mut self, value: &'u Var<T>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(UseValue::in_out(value, None, None)));
        self
    }

    pub fn bind_inout_named<T: TypeConversion + 'u>(
        mut self,
        name: &str,
        value: &'u Var<T>,
    ) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(UseValue::in_out(
            value,
            None,
            Some(name.to_string()),
        )));
        self
    }

    /// Binds one input value per logical row; executing the statement runs
    /// it once per element.
    pub fn bind_vec<T: TypeConversion + 'u>(mut self, values: &'u Var<Vec<T>>) -> Self {
        self.parts.has_bulk_use = true;
        self.parts
            .uses
            .push(Box::new(VectorUse::shared(values, None, None)));
        self
    }

    pub fn bind_vec_named<T: TypeConversion + 'u>(
        mut self,
        name: &str,
        values: &'u Var<Vec<T>>,
    ) -> Self {
        self.parts.has_bulk_use = true;
        self.parts.uses.push(Box::new(VectorUse::shared(
            values,
            None,
            Some(name.to_string()),
        )));
        self
    }

    /// Bulk input with per-row indicators; rows with a null indicator bind
    /// SQL NULL.
    pub fn bind_vec_ind<T: TypeConversion + 'u>(
        mut self,
        values: &'u Var<Vec<T>>,
        inds: &'u Var<Vec<Indicator>>,
    ) -> Self {
        self.parts.has_bulk_use = true;
        self.parts
            .uses
            .push(Box::new(VectorUse::shared(values, Some(inds), None)));
        self
    }

    /// Binds a plain borrowed slice as bulk input.
    pub fn bind_vec_ref<T: TypeConversion + 'u>(mut self, values: &'u [T]) -> Self {
        self.parts.has_bulk_use = true;
        self.parts
            .uses
            .push(Box::new(VectorUse::borrowed(values, None)));
        self
    }

    pub fn bind_vec_ref_named<T: TypeConversion + 'u>(
        mut self,
        name: &str,
        values: &'u [T],
    ) -> Self {
        self.parts.has_bulk_use = true;
        self.parts
            .uses
            .push(Box::new(VectorUse::borrowed(values, Some(name.to_string()))));
        self
    }

    /// Passes a [`Blob`] handle's contents as a parameter.
    pub fn bind_blob(mut self, blob: &'u Var<Blob>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(BlobUse::new(blob, None, None)));
        self
    }

    pub fn bind_blob_named(mut self, name: &str, blob: &'u Var<Blob>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(BlobUse::new(blob, None, Some(name.to_string()))));
        self
    }

    /// Passes a fetched [`RowId`] as a parameter.
    pub fn bind_rowid(mut self, rowid: &'u Var<RowId>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts.uses.push(Box::new(RowIdUse::new(rowid, None)));
        self
    }

    pub fn bind_rowid_named(mut self, name: &str, rowid: &'u Var<RowId>) -> Self {
        self.parts.has_scalar_use = true;
        self.parts
            .uses
            .push(Box::new(RowIdUse::new(rowid, Some(name.to_string()))));
        self
    }

    /// Builds the statement, releasing the session borrow.
    pub fn statement(self) -> Result<Statement<'u>, Error> {
        let Query {
            session,
            kind,
            text,
            parts,
        } = self;
        Statement::assemble(session, &text, kind, false, parts)
    }

    /// Builds a procedure call: the text is rewritten into the dialect's
    /// invocation form before preparing.
    pub fn procedure(self) -> Result<Procedure<'u>, Error> {
        let Query {
            session,
            kind,
            text,
            parts,
        } = self;
        let statement = Statement::assemble(session, &text, kind, true, parts)?;
        Ok(Procedure::from_statement(statement))
    }

    /// Builds and executes in one go. Returns true if data was delivered
    /// into the output bindings.
    pub fn execute(self) -> Result<bool, Error> {
        self.statement()?.execute()
    }
}
