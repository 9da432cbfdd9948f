//! The statement engine.
//!
//! A [`Statement`] owns the parsed query text, the ordered into and use
//! binding lists and the backend statement. It validates the binding shape,
//! drives prepare, execute and fetch against the backend, and orchestrates
//! the describe step for dynamic rows.

use log::debug;

use crate::{
    backend::{StatementBackend, StatementKind},
    error::Error,
    into_type::{IntoBinding, RowBinding},
    parse::{parse_query, ParsedQuery},
    row::{ColumnProperties, Row},
    session::Session,
    use_type::UseBinding,
    var::Var,
};

/// Bindings accumulated by a [`crate::Query`] before the statement exists.
pub(crate) struct BindingParts<'u> {
    pub intos: Vec<Box<dyn IntoBinding + 'u>>,
    pub uses: Vec<Box<dyn UseBinding + 'u>>,
    pub row: Option<&'u Var<Row>>,
    pub has_scalar_into: bool,
    pub has_bulk_into: bool,
    pub has_scalar_use: bool,
    pub has_bulk_use: bool,
}

impl Default for BindingParts<'_> {
    fn default() -> Self {
        Self {
            intos: Vec::new(),
            uses: Vec::new(),
            row: None,
            has_scalar_into: false,
            has_bulk_into: false,
            has_scalar_use: false,
            has_bulk_use: false,
        }
    }
}

/// A prepared statement together with its bindings.
///
/// The lifetime `'u` ties the statement to the host variables its bindings
/// borrow; they must outlive it. Statements are built with
/// [`crate::Session::prepare`] or [`crate::Session::once`] and the
/// [`crate::Query`] builder.
pub struct Statement<'u> {
    backend: Box<dyn StatementBackend>,
    query: String,
    parsed: ParsedQuery,
    names: Vec<String>,
    intos: Vec<Box<dyn IntoBinding + 'u>>,
    uses: Vec<Box<dyn UseBinding + 'u>>,
    row_target: Option<&'u Var<Row>>,
    row_binding: Option<RowBinding<'u>>,
    has_scalar_into: bool,
    has_bulk_into: bool,
    has_scalar_use: bool,
    has_bulk_use: bool,
    defined: bool,
    next_position: usize,
    fetch_size: usize,
}

impl<'u> Statement<'u> {
    pub(crate) fn assemble(
        session: &mut Session,
        query: &str,
        kind: StatementKind,
        procedure: bool,
        parts: BindingParts<'u>,
    ) -> Result<Self, Error> {
        let mut backend = session.backend_mut().make_statement()?;
        let query = if procedure {
            backend.rewrite_for_procedure_call(query)
        } else {
            query.to_string()
        };
        let parsed = parse_query(
            &query,
            backend.placeholder_style(),
            backend.supports_quoted_identifiers(),
        );
        let names = parsed.distinct_names();
        debug!("Preparing statement: {}", parsed.text);
        backend.prepare(&parsed.text, &names, kind)?;
        Ok(Statement {
            backend,
            query,
            parsed,
            names,
            intos: parts.intos,
            uses: parts.uses,
            row_target: parts.row,
            row_binding: None,
            has_scalar_into: parts.has_scalar_into,
            has_bulk_into: parts.has_bulk_into,
            has_scalar_use: parts.has_scalar_use,
            has_bulk_use: parts.has_bulk_use,
            defined: false,
            next_position: 0,
            fetch_size: 0,
        })
    }

    /// The statement text as written by the application, before placeholder
    /// rewriting.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Distinct parameter names, in textual order of first occurrence.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// Executes the statement. If the statement has output bindings, the
    /// first window of rows is fetched as part of the call.
    ///
    /// Returns true if data was delivered into the output bindings.
    pub fn execute(&mut self) -> Result<bool, Error> {
        if !self.defined {
            self.validate()?;
            self.define_and_bind()?;
            self.defined = true;
        }

        let bulk_use_size = self.bulk_use_size()?;
        let fetch_size = if self.row_target.is_some() || !self.intos.is_empty() {
            self.intos_size()?
        } else {
            0
        };
        self.fetch_size = fetch_size;
        let rows = bulk_use_size.unwrap_or(fetch_size).max(1);

        for use_ in &mut self.uses {
            use_.pre_exec(rows)?;
        }
        for into in &mut self.intos {
            into.pre_exec(fetch_size.max(1))?;
        }
        for use_ in &mut self.uses {
            use_.pre_use()?;
        }

        // Dynamic rows discover their shape on the first execution. The
        // describe runs the query for one row; the backend remembers this
        // and the execute below reuses the buffered result.
        if self.row_target.is_some() && self.row_binding.is_none() {
            self.describe_row()?;
        }

        debug!("Executing statement: {}", self.parsed.text);
        let execute_rows = bulk_use_size.unwrap_or(fetch_size);
        if let Err(error) = self.backend.execute(execute_rows) {
            self.log_failed_execution(&error);
            return Err(error);
        }

        let mut got_data = false;
        if fetch_size > 0 {
            let delivered = self.backend.rows_in_window();
            got_data = delivered > 0;
            self.exchange_window(delivered, got_data)?;
        }
        for use_ in &mut self.uses {
            use_.post_use(got_data)?;
        }
        Ok(got_data)
    }

    /// Advances to the next window of rows. Returns true as long as at
    /// least one row was delivered; bulk bindings are shrunk to the number
    /// of rows actually delivered when the rowset ends mid-window.
    pub fn fetch(&mut self) -> Result<bool, Error> {
        if !self.defined || self.fetch_size == 0 {
            return Err(Error::Usage(
                "Cannot fetch from a statement without into elements.".to_string(),
            ));
        }
        for into in &mut self.intos {
            into.pre_fetch()?;
        }
        if let Some(row_binding) = &mut self.row_binding {
            row_binding.pre_fetch()?;
        }
        self.backend.fetch(self.fetch_size)?;
        let delivered = self.backend.rows_in_window();
        let got_data = delivered > 0;
        self.exchange_window(delivered, got_data)?;
        Ok(got_data)
    }

    /// Rows changed by the last insert, update or delete. For a bulk
    /// execution this accumulates over all logical rows. `None` if the
    /// driver cannot tell.
    pub fn affected_rows(&mut self) -> Result<Option<u64>, Error> {
        self.backend.affected_rows()
    }

    fn exchange_window(&mut self, delivered: usize, got_data: bool) -> Result<(), Error> {
        for into in &mut self.intos {
            if into.is_bulk() {
                into.resize(delivered)?;
            }
        }
        for into in &mut self.intos {
            into.post_fetch(got_data)?;
        }
        if let Some(row_binding) = &mut self.row_binding {
            row_binding.post_fetch(got_data)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        if self.has_bulk_into && self.has_scalar_use {
            return Err(Error::Usage(
                "Bulk into with scalar use elements is not supported.".to_string(),
            ));
        }
        if self.has_bulk_use && self.has_scalar_use {
            return Err(Error::Usage(
                "Mixing bulk and scalar use elements is not supported.".to_string(),
            ));
        }
        if self.has_bulk_use
            && (self.has_scalar_into || self.has_bulk_into || self.row_target.is_some())
        {
            return Err(Error::Usage(
                "Bulk use with into elements is not supported.".to_string(),
            ));
        }
        let named = self.uses.iter().filter(|u| u.name().is_some()).count();
        if named > 0 && named < self.uses.len() {
            return Err(Error::Bind(
                "Binding for use elements must be either by position or by name.".to_string(),
            ));
        }
        Ok(())
    }

    fn define_and_bind(&mut self) -> Result<(), Error> {
        let mut position = 0;
        for into in &mut self.intos {
            into.define(self.backend.as_mut(), &mut position)?;
        }
        self.next_position = position;
        let mut position = 0;
        for use_ in &mut self.uses {
            use_.bind(self.backend.as_mut(), &mut position)?;
        }
        Ok(())
    }

    fn describe_row(&mut self) -> Result<(), Error> {
        let columns = self.backend.prepare_for_describe()?;
        let row_var = self.row_target.expect("describe requires a bound row");
        let mut kinds = Vec::with_capacity(columns);
        {
            let mut row = row_var.try_write()?;
            row.clear();
            for position in 0..columns {
                let (db_type, name) = self.backend.describe_column(position)?;
                let data_kind = self.backend.to_data_kind(db_type);
                row.add_column(ColumnProperties::new(name, db_type, data_kind));
                kinds.push(self.backend.exchange_db_type_for(db_type).exchange_kind());
            }
        }
        let mut binding = RowBinding::new(row_var, kinds);
        binding.define(self.backend.as_mut(), &mut self.next_position)?;
        self.row_binding = Some(binding);
        Ok(())
    }

    fn bulk_use_size(&self) -> Result<Option<usize>, Error> {
        let mut size = None;
        for use_ in &self.uses {
            if !use_.is_bulk() {
                continue;
            }
            let this = use_.size()?;
            match size {
                None => size = Some(this),
                Some(other) if other != this => {
                    return Err(Error::Usage(
                        "Bulk use elements have different sizes.".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(size)
    }

    fn intos_size(&self) -> Result<usize, Error> {
        let mut size = None;
        for into in &self.intos {
            if !into.is_bulk() {
                continue;
            }
            let this = into.capacity()?;
            match size {
                None => size = Some(this),
                Some(other) if other != this => {
                    return Err(Error::Usage(
                        "Bulk into elements have different sizes.".to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(size.unwrap_or(1))
    }

    fn log_failed_execution(&self, error: &Error) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        if self.uses.is_empty() {
            debug!("Statement failed: {error}");
            return;
        }
        let mut values = String::new();
        for (index, use_) in self.uses.iter().enumerate() {
            if index > 0 {
                values.push_str(", ");
            }
            match use_.name() {
                Some(name) => values.push_str(&format!(":{name}={}", use_.dump_value())),
                None => values.push_str(&format!("#{index}={}", use_.dump_value())),
            }
        }
        debug!("Statement failed: {error} with {values}");
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // Secondary teardown failures are not propagated; they would mask
        // the error that caused the unwinding.
        for into in &mut self.intos {
            into.clean_up();
        }
        if let Some(row_binding) = &mut self.row_binding {
            row_binding.clean_up();
        }
        for use_ in &mut self.uses {
            use_.clean_up();
        }
        self.backend.clean_up();
    }
}
