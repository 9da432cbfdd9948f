//! Output bindings: the engine side of fetching data into host variables.
//!
//! Each binding borrows a user owned [`Var`], knows its exchange kind, and
//! lazily creates the backend binder the first time it is defined on a
//! statement. After every fetch the binding converts the delivered cell into
//! the host type and maintains the optional indicator.

use crate::{
    backend::{FetchedCell, IntoTypeBackend, StatementBackend, VectorIntoTypeBackend},
    blob::Blob,
    convert::{Exchangeable, TypeConversion},
    error::Error,
    exchange::{ExchangeKind, Value},
    indicator::Indicator,
    row::Row,
    rowid::RowId,
    var::Var,
};

/// Writes one fetched cell into a scalar host variable, observing the null
/// and truncation protocol.
pub(crate) fn apply_cell<T: TypeConversion>(
    cell: FetchedCell,
    target: &Var<T>,
    ind: Option<&Var<Indicator>>,
) -> Result<(), Error> {
    match cell.value {
        None => {
            if let Some(ind) = ind {
                *ind.try_write()? = Indicator::Null;
            }
            if T::NULLABLE {
                *target.try_write()? = T::null_value()?;
                Ok(())
            } else if ind.is_some() {
                // The variable is left untouched.
                Ok(())
            } else {
                Err(Error::null_no_indicator())
            }
        }
        Some(value) => {
            let status = if cell.truncated {
                Indicator::Truncated
            } else {
                Indicator::Ok
            };
            let base = T::Base::from_value(value)?;
            *target.try_write()? = T::from_base(base, status)?;
            if let Some(ind) = ind {
                *ind.try_write()? = status;
            }
            Ok(())
        }
    }
}

pub(crate) trait IntoBinding {
    fn is_bulk(&self) -> bool {
        false
    }

    /// Rows one fetch may deliver into this binding. 1 for scalars.
    fn capacity(&self) -> Result<usize, Error> {
        Ok(1)
    }

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error>;

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error>;

    fn pre_fetch(&mut self) -> Result<(), Error>;

    fn post_fetch(&mut self, got_data: bool) -> Result<(), Error>;

    /// Shrinks the bound range to the number of rows actually delivered.
    fn resize(&mut self, _rows: usize) -> Result<(), Error> {
        Ok(())
    }

    fn clean_up(&mut self);
}

pub(crate) struct IntoValue<'u, T: TypeConversion> {
    target: &'u Var<T>,
    ind: Option<&'u Var<Indicator>>,
    binder: Option<Box<dyn IntoTypeBackend>>,
}

impl<'u, T: TypeConversion> IntoValue<'u, T> {
    pub fn new(target: &'u Var<T>, ind: Option<&'u Var<Indicator>>) -> Self {
        Self {
            target,
            ind,
            binder: None,
        }
    }
}

impl<T: TypeConversion> IntoBinding for IntoValue<'_, T> {
    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_into_binder()?);
        }
        self.binder
            .as_mut()
            .expect("binder exists after define")
            .define_by_pos(position, T::Base::KIND)
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_exec(rows)
    }

    fn pre_fetch(&mut self) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<(), Error> {
        let cell = self
            .binder
            .as_mut()
            .expect("into binding used before define")
            .post_fetch(got_data)?;
        match cell {
            // Normal end-of-rowset, nothing to exchange.
            None => Ok(()),
            Some(cell) => apply_cell(cell, self.target, self.ind),
        }
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }
}

pub(crate) struct VectorInto<'u, T: TypeConversion> {
    target: &'u Var<Vec<T>>,
    inds: Option<&'u Var<Vec<Indicator>>>,
    begin: usize,
    end: Option<&'u Var<usize>>,
    binder: Option<Box<dyn VectorIntoTypeBackend>>,
}

impl<'u, T: TypeConversion> VectorInto<'u, T> {
    pub fn new(target: &'u Var<Vec<T>>, inds: Option<&'u Var<Vec<Indicator>>>) -> Self {
        Self {
            target,
            inds,
            begin: 0,
            end: None,
            binder: None,
        }
    }

    pub fn with_range(target: &'u Var<Vec<T>>, begin: usize, end: &'u Var<usize>) -> Self {
        Self {
            target,
            inds: None,
            begin,
            end: Some(end),
            binder: None,
        }
    }
}

impl<T: TypeConversion> IntoBinding for VectorInto<'_, T> {
    fn is_bulk(&self) -> bool {
        true
    }

    fn capacity(&self) -> Result<usize, Error> {
        let len = self.target.try_read()?.len();
        let upper = match self.end {
            Some(end) => {
                let end = *end.try_read()?;
                if end > len {
                    return Err(Error::Usage(
                        "Bulk into range ends past the bound vector.".to_string(),
                    ));
                }
                end
            }
            None => len,
        };
        if self.begin > upper {
            return Err(Error::Usage(
                "Bulk into range begins past its end.".to_string(),
            ));
        }
        Ok(upper - self.begin)
    }

    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        let capacity = self.capacity()?;
        if capacity == 0 {
            return Err(Error::Usage("Vectors of size 0 are not allowed.".to_string()));
        }
        if let Some(inds) = self.inds {
            if inds.try_read()?.len() < self.begin + capacity {
                return Err(Error::Usage(
                    "Indicator vector is smaller than the data vector.".to_string(),
                ));
            }
        }
        if self.binder.is_none() {
            self.binder = Some(backend.make_vector_into_binder()?);
        }
        self.binder
            .as_mut()
            .expect("binder exists after define")
            .define_by_pos(position, T::Base::KIND, capacity)
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_exec(rows)
    }

    fn pre_fetch(&mut self) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<(), Error> {
        let cells = self
            .binder
            .as_mut()
            .expect("into binding used before define")
            .post_fetch(got_data)?;
        let mut target = self.target.try_write()?;
        let mut ind_guard = match self.inds {
            Some(inds) => Some(inds.try_write()?),
            None => None,
        };
        for (offset, cell) in cells.into_iter().enumerate() {
            let index = self.begin + offset;
            match cell.value {
                None => {
                    if let Some(inds) = ind_guard.as_mut() {
                        inds[index] = Indicator::Null;
                        if T::NULLABLE {
                            target[index] = T::null_value()?;
                        }
                    } else if T::NULLABLE {
                        target[index] = T::null_value()?;
                    } else {
                        return Err(Error::null_no_indicator());
                    }
                }
                Some(value) => {
                    let status = if cell.truncated {
                        Indicator::Truncated
                    } else {
                        Indicator::Ok
                    };
                    let base = T::Base::from_value(value)?;
                    target[index] = T::from_base(base, status)?;
                    if let Some(inds) = ind_guard.as_mut() {
                        inds[index] = status;
                    }
                }
            }
        }
        Ok(())
    }

    fn resize(&mut self, rows: usize) -> Result<(), Error> {
        match self.end {
            Some(end) => {
                *end.try_write()? = self.begin + rows;
            }
            None => {
                let mut target = self.target.try_write()?;
                if rows < target.len() {
                    target.truncate(rows);
                }
                if let Some(inds) = self.inds {
                    let mut inds = inds.try_write()?;
                    if rows < inds.len() {
                        inds.truncate(rows);
                    }
                }
            }
        }
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }
}

/// Fetches a large object column into a [`Blob`] handle.
pub(crate) struct BlobInto<'u> {
    target: &'u Var<Blob>,
    ind: Option<&'u Var<Indicator>>,
    binder: Option<Box<dyn IntoTypeBackend>>,
}

impl<'u> BlobInto<'u> {
    pub fn new(target: &'u Var<Blob>, ind: Option<&'u Var<Indicator>>) -> Self {
        Self {
            target,
            ind,
            binder: None,
        }
    }
}

impl IntoBinding for BlobInto<'_> {
    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_into_binder()?);
        }
        self.binder
            .as_mut()
            .expect("binder exists after define")
            .define_by_pos(position, ExchangeKind::Blob)
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_exec(rows)
    }

    fn pre_fetch(&mut self) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<(), Error> {
        let cell = self
            .binder
            .as_mut()
            .expect("into binding used before define")
            .post_fetch(got_data)?;
        let Some(cell) = cell else {
            return Ok(());
        };
        match cell.value {
            None => {
                if let Some(ind) = self.ind {
                    *ind.try_write()? = Indicator::Null;
                    Ok(())
                } else {
                    Err(Error::null_no_indicator())
                }
            }
            Some(Value::Blob(bytes)) => {
                self.target.try_write()?.assign(&bytes)?;
                if let Some(ind) = self.ind {
                    *ind.try_write()? = Indicator::Ok;
                }
                Ok(())
            }
            Some(other) => Err(Error::Conversion(format!(
                "Expected a blob cell, got {:?}.",
                other.kind()
            ))),
        }
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }
}

/// Fetches a row identifier column into a [`RowId`] handle.
pub(crate) struct RowIdInto<'u> {
    target: &'u Var<RowId>,
    ind: Option<&'u Var<Indicator>>,
    binder: Option<Box<dyn IntoTypeBackend>>,
}

impl<'u> RowIdInto<'u> {
    pub fn new(target: &'u Var<RowId>, ind: Option<&'u Var<Indicator>>) -> Self {
        Self {
            target,
            ind,
            binder: None,
        }
    }
}

impl IntoBinding for RowIdInto<'_> {
    fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_into_binder()?);
        }
        self.binder
            .as_mut()
            .expect("binder exists after define")
            .define_by_pos(position, ExchangeKind::RowId)
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_exec(rows)
    }

    fn pre_fetch(&mut self) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("into binding used before define")
            .pre_fetch()
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<(), Error> {
        let cell = self
            .binder
            .as_mut()
            .expect("into binding used before define")
            .post_fetch(got_data)?;
        let Some(cell) = cell else {
            return Ok(());
        };
        match cell.value {
            None => {
                if let Some(ind) = self.ind {
                    *ind.try_write()? = Indicator::Null;
                    Ok(())
                } else {
                    Err(Error::null_no_indicator())
                }
            }
            Some(Value::RowId(id)) => {
                self.target.try_write()?.set(id);
                if let Some(ind) = self.ind {
                    *ind.try_write()? = Indicator::Ok;
                }
                Ok(())
            }
            Some(other) => Err(Error::Conversion(format!(
                "Expected a rowid cell, got {:?}.",
                other.kind()
            ))),
        }
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }
}

/// The bindings behind a dynamic [`Row`]: one backend binder per described
/// column, all writing into the row's holders.
pub(crate) struct RowBinding<'u> {
    row: &'u Var<Row>,
    kinds: Vec<ExchangeKind>,
    binders: Vec<Box<dyn IntoTypeBackend>>,
}

impl<'u> RowBinding<'u> {
    pub fn new(row: &'u Var<Row>, kinds: Vec<ExchangeKind>) -> Self {
        Self {
            row,
            kinds,
            binders: Vec::new(),
        }
    }

    pub fn define(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        for kind in &self.kinds {
            let mut binder = backend.make_into_binder()?;
            binder.define_by_pos(position, *kind)?;
            self.binders.push(binder);
        }
        Ok(())
    }

    pub fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        for binder in &mut self.binders {
            binder.pre_exec(rows)?;
        }
        Ok(())
    }

    pub fn pre_fetch(&mut self) -> Result<(), Error> {
        for binder in &mut self.binders {
            binder.pre_fetch()?;
        }
        Ok(())
    }

    pub fn post_fetch(&mut self, got_data: bool) -> Result<(), Error> {
        for (position, binder) in self.binders.iter_mut().enumerate() {
            let Some(cell) = binder.post_fetch(got_data)? else {
                continue;
            };
            let status = match (&cell.value, cell.truncated) {
                (None, _) => Indicator::Null,
                (Some(_), true) => Indicator::Truncated,
                (Some(_), false) => Indicator::Ok,
            };
            self.row.try_write()?.set_cell(position, cell.value, status);
        }
        Ok(())
    }

    pub fn clean_up(&mut self) {
        for binder in &mut self.binders {
            binder.clean_up();
        }
    }
}
