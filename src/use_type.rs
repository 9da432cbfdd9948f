//! Input bindings: the engine side of handing host values to the driver.
//!
//! `pre_use` converts the host value to its base representation and stages
//! it with the backend binder; `post_use` runs the reverse conversion so
//! IN/OUT procedure parameters reflect the values after the call. Bindings
//! are positional unless constructed with a name; a statement rejects a mix
//! of both.

use crate::{
    backend::{StatementBackend, UseTypeBackend, VectorUseTypeBackend},
    blob::Blob,
    convert::{Exchangeable, TypeConversion},
    error::Error,
    exchange::{ExchangeKind, Value},
    indicator::Indicator,
    into_type::apply_cell,
    rowid::RowId,
    var::Var,
};

pub(crate) trait UseBinding {
    fn is_bulk(&self) -> bool {
        false
    }

    fn name(&self) -> Option<&str>;

    /// Logical rows this binding provides per execution. 1 for scalars.
    fn size(&self) -> Result<usize, Error> {
        Ok(1)
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error>;

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error>;

    fn pre_use(&mut self) -> Result<(), Error>;

    fn post_use(&mut self, got_data: bool) -> Result<(), Error>;

    fn clean_up(&mut self);

    /// Renders the staged value for diagnostics.
    fn dump_value(&self) -> String;
}

enum UseSource<'u, T> {
    /// The binding owns the value; used by the one-shot builder surface.
    Val(T),
    /// Plain borrow of a caller owned value.
    Ref(&'u T),
    /// Borrow of a [`Var`], so the caller can change the value between
    /// repeated executions.
    Shared(&'u Var<T>),
    /// Like [`UseSource::Shared`], but the database may write back through
    /// it (IN/OUT procedure parameter).
    InOut(&'u Var<T>),
}

pub(crate) struct UseValue<'u, T: TypeConversion> {
    source: UseSource<'u, T>,
    ind: Option<&'u Var<Indicator>>,
    name: Option<String>,
    binder: Option<Box<dyn UseTypeBackend>>,
}

impl<'u, T: TypeConversion> UseValue<'u, T> {
    fn with_source(source: UseSource<'u, T>, ind: Option<&'u Var<Indicator>>, name: Option<String>) -> Self {
        Self {
            source,
            ind,
            name,
            binder: None,
        }
    }

    pub fn owned(value: T, name: Option<String>) -> Self {
        Self::with_source(UseSource::Val(value), None, name)
    }

    pub fn borrowed(value: &'u T, ind: Option<&'u Var<Indicator>>, name: Option<String>) -> Self {
        Self::with_source(UseSource::Ref(value), ind, name)
    }

    pub fn shared(value: &'u Var<T>, ind: Option<&'u Var<Indicator>>, name: Option<String>) -> Self {
        Self::with_source(UseSource::Shared(value), ind, name)
    }

    pub fn in_out(value: &'u Var<T>, ind: Option<&'u Var<Indicator>>, name: Option<String>) -> Self {
        Self::with_source(UseSource::InOut(value), ind, name)
    }

    fn read_base(&self) -> Result<Option<T::Base>, Error> {
        match &self.source {
            UseSource::Val(value) => value.to_base(),
            UseSource::Ref(value) => value.to_base(),
            UseSource::Shared(value) | UseSource::InOut(value) => value.try_read()?.to_base(),
        }
    }
}

impl<T: TypeConversion> UseBinding for UseValue<'_, T> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_use_binder()?);
        }
        let read_only = !matches!(self.source, UseSource::InOut(_));
        let binder = self.binder.as_mut().expect("binder exists after bind");
        match &self.name {
            Some(name) => binder.bind_by_name(name, T::Base::KIND, read_only),
            None => binder.bind_by_pos(position, T::Base::KIND, read_only),
        }
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_exec(rows)
    }

    fn pre_use(&mut self) -> Result<(), Error> {
        let explicit_null = match self.ind {
            Some(ind) => ind.try_read()?.is_null(),
            None => false,
        };
        let value = if explicit_null {
            None
        } else {
            self.read_base()?.map(Exchangeable::into_value)
        };
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_use(value.as_ref())
    }

    fn post_use(&mut self, got_data: bool) -> Result<(), Error> {
        let cell = self
            .binder
            .as_mut()
            .expect("use binding used before bind")
            .post_use(got_data)?;
        let Some(cell) = cell else {
            return Ok(());
        };
        match &self.source {
            UseSource::InOut(target) => apply_cell(cell, target, self.ind),
            // Read only bindings must not be modified by the call.
            _ => Ok(()),
        }
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }

    fn dump_value(&self) -> String {
        if let Some(ind) = self.ind {
            match ind.try_read() {
                Ok(ind) if ind.is_null() => return "NULL".to_string(),
                Ok(_) => {}
                Err(_) => return "<borrowed>".to_string(),
            }
        }
        match self.read_base() {
            Ok(Some(base)) => base.into_value().to_string(),
            Ok(None) => "NULL".to_string(),
            Err(_) => "<not convertible>".to_string(),
        }
    }
}

enum VectorUseSource<'u, T> {
    Ref(&'u [T]),
    Shared(&'u Var<Vec<T>>),
}

pub(crate) struct VectorUse<'u, T: TypeConversion> {
    source: VectorUseSource<'u, T>,
    inds: Option<&'u Var<Vec<Indicator>>>,
    name: Option<String>,
    binder: Option<Box<dyn VectorUseTypeBackend>>,
}

impl<'u, T: TypeConversion> VectorUse<'u, T> {
    pub fn borrowed(values: &'u [T], name: Option<String>) -> Self {
        Self {
            source: VectorUseSource::Ref(values),
            inds: None,
            name,
            binder: None,
        }
    }

    pub fn shared(
        values: &'u Var<Vec<T>>,
        inds: Option<&'u Var<Vec<Indicator>>>,
        name: Option<String>,
    ) -> Self {
        Self {
            source: VectorUseSource::Shared(values),
            inds,
            name,
            binder: None,
        }
    }

    fn stage(values: &[T], inds: Option<&[Indicator]>) -> Result<Vec<Option<Value>>, Error> {
        if let Some(inds) = inds {
            if inds.len() < values.len() {
                return Err(Error::Usage(
                    "Indicator vector is smaller than the data vector.".to_string(),
                ));
            }
        }
        let mut staged = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            let null = inds.map(|inds| inds[index].is_null()).unwrap_or(false);
            if null {
                staged.push(None);
            } else {
                staged.push(value.to_base()?.map(Exchangeable::into_value));
            }
        }
        Ok(staged)
    }
}

impl<T: TypeConversion> UseBinding for VectorUse<'_, T> {
    fn is_bulk(&self) -> bool {
        true
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn size(&self) -> Result<usize, Error> {
        match &self.source {
            VectorUseSource::Ref(values) => Ok(values.len()),
            VectorUseSource::Shared(values) => Ok(values.try_read()?.len()),
        }
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.size()? == 0 {
            return Err(Error::Usage("Vectors of size 0 are not allowed.".to_string()));
        }
        if self.binder.is_none() {
            self.binder = Some(backend.make_vector_use_binder()?);
        }
        let binder = self.binder.as_mut().expect("binder exists after bind");
        match &self.name {
            Some(name) => binder.bind_by_name(name, T::Base::KIND),
            None => binder.bind_by_pos(position, T::Base::KIND),
        }
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_exec(rows)
    }

    fn pre_use(&mut self) -> Result<(), Error> {
        let ind_guard = match self.inds {
            Some(inds) => Some(inds.try_read()?),
            None => None,
        };
        let inds = ind_guard.as_deref().map(|inds| inds.as_slice());
        let staged = match &self.source {
            VectorUseSource::Ref(values) => Self::stage(values, inds)?,
            VectorUseSource::Shared(values) => Self::stage(&values.try_read()?, inds)?,
        };
        drop(ind_guard);
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_use(staged)
    }

    fn post_use(&mut self, _got_data: bool) -> Result<(), Error> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }

    fn dump_value(&self) -> String {
        "<vector>".to_string()
    }
}

/// Passes a [`Blob`] handle's contents as a large object parameter.
pub(crate) struct BlobUse<'u> {
    blob: &'u Var<Blob>,
    ind: Option<&'u Var<Indicator>>,
    name: Option<String>,
    binder: Option<Box<dyn UseTypeBackend>>,
}

impl<'u> BlobUse<'u> {
    pub fn new(blob: &'u Var<Blob>, ind: Option<&'u Var<Indicator>>, name: Option<String>) -> Self {
        Self {
            blob,
            ind,
            name,
            binder: None,
        }
    }
}

impl UseBinding for BlobUse<'_> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_use_binder()?);
        }
        let binder = self.binder.as_mut().expect("binder exists after bind");
        match &self.name {
            Some(name) => binder.bind_by_name(name, ExchangeKind::Blob, true),
            None => binder.bind_by_pos(position, ExchangeKind::Blob, true),
        }
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_exec(rows)
    }

    fn pre_use(&mut self) -> Result<(), Error> {
        let explicit_null = match self.ind {
            Some(ind) => ind.try_read()?.is_null(),
            None => false,
        };
        let value = if explicit_null {
            None
        } else {
            Some(Value::Blob(self.blob.try_write()?.read_all()?))
        };
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_use(value.as_ref())
    }

    fn post_use(&mut self, _got_data: bool) -> Result<(), Error> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }

    fn dump_value(&self) -> String {
        "<blob>".to_string()
    }
}

/// Passes a [`RowId`] handle as a parameter.
pub(crate) struct RowIdUse<'u> {
    rowid: &'u Var<RowId>,
    name: Option<String>,
    binder: Option<Box<dyn UseTypeBackend>>,
}

impl<'u> RowIdUse<'u> {
    pub fn new(rowid: &'u Var<RowId>, name: Option<String>) -> Self {
        Self {
            rowid,
            name,
            binder: None,
        }
    }
}

impl UseBinding for RowIdUse<'_> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn bind(
        &mut self,
        backend: &mut dyn StatementBackend,
        position: &mut usize,
    ) -> Result<(), Error> {
        if self.binder.is_none() {
            self.binder = Some(backend.make_use_binder()?);
        }
        let binder = self.binder.as_mut().expect("binder exists after bind");
        match &self.name {
            Some(name) => binder.bind_by_name(name, ExchangeKind::RowId, true),
            None => binder.bind_by_pos(position, ExchangeKind::RowId, true),
        }
    }

    fn pre_exec(&mut self, rows: usize) -> Result<(), Error> {
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_exec(rows)
    }

    fn pre_use(&mut self) -> Result<(), Error> {
        let value = self.rowid.try_read()?.value().map(Value::RowId);
        if value.is_none() {
            return Err(Error::Bind(
                "Rowid bound as a parameter has no value yet.".to_string(),
            ));
        }
        self.binder
            .as_mut()
            .expect("use binding used before bind")
            .pre_use(value.as_ref())
    }

    fn post_use(&mut self, _got_data: bool) -> Result<(), Error> {
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(binder) = &mut self.binder {
            binder.clean_up();
        }
    }

    fn dump_value(&self) -> String {
        "<rowid>".to_string()
    }
}
