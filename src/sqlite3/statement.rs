//! The SQLite statement backend and its binders.
//!
//! SQLite streams rows one `step` at a time, so the Oracle style fetch
//! window is emulated: each fetch steps up to `n` times and buffers the
//! delivered rows; a window shorter than requested reports the end of the
//! rowset. Statement and binders share one state cell, mirroring how the
//! binders of a statement all address the same driver handle.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use widestring::U16String;

use crate::{
    backend::{
        ExecResult, FetchedCell, IntoTypeBackend, StatementBackend, StatementKind, UseTypeBackend,
        VectorIntoTypeBackend, VectorUseTypeBackend,
    },
    error::Error,
    exchange::{DbType, ExchangeKind, Value},
    parse::PlaceholderStyle,
};

use super::handle::{ConnectionHandle, RawCell, StatementHandle};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ParamKey {
    Pos(usize),
    Name(String),
}

struct State {
    conn: Rc<ConnectionHandle>,
    statement: Option<StatementHandle>,
    names: Vec<String>,
    bound_by_name: bool,
    bound_by_pos: bool,
    scalar_params: BTreeMap<ParamKey, Option<Value>>,
    bulk_params: BTreeMap<ParamKey, Vec<Option<Value>>>,
    window: Vec<Vec<RawCell>>,
    /// A row stepped over but not yet consumed by a window, i.e. the
    /// execution look-ahead or the row buffered for describe.
    pending: Option<Vec<RawCell>>,
    exhausted: bool,
    just_described: bool,
    affected_bulk: Option<u64>,
}

impl State {
    fn handle(&self) -> Result<&StatementHandle, Error> {
        self.statement
            .as_ref()
            .ok_or_else(|| Error::Usage("Statement used before prepare.".to_string()))
    }

    fn read_row(statement: &StatementHandle) -> Vec<RawCell> {
        (0..statement.column_count())
            .map(|index| statement.column_value(index))
            .collect()
    }

    fn parameter_slot(&self, key: &ParamKey) -> Result<usize, Error> {
        match key {
            // Named parameters get their index in order of first
            // occurrence, which matches the binding order of positional
            // use elements.
            ParamKey::Pos(position) => Ok(position + 1),
            ParamKey::Name(name) => {
                let index = self.handle()?.parameter_index(&format!(":{name}"));
                if index == 0 {
                    Err(Error::Bind(format!("Cannot bind (by name) to :{name}.")))
                } else {
                    Ok(index)
                }
            }
        }
    }

    fn bind_value(&self, index: usize, value: Option<&Value>) -> Result<(), Error> {
        let statement = self.handle()?;
        match value {
            None => statement.bind_null(index),
            Some(Value::Char(c)) => statement.bind_text(index, &c.to_string()),
            Some(Value::Text(s)) | Some(Value::Xml(s)) | Some(Value::LongText(s)) => {
                statement.bind_text(index, s)
            }
            Some(Value::WideText(s)) => statement.bind_text(index, &s.to_string_lossy()),
            Some(Value::I8(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::U8(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::I16(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::U16(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::I32(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::U32(v)) => statement.bind_int64(index, i64::from(*v)),
            Some(Value::I64(v)) | Some(Value::RowId(v)) => statement.bind_int64(index, *v),
            // Values above the signed range survive as text; the column
            // reads back through the same text path.
            Some(Value::U64(v)) => {
                if *v <= i64::MAX as u64 {
                    statement.bind_int64(index, *v as i64)
                } else {
                    statement.bind_text(index, &v.to_string())
                }
            }
            Some(Value::Double(v)) => statement.bind_double(index, *v),
            Some(Value::Timestamp(t)) => {
                statement.bind_text(index, &t.format(TIMESTAMP_FORMAT).to_string())
            }
            Some(Value::Blob(b)) => statement.bind_blob(index, b),
        }
    }

    fn bind_scalar_params(&self) -> Result<(), Error> {
        for (key, value) in &self.scalar_params {
            let index = self.parameter_slot(key)?;
            self.bind_value(index, value.as_ref())?;
        }
        Ok(())
    }

    fn bind_bulk_row(&self, row: usize) -> Result<(), Error> {
        for (key, values) in &self.bulk_params {
            let value = values.get(row).ok_or_else(|| {
                Error::Usage("Bulk use elements have different sizes.".to_string())
            })?;
            let index = self.parameter_slot(key)?;
            self.bind_value(index, value.as_ref())?;
        }
        Ok(())
    }

    fn reset_for_execute(&mut self) -> Result<(), Error> {
        let statement = self.handle()?;
        statement.reset();
        statement.clear_bindings();
        self.window.clear();
        self.pending = None;
        self.exhausted = false;
        self.affected_bulk = None;
        Ok(())
    }

    /// Steps once to run the statement; a delivered row becomes the
    /// look-ahead. With `rows > 0` follows through into the first window.
    fn run(&mut self, rows: usize) -> Result<ExecResult, Error> {
        let stepped = self
            .handle()?
            .step()
            .map_err(|(message, code)| Error::Execute {
                message,
                code: Some(code),
            })?;
        if stepped {
            let row = Self::read_row(self.handle()?);
            self.pending = Some(row);
            if rows > 0 {
                self.fetch_window(rows)
            } else {
                Ok(ExecResult::Success)
            }
        } else {
            self.exhausted = true;
            if rows > 0 {
                Ok(ExecResult::NoData)
            } else {
                Ok(ExecResult::Success)
            }
        }
    }

    fn fetch_window(&mut self, rows: usize) -> Result<ExecResult, Error> {
        self.window.clear();
        while self.window.len() < rows {
            if let Some(row) = self.pending.take() {
                self.window.push(row);
                continue;
            }
            if self.exhausted {
                break;
            }
            let stepped = self
                .handle()?
                .step()
                .map_err(|(message, code)| Error::Fetch {
                    message,
                    code: Some(code),
                })?;
            if stepped {
                let row = Self::read_row(self.handle()?);
                self.window.push(row);
            } else {
                self.exhausted = true;
            }
        }
        if self.window.len() == rows {
            Ok(ExecResult::Success)
        } else {
            // End of rowset mid-window; the delivered rows stay available.
            Ok(ExecResult::NoData)
        }
    }
}

pub(crate) struct Sqlite3Statement {
    state: Rc<RefCell<State>>,
}

impl Sqlite3Statement {
    pub fn new(conn: Rc<ConnectionHandle>) -> Self {
        Sqlite3Statement {
            state: Rc::new(RefCell::new(State {
                conn,
                statement: None,
                names: Vec::new(),
                bound_by_name: false,
                bound_by_pos: false,
                scalar_params: BTreeMap::new(),
                bulk_params: BTreeMap::new(),
                window: Vec::new(),
                pending: None,
                exhausted: false,
                just_described: false,
                affected_bulk: None,
            })),
        }
    }
}

impl StatementBackend for Sqlite3Statement {
    fn placeholder_style(&self) -> PlaceholderStyle {
        // sqlite binds :name parameters natively.
        PlaceholderStyle::Named
    }

    fn prepare(
        &mut self,
        query: &str,
        names: &[String],
        _kind: StatementKind,
    ) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let statement = StatementHandle::prepare(Rc::clone(&state.conn), query)?;
        state.statement = Some(statement);
        state.names = names.to_vec();
        Ok(())
    }

    fn execute(&mut self, rows: usize) -> Result<ExecResult, Error> {
        let mut state = self.state.borrow_mut();

        // A statement which was just described has already run, with the
        // first row buffered; reuse that result once instead of running
        // the query again.
        if state.just_described {
            state.just_described = false;
            return if rows > 0 {
                state.fetch_window(rows)
            } else {
                Ok(ExecResult::Success)
            };
        }

        state.reset_for_execute()?;

        if !state.bulk_params.is_empty() {
            // No native array binding; execute once per logical row and
            // accumulate the affected row counts.
            let executions = rows.max(1);
            let mut affected = 0;
            for row in 0..executions {
                state.bind_bulk_row(row)?;
                let stepped = state
                    .handle()?
                    .step()
                    .map_err(|(message, code)| Error::Execute {
                        message,
                        code: Some(code),
                    })?;
                if stepped {
                    return Err(Error::Execute {
                        message: "The query should not have returned any data but it did."
                            .to_string(),
                        code: None,
                    });
                }
                affected += state.conn.changes();
                let statement = state.handle()?;
                statement.reset();
                statement.clear_bindings();
            }
            state.affected_bulk = Some(affected);
            return Ok(ExecResult::NoData);
        }

        state.bind_scalar_params()?;
        state.run(rows)
    }

    fn fetch(&mut self, rows: usize) -> Result<ExecResult, Error> {
        self.state.borrow_mut().fetch_window(rows)
    }

    fn affected_rows(&mut self) -> Result<Option<u64>, Error> {
        let state = self.state.borrow();
        Ok(Some(
            state.affected_bulk.unwrap_or_else(|| state.conn.changes()),
        ))
    }

    fn rows_in_window(&self) -> usize {
        self.state.borrow().window.len()
    }

    fn parameter_name(&self, index: usize) -> Option<String> {
        self.state.borrow().names.get(index).cloned()
    }

    fn rewrite_for_procedure_call(&self, query: &str) -> String {
        // No stored procedures; the text stands as written.
        query.to_string()
    }

    fn prepare_for_describe(&mut self) -> Result<usize, Error> {
        let mut state = self.state.borrow_mut();
        state.reset_for_execute()?;
        state.bind_scalar_params()?;
        // Run the query so undeclared column types can fall back to the
        // value types of the first row.
        state.run(0)?;
        state.just_described = true;
        let count = state.handle()?.column_count();
        Ok(count)
    }

    fn describe_column(&mut self, position: usize) -> Result<(DbType, String), Error> {
        let state = self.state.borrow();
        let statement = state.handle()?;
        let name = statement.column_name(position);
        let declared = statement
            .column_decltype(position)
            .and_then(|decl| db_type_from_decl(&decl));
        let db_type = declared
            .or_else(|| {
                state
                    .pending
                    .as_ref()
                    .and_then(|row| row.get(position))
                    .and_then(raw_cell_db_type)
            })
            .unwrap_or(DbType::Text);
        Ok((db_type, name))
    }

    fn exchange_db_type_for(&self, db_type: DbType) -> DbType {
        // Declared column types say nothing about the magnitude of what is
        // actually stored, so dynamic fetches widen every integer type.
        match db_type {
            DbType::I8
            | DbType::U8
            | DbType::I16
            | DbType::U16
            | DbType::I32
            | DbType::U32 => DbType::I64,
            other => other,
        }
    }

    fn make_into_binder(&mut self) -> Result<Box<dyn IntoTypeBackend>, Error> {
        Ok(Box::new(Sqlite3IntoBinder {
            state: Rc::clone(&self.state),
            position: 0,
            kind: ExchangeKind::Text,
        }))
    }

    fn make_use_binder(&mut self) -> Result<Box<dyn UseTypeBackend>, Error> {
        Ok(Box::new(Sqlite3UseBinder {
            state: Rc::clone(&self.state),
            key: None,
        }))
    }

    fn make_vector_into_binder(&mut self) -> Result<Box<dyn VectorIntoTypeBackend>, Error> {
        Ok(Box::new(Sqlite3VectorIntoBinder {
            state: Rc::clone(&self.state),
            position: 0,
            kind: ExchangeKind::Text,
        }))
    }

    fn make_vector_use_binder(&mut self) -> Result<Box<dyn VectorUseTypeBackend>, Error> {
        Ok(Box::new(Sqlite3VectorUseBinder {
            state: Rc::clone(&self.state),
            key: None,
        }))
    }

    fn clean_up(&mut self) {
        self.state.borrow_mut().statement = None;
    }
}

fn db_type_from_decl(decl: &str) -> Option<DbType> {
    let decl = decl.to_ascii_lowercase();
    if decl.contains("xml") {
        Some(DbType::Xml)
    } else if decl.contains("date") || decl.contains("time") {
        Some(DbType::Date)
    } else if decl.contains("bigint") || decl.contains("int8") {
        Some(DbType::I64)
    } else if decl.contains("smallint") {
        Some(DbType::I16)
    } else if decl.contains("tinyint") || decl.contains("bool") {
        Some(DbType::I8)
    } else if decl.contains("int") {
        Some(DbType::I32)
    } else if decl.contains("char") || decl.contains("clob") || decl.contains("text") {
        Some(DbType::Text)
    } else if decl.contains("blob") || decl.contains("binary") {
        Some(DbType::Blob)
    } else if decl.contains("real")
        || decl.contains("floa")
        || decl.contains("doub")
        || decl.contains("numeric")
        || decl.contains("decimal")
    {
        Some(DbType::Double)
    } else {
        None
    }
}

fn raw_cell_db_type(raw: &RawCell) -> Option<DbType> {
    match raw {
        RawCell::Null => None,
        RawCell::Int(_) => Some(DbType::I64),
        RawCell::Float(_) => Some(DbType::Double),
        RawCell::Text(_) => Some(DbType::Text),
        RawCell::Blob(_) => Some(DbType::Blob),
    }
}

fn raw_to_text(raw: &RawCell) -> String {
    match raw {
        RawCell::Null => String::new(),
        RawCell::Int(v) => v.to_string(),
        RawCell::Float(v) => v.to_string(),
        RawCell::Text(s) => s.clone(),
        RawCell::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

fn raw_to_i64(raw: &RawCell) -> Result<i64, Error> {
    match raw {
        RawCell::Int(v) => Ok(*v),
        // sqlite itself truncates towards zero when asked for an integer.
        RawCell::Float(v) => Ok(*v as i64),
        RawCell::Text(s) => atoi::atoi::<i64>(s.trim().as_bytes())
            .ok_or_else(|| Error::Conversion(format!("Cannot parse '{s}' as an integer."))),
        RawCell::Blob(_) => Err(Error::Conversion(
            "Cannot convert a blob cell into an integer.".to_string(),
        )),
        RawCell::Null => Err(Error::Conversion(
            "Cannot convert a null cell into an integer.".to_string(),
        )),
    }
}

fn raw_to_u64(raw: &RawCell) -> Result<u64, Error> {
    match raw {
        RawCell::Int(v) => u64::try_from(*v)
            .map_err(|_| Error::Conversion(format!("Value {v} is out of range for U64."))),
        RawCell::Float(v) => {
            if *v >= 0.0 {
                Ok(*v as u64)
            } else {
                Err(Error::Conversion(format!("Value {v} is out of range for U64.")))
            }
        }
        RawCell::Text(s) => atoi::atoi::<u64>(s.trim().as_bytes())
            .ok_or_else(|| Error::Conversion(format!("Cannot parse '{s}' as an integer."))),
        RawCell::Blob(_) => Err(Error::Conversion(
            "Cannot convert a blob cell into an integer.".to_string(),
        )),
        RawCell::Null => Err(Error::Conversion(
            "Cannot convert a null cell into an integer.".to_string(),
        )),
    }
}

fn narrow<T>(value: i64, kind: ExchangeKind) -> Result<T, Error>
where
    T: TryFrom<i64>,
{
    T::try_from(value)
        .map_err(|_| Error::Conversion(format!("Value {value} is out of range for {kind:?}.")))
}

fn parse_timestamp(text: &str) -> Result<NaiveDateTime, Error> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|date| date.and_time(NaiveTime::MIN))
        })
        .map_err(|_| Error::Conversion(format!("Cannot parse '{text}' as a timestamp.")))
}

/// Coerces one buffered cell into the exchange kind requested by a binding,
/// following sqlite's own column conversions.
fn raw_to_cell(raw: &RawCell, kind: ExchangeKind) -> Result<FetchedCell, Error> {
    if matches!(raw, RawCell::Null) {
        return Ok(FetchedCell::null());
    }
    let value = match kind {
        ExchangeKind::Char => {
            let text = raw_to_text(raw);
            Value::Char(text.chars().next().unwrap_or('\0'))
        }
        ExchangeKind::Text => Value::Text(raw_to_text(raw)),
        ExchangeKind::WideText => Value::WideText(U16String::from_str(&raw_to_text(raw))),
        ExchangeKind::Xml => Value::Xml(raw_to_text(raw)),
        ExchangeKind::LongText => Value::LongText(raw_to_text(raw)),
        ExchangeKind::I8 => Value::I8(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::U8 => Value::U8(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::I16 => Value::I16(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::U16 => Value::U16(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::I32 => Value::I32(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::U32 => Value::U32(narrow(raw_to_i64(raw)?, kind)?),
        ExchangeKind::I64 => Value::I64(raw_to_i64(raw)?),
        ExchangeKind::U64 => Value::U64(raw_to_u64(raw)?),
        ExchangeKind::Double => match raw {
            RawCell::Int(v) => Value::Double(*v as f64),
            RawCell::Float(v) => Value::Double(*v),
            RawCell::Text(s) => Value::Double(s.trim().parse().map_err(|_| {
                Error::Conversion(format!("Cannot parse '{s}' as a floating point number."))
            })?),
            _ => {
                return Err(Error::Conversion(
                    "Cannot convert this cell into a floating point number.".to_string(),
                ));
            }
        },
        ExchangeKind::Timestamp => match raw {
            RawCell::Text(s) => Value::Timestamp(parse_timestamp(s)?),
            _ => {
                return Err(Error::Conversion(
                    "Cannot convert this cell into a timestamp.".to_string(),
                ));
            }
        },
        ExchangeKind::RowId => Value::RowId(raw_to_i64(raw)?),
        ExchangeKind::Blob => match raw {
            RawCell::Blob(b) => Value::Blob(b.clone()),
            RawCell::Text(s) => Value::Blob(s.clone().into_bytes()),
            _ => {
                return Err(Error::Conversion(
                    "Cannot convert this cell into a blob.".to_string(),
                ));
            }
        },
        ExchangeKind::Statement => {
            return Err(Error::Bind(
                "This backend does not support nested statements.".to_string(),
            ));
        }
    };
    Ok(FetchedCell::new(value))
}

fn reject_unsupported(kind: ExchangeKind) -> Result<(), Error> {
    if kind == ExchangeKind::Statement {
        Err(Error::Bind(
            "This backend does not support nested statements.".to_string(),
        ))
    } else {
        Ok(())
    }
}

struct Sqlite3IntoBinder {
    state: Rc<RefCell<State>>,
    position: usize,
    kind: ExchangeKind,
}

impl IntoTypeBackend for Sqlite3IntoBinder {
    fn define_by_pos(&mut self, position: &mut usize, kind: ExchangeKind) -> Result<(), Error> {
        reject_unsupported(kind)?;
        self.position = *position;
        *position += 1;
        self.kind = kind;
        Ok(())
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<Option<FetchedCell>, Error> {
        if !got_data {
            return Ok(None);
        }
        let state = self.state.borrow();
        let row = state.window.first().ok_or_else(|| Error::Fetch {
            message: "No row in the current fetch window.".to_string(),
            code: None,
        })?;
        let raw = row.get(self.position).ok_or_else(|| Error::Fetch {
            message: format!("Column position {} is out of range.", self.position),
            code: None,
        })?;
        Ok(Some(raw_to_cell(raw, self.kind)?))
    }
}

struct Sqlite3VectorIntoBinder {
    state: Rc<RefCell<State>>,
    position: usize,
    kind: ExchangeKind,
}

impl VectorIntoTypeBackend for Sqlite3VectorIntoBinder {
    fn define_by_pos(
        &mut self,
        position: &mut usize,
        kind: ExchangeKind,
        _capacity: usize,
    ) -> Result<(), Error> {
        reject_unsupported(kind)?;
        self.position = *position;
        *position += 1;
        self.kind = kind;
        Ok(())
    }

    fn post_fetch(&mut self, got_data: bool) -> Result<Vec<FetchedCell>, Error> {
        if !got_data {
            return Ok(Vec::new());
        }
        let state = self.state.borrow();
        state
            .window
            .iter()
            .map(|row| {
                let raw = row.get(self.position).ok_or_else(|| Error::Fetch {
                    message: format!("Column position {} is out of range.", self.position),
                    code: None,
                })?;
                raw_to_cell(raw, self.kind)
            })
            .collect()
    }
}

struct Sqlite3UseBinder {
    state: Rc<RefCell<State>>,
    key: Option<ParamKey>,
}

impl UseTypeBackend for Sqlite3UseBinder {
    fn bind_by_pos(
        &mut self,
        position: &mut usize,
        kind: ExchangeKind,
        _read_only: bool,
    ) -> Result<(), Error> {
        reject_unsupported(kind)?;
        let mut state = self.state.borrow_mut();
        if state.bound_by_name {
            return Err(Error::Bind(
                "Binding for use elements must be either by position or by name.".to_string(),
            ));
        }
        state.bound_by_pos = true;
        self.key = Some(ParamKey::Pos(*position));
        *position += 1;
        Ok(())
    }

    fn bind_by_name(
        &mut self,
        name: &str,
        kind: ExchangeKind,
        _read_only: bool,
    ) -> Result<(), Error> {
        reject_unsupported(kind)?;
        let mut state = self.state.borrow_mut();
        if state.bound_by_pos {
            return Err(Error::Bind(
                "Binding for use elements must be either by position or by name.".to_string(),
            ));
        }
        if state.handle()?.parameter_index(&format!(":{name}")) == 0 {
            return Err(Error::Bind(format!("Cannot bind (by name) to :{name}.")));
        }
        state.bound_by_name = true;
        self.key = Some(ParamKey::Name(name.to_string()));
        Ok(())
    }

    fn pre_use(&mut self, value: Option<&Value>) -> Result<(), Error> {
        let key = self
            .key
            .clone()
            .ok_or_else(|| Error::Bind("Use element staged before bind.".to_string()))?;
        self.state
            .borrow_mut()
            .scalar_params
            .insert(key, value.cloned());
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(key) = &self.key {
            self.state.borrow_mut().scalar_params.remove(key);
        }
    }
}

struct Sqlite3VectorUseBinder {
    state: Rc<RefCell<State>>,
    key: Option<ParamKey>,
}

impl VectorUseTypeBackend for Sqlite3VectorUseBinder {
    fn bind_by_pos(&mut self, position: &mut usize, kind: ExchangeKind) -> Result<(), Error> {
        reject_unsupported(kind)?;
        let mut state = self.state.borrow_mut();
        if state.bound_by_name {
            return Err(Error::Bind(
                "Binding for use elements must be either by position or by name.".to_string(),
            ));
        }
        state.bound_by_pos = true;
        self.key = Some(ParamKey::Pos(*position));
        *position += 1;
        Ok(())
    }

    fn bind_by_name(&mut self, name: &str, kind: ExchangeKind) -> Result<(), Error> {
        reject_unsupported(kind)?;
        let mut state = self.state.borrow_mut();
        if state.bound_by_pos {
            return Err(Error::Bind(
                "Binding for use elements must be either by position or by name.".to_string(),
            ));
        }
        if state.handle()?.parameter_index(&format!(":{name}")) == 0 {
            return Err(Error::Bind(format!("Cannot bind (by name) to :{name}.")));
        }
        state.bound_by_name = true;
        self.key = Some(ParamKey::Name(name.to_string()));
        Ok(())
    }

    fn pre_use(&mut self, values: Vec<Option<Value>>) -> Result<(), Error> {
        let key = self
            .key
            .clone()
            .ok_or_else(|| Error::Bind("Use element staged before bind.".to_string()))?;
        self.state.borrow_mut().bulk_params.insert(key, values);
        Ok(())
    }

    fn clean_up(&mut self) {
        if let Some(key) = &self.key {
            self.state.borrow_mut().bulk_params.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_map_onto_db_types() {
        assert_eq!(Some(DbType::I32), db_type_from_decl("INTEGER"));
        assert_eq!(Some(DbType::I64), db_type_from_decl("BIGINT"));
        assert_eq!(Some(DbType::Text), db_type_from_decl("varchar(20)"));
        assert_eq!(Some(DbType::Date), db_type_from_decl("datetime"));
        assert_eq!(Some(DbType::Double), db_type_from_decl("NUMERIC(10,2)"));
        assert_eq!(Some(DbType::Blob), db_type_from_decl("blob"));
        assert_eq!(None, db_type_from_decl("geometry"));
    }

    #[test]
    fn text_cells_coerce_into_numbers() {
        let cell = raw_to_cell(&RawCell::Text("42".to_string()), ExchangeKind::I32).unwrap();
        assert_eq!(Some(Value::I32(42)), cell.value);
        let cell = raw_to_cell(&RawCell::Text("2.5".to_string()), ExchangeKind::Double).unwrap();
        assert_eq!(Some(Value::Double(2.5)), cell.value);
    }

    #[test]
    fn narrowing_out_of_range_is_rejected() {
        assert!(raw_to_cell(&RawCell::Int(300), ExchangeKind::I8).is_err());
        assert!(raw_to_cell(&RawCell::Int(-1), ExchangeKind::U64).is_err());
    }

    #[test]
    fn timestamps_parse_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2006, 11, 22)
            .unwrap()
            .and_hms_opt(12, 30, 45)
            .unwrap();
        assert_eq!(expected, parse_timestamp("2006-11-22 12:30:45").unwrap());
        assert_eq!(expected, parse_timestamp("2006-11-22T12:30:45").unwrap());
        assert_eq!(
            NaiveTime::MIN,
            parse_timestamp("2006-11-22").unwrap().time()
        );
    }
}
