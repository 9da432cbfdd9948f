//! Dynamically typed result rows.
//!
//! A [`Row`] discovers its shape from the statement it is bound to: on the
//! first execute the statement describes the result columns and sizes the
//! row accordingly. Each fetch then overwrites the holders in place, so one
//! row object serves an entire result set, or several.

use std::collections::HashMap;

use crate::{
    convert::{Exchangeable, TypeConversion},
    error::Error,
    exchange::{DataKind, DbType, Value},
    indicator::Indicator,
};

/// Name and type tags of one result column.
#[derive(Debug, Clone)]
pub struct ColumnProperties {
    name: String,
    db_type: DbType,
    data_kind: DataKind,
}

impl ColumnProperties {
    pub(crate) fn new(name: String, db_type: DbType, data_kind: DataKind) -> Self {
        Self {
            name,
            db_type,
            data_kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fine column type tag.
    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    /// The coarse column type tag, as projected by the backend.
    pub fn data_kind(&self) -> DataKind {
        self.data_kind
    }
}

/// A dynamically typed result tuple.
///
/// Values are read with [`Row::get`], which converts the holder through the
/// requested type's [`TypeConversion`]. [`Row::move_as`] moves the value out
/// instead and resets the holder, which matters for large cells fetched
/// repeatedly into the same row.
#[derive(Debug, Default)]
pub struct Row {
    columns: Vec<ColumnProperties>,
    holders: Vec<Option<Value>>,
    indicators: Vec<Indicator>,
    index: HashMap<String, usize>,
    uppercase_names: bool,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes column names to upper case for lookup and in the reported
    /// properties. Must be set before the row is first bound.
    pub fn uppercase_column_names(&mut self, force_to_upper: bool) {
        self.uppercase_names = force_to_upper;
    }

    /// Number of columns. Zero until the row has been bound to an executed
    /// statement.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn properties(&self, position: usize) -> Result<&ColumnProperties, Error> {
        self.columns
            .get(position)
            .ok_or_else(|| out_of_range(position))
    }

    pub fn properties_named(&self, name: &str) -> Result<&ColumnProperties, Error> {
        self.properties(self.find_column(name)?)
    }

    pub fn indicator(&self, position: usize) -> Result<Indicator, Error> {
        self.indicators
            .get(position)
            .copied()
            .ok_or_else(|| out_of_range(position))
    }

    pub fn indicator_named(&self, name: &str) -> Result<Indicator, Error> {
        self.indicator(self.find_column(name)?)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_ok()
    }

    /// The value at `position`, converted into `T`. Reading a NULL cell into
    /// a type without a null representation is a type error; use `Option`
    /// or check [`Row::indicator`] first.
    pub fn get<T: TypeConversion>(&self, position: usize) -> Result<T, Error> {
        let holder = self
            .holders
            .get(position)
            .ok_or_else(|| out_of_range(position))?;
        match holder {
            None => {
                if T::NULLABLE {
                    T::null_value()
                } else {
                    Err(Error::null_not_allowed())
                }
            }
            Some(value) => {
                let base = T::Base::from_value(value.clone())?;
                T::from_base(base, self.indicators[position])
            }
        }
    }

    pub fn get_named<T: TypeConversion>(&self, name: &str) -> Result<T, Error> {
        self.get(self.find_column(name)?)
    }

    /// Like [`Row::get`], but moves the value out of the holder and resets
    /// it to empty, so subsequent fetches into this row can repopulate it.
    pub fn move_as<T: TypeConversion>(&mut self, position: usize) -> Result<T, Error> {
        let holder = self
            .holders
            .get_mut(position)
            .ok_or_else(|| out_of_range(position))?;
        match holder.take() {
            None => {
                if T::NULLABLE {
                    T::null_value()
                } else {
                    Err(Error::null_not_allowed())
                }
            }
            Some(value) => {
                let base = T::Base::from_value(value)?;
                T::from_base(base, self.indicators[position])
            }
        }
    }

    pub fn move_as_named<T: TypeConversion>(&mut self, name: &str) -> Result<T, Error> {
        self.move_as(self.find_column(name)?)
    }

    fn find_column(&self, name: &str) -> Result<usize, Error> {
        let key = if self.uppercase_names {
            name.to_uppercase()
        } else {
            name.to_string()
        };
        self.index
            .get(&key)
            .copied()
            .ok_or_else(|| Error::Usage(format!("Column '{name}' not found.")))
    }

    /// Drops all columns and holders so the row can be bound to another
    /// statement.
    pub(crate) fn clear(&mut self) {
        self.columns.clear();
        self.holders.clear();
        self.indicators.clear();
        self.index.clear();
    }

    pub(crate) fn add_column(&mut self, mut properties: ColumnProperties) {
        if self.uppercase_names {
            properties.name = properties.name.to_uppercase();
        }
        self.index
            .insert(properties.name.clone(), self.columns.len());
        self.columns.push(properties);
        self.holders.push(None);
        self.indicators.push(Indicator::Null);
    }

    pub(crate) fn set_cell(&mut self, position: usize, value: Option<Value>, status: Indicator) {
        self.holders[position] = value;
        self.indicators[position] = status;
    }
}

fn out_of_range(position: usize) -> Error {
    Error::Usage(format!("Column position {position} is out of range."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.add_column(ColumnProperties::new(
            "id".to_string(),
            DbType::I32,
            DbType::I32.data_kind(),
        ));
        row.add_column(ColumnProperties::new(
            "name".to_string(),
            DbType::Text,
            DbType::Text.data_kind(),
        ));
        row.set_cell(0, Some(Value::I64(7)), Indicator::Ok);
        row.set_cell(1, None, Indicator::Null);
        row
    }

    #[test]
    fn get_converts_through_the_base_type() {
        let row = sample_row();
        // The holder is widened to I64, the caller still reads an i32.
        assert_eq!(7_i32, row.get(0).unwrap());
    }

    #[test]
    fn null_needs_a_nullable_type() {
        let row = sample_row();
        assert!(row.get::<String>(1).is_err());
        assert_eq!(None, row.get::<Option<String>>(1).unwrap());
        assert_eq!(Indicator::Null, row.indicator(1).unwrap());
    }

    #[test]
    fn move_as_resets_the_holder() {
        let mut row = sample_row();
        assert_eq!(7_i64, row.move_as(0).unwrap());
        assert!(row.get::<Option<i64>>(0).unwrap().is_none());
    }

    #[test]
    fn lookup_by_name_respects_case_normalization() {
        let mut row = Row::new();
        row.uppercase_column_names(true);
        row.add_column(ColumnProperties::new(
            "id".to_string(),
            DbType::I32,
            DataKind::Integer,
        ));
        row.set_cell(0, Some(Value::I32(1)), Indicator::Ok);
        assert_eq!("ID", row.properties(0).unwrap().name());
        assert_eq!(1_i32, row.get_named("ID").unwrap());
    }

    #[test]
    fn out_of_range_access_is_a_usage_error() {
        let row = sample_row();
        assert!(matches!(row.get::<i32>(5), Err(Error::Usage(_))));
    }
}
