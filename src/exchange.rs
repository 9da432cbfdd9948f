use std::fmt;

use chrono::NaiveDateTime;
use widestring::U16String;

/// Exchange format of a bound variable, as seen by the binders.
///
/// This is the closed set of wire kinds the engine understands. Every host
/// type maps onto exactly one of these through its
/// [`crate::TypeConversion::Base`] type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Char,
    Text,
    WideText,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Double,
    Timestamp,
    /// A nested statement, e.g. a ref cursor. Only some backends support it.
    Statement,
    RowId,
    Blob,
    Xml,
    LongText,
}

/// Column type as reported by describing a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Text,
    WideText,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Double,
    Date,
    Blob,
    Xml,
}

/// Coarse column type, predating [`DbType`]. Kept because a lot of calling
/// code still dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Text,
    Date,
    Double,
    Integer,
    BigInt,
    UnsignedBigInt,
    Blob,
    Xml,
}

impl DbType {
    /// Exchange kind used when the engine itself picks the host
    /// representation for a column of this type, e.g. for dynamic rows.
    pub fn exchange_kind(self) -> ExchangeKind {
        match self {
            DbType::Text => ExchangeKind::Text,
            DbType::WideText => ExchangeKind::WideText,
            DbType::I8 => ExchangeKind::I8,
            DbType::U8 => ExchangeKind::U8,
            DbType::I16 => ExchangeKind::I16,
            DbType::U16 => ExchangeKind::U16,
            DbType::I32 => ExchangeKind::I32,
            DbType::U32 => ExchangeKind::U32,
            DbType::I64 => ExchangeKind::I64,
            DbType::U64 => ExchangeKind::U64,
            DbType::Double => ExchangeKind::Double,
            DbType::Date => ExchangeKind::Timestamp,
            DbType::Blob => ExchangeKind::Blob,
            DbType::Xml => ExchangeKind::Xml,
        }
    }

    /// Default projection onto the coarse kind set. Backends may deviate via
    /// [`crate::backend::StatementBackend::to_data_kind`] where they mapped a
    /// type differently before [`DbType`] existed.
    pub fn data_kind(self) -> DataKind {
        match self {
            DbType::Text | DbType::WideText => DataKind::Text,
            DbType::Date => DataKind::Date,
            DbType::Double => DataKind::Double,
            DbType::I8 | DbType::U8 | DbType::I16 | DbType::U16 | DbType::I32 => DataKind::Integer,
            DbType::U32 | DbType::I64 => DataKind::BigInt,
            DbType::U64 => DataKind::UnsignedBigInt,
            DbType::Blob => DataKind::Blob,
            DbType::Xml => DataKind::Xml,
        }
    }
}

impl DataKind {
    /// Lossless projection onto the fine kind set.
    pub fn db_type(self) -> DbType {
        match self {
            DataKind::Text => DbType::Text,
            DataKind::Date => DbType::Date,
            DataKind::Double => DbType::Double,
            DataKind::Integer => DbType::I32,
            DataKind::BigInt => DbType::I64,
            DataKind::UnsignedBigInt => DbType::U64,
            DataKind::Blob => DbType::Blob,
            DataKind::Xml => DbType::Xml,
        }
    }
}

/// One value of one exchange kind.
///
/// Used to move cell data between the engine and the backend binders, and as
/// the holder slot of a dynamic [`crate::Row`]. The `Statement` exchange kind
/// has no value representation; backends which support nested statements
/// exchange them through their own handles.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(char),
    Text(String),
    WideText(U16String),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Double(f64),
    Timestamp(NaiveDateTime),
    RowId(i64),
    Blob(Vec<u8>),
    Xml(String),
    LongText(String),
}

impl Value {
    pub fn kind(&self) -> ExchangeKind {
        match self {
            Value::Char(_) => ExchangeKind::Char,
            Value::Text(_) => ExchangeKind::Text,
            Value::WideText(_) => ExchangeKind::WideText,
            Value::I8(_) => ExchangeKind::I8,
            Value::U8(_) => ExchangeKind::U8,
            Value::I16(_) => ExchangeKind::I16,
            Value::U16(_) => ExchangeKind::U16,
            Value::I32(_) => ExchangeKind::I32,
            Value::U32(_) => ExchangeKind::U32,
            Value::I64(_) => ExchangeKind::I64,
            Value::U64(_) => ExchangeKind::U64,
            Value::Double(_) => ExchangeKind::Double,
            Value::Timestamp(_) => ExchangeKind::Timestamp,
            Value::RowId(_) => ExchangeKind::RowId,
            Value::Blob(_) => ExchangeKind::Blob,
            Value::Xml(_) => ExchangeKind::Xml,
            Value::LongText(_) => ExchangeKind::LongText,
        }
    }
}

/// Renders the value for diagnostics, e.g. when dumping the parameters of a
/// failed statement. Opaque kinds render as a placeholder.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::WideText(s) => write!(f, "\"{}\"", s.to_string_lossy()),
            Value::I8(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::U16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            Value::RowId(_) => write!(f, "<rowid>"),
            Value::Blob(_) => write!(f, "<blob>"),
            Value::Xml(_) => write!(f, "<xml>"),
            Value::LongText(_) => write!(f, "<long text>"),
        }
    }
}

/// Host representation of an XML column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlValue {
    pub value: String,
}

/// Host representation of an unbounded text column, where the backend
/// distinguishes it from ordinary character data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LongText {
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Coarse tags survive the round trip through the fine tag set.
    #[test]
    fn coarse_projection_is_lossless() {
        let all = [
            DataKind::Text,
            DataKind::Date,
            DataKind::Double,
            DataKind::Integer,
            DataKind::BigInt,
            DataKind::UnsignedBigInt,
            DataKind::Blob,
            DataKind::Xml,
        ];
        for kind in all {
            assert_eq!(kind, kind.db_type().data_kind());
        }
    }

    #[test]
    fn values_know_their_kind() {
        assert_eq!(ExchangeKind::I32, Value::I32(42).kind());
        assert_eq!(ExchangeKind::Blob, Value::Blob(vec![1, 2]).kind());
    }
}
