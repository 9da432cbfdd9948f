//! Mapping between host types and the closed exchange kind set.
//!
//! [`Exchangeable`] is implemented for exactly the base types backends can
//! move across the wire. [`TypeConversion`] is the extension point: any type
//! with a conversion to and from such a base type can be bound to a
//! statement or read from a [`crate::Row`].

use chrono::NaiveDateTime;
use widestring::U16String;

use crate::{
    error::Error,
    exchange::{ExchangeKind, LongText, Value, XmlValue},
    indicator::Indicator,
};

fn kind_mismatch(wanted: ExchangeKind, got: &Value) -> Error {
    Error::Conversion(format!(
        "Cannot convert a value of kind {:?} into {wanted:?}.",
        got.kind()
    ))
}

fn out_of_range(wanted: ExchangeKind, got: &dyn std::fmt::Display) -> Error {
    Error::Conversion(format!("Value {got} is out of range for {wanted:?}."))
}

mod sealed {
    pub trait Sealed {}
}

/// A base exchange type: one of the closed set of host representations the
/// backend binders understand. Sealed; new host types hook in through
/// [`TypeConversion`] instead.
pub trait Exchangeable: sealed::Sealed + Clone + Sized + 'static {
    /// The wire kind a binder is created with for this type.
    const KIND: ExchangeKind;

    fn into_value(self) -> Value;

    /// Recovers the host representation from a cell value. Numeric kinds
    /// accept any integer or floating point cell whose value is in range,
    /// since dynamically typed backends widen column types at will.
    fn from_value(value: Value) -> Result<Self, Error>;
}

macro_rules! impl_integer_exchangeable {
    ($t:ty, $kind:ident) => {
        impl sealed::Sealed for $t {}

        impl Exchangeable for $t {
            const KIND: ExchangeKind = ExchangeKind::$kind;

            fn into_value(self) -> Value {
                Value::$kind(self)
            }

            fn from_value(value: Value) -> Result<Self, Error> {
                match value {
                    Value::I8(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::U8(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::I16(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::U16(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::I32(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::U32(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::I64(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::U64(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    Value::RowId(v) => v.try_into().map_err(|_| out_of_range(Self::KIND, &v)),
                    other => Err(kind_mismatch(Self::KIND, &other)),
                }
            }
        }

        impl TypeConversion for $t {
            type Base = $t;

            fn from_base(base: $t, _ind: Indicator) -> Result<Self, Error> {
                Ok(base)
            }

            fn to_base(&self) -> Result<Option<$t>, Error> {
                Ok(Some(*self))
            }
        }
    };
}

impl_integer_exchangeable!(i8, I8);
impl_integer_exchangeable!(u8, U8);
impl_integer_exchangeable!(i16, I16);
impl_integer_exchangeable!(u16, U16);
impl_integer_exchangeable!(i32, I32);
impl_integer_exchangeable!(u32, U32);
impl_integer_exchangeable!(i64, I64);
impl_integer_exchangeable!(u64, U64);

macro_rules! impl_identity_conversion {
    ($t:ty) => {
        impl TypeConversion for $t {
            type Base = $t;

            fn from_base(base: $t, _ind: Indicator) -> Result<Self, Error> {
                Ok(base)
            }

            fn to_base(&self) -> Result<Option<$t>, Error> {
                Ok(Some(self.clone()))
            }
        }
    };
}

impl sealed::Sealed for f64 {}

impl Exchangeable for f64 {
    const KIND: ExchangeKind = ExchangeKind::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Double(v) => Ok(v),
            Value::I8(v) => Ok(v.into()),
            Value::U8(v) => Ok(v.into()),
            Value::I16(v) => Ok(v.into()),
            Value::U16(v) => Ok(v.into()),
            Value::I32(v) => Ok(v.into()),
            Value::U32(v) => Ok(v.into()),
            Value::I64(v) => Ok(v as f64),
            Value::U64(v) => Ok(v as f64),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(f64);

impl sealed::Sealed for char {}

impl Exchangeable for char {
    const KIND: ExchangeKind = ExchangeKind::Char;

    fn into_value(self) -> Value {
        Value::Char(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Char(c) => Ok(c),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(char);

impl sealed::Sealed for String {}

impl Exchangeable for String {
    const KIND: ExchangeKind = ExchangeKind::Text;

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Text(s) | Value::LongText(s) | Value::Xml(s) => Ok(s),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(String);

impl sealed::Sealed for U16String {}

impl Exchangeable for U16String {
    const KIND: ExchangeKind = ExchangeKind::WideText;

    fn into_value(self) -> Value {
        Value::WideText(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::WideText(s) => Ok(s),
            Value::Text(s) => Ok(U16String::from_str(&s)),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(U16String);

impl sealed::Sealed for NaiveDateTime {}

impl Exchangeable for NaiveDateTime {
    const KIND: ExchangeKind = ExchangeKind::Timestamp;

    fn into_value(self) -> Value {
        Value::Timestamp(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Timestamp(t) => Ok(t),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(NaiveDateTime);

impl sealed::Sealed for Vec<u8> {}

impl Exchangeable for Vec<u8> {
    const KIND: ExchangeKind = ExchangeKind::Blob;

    fn into_value(self) -> Value {
        Value::Blob(self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Blob(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(Vec<u8>);

impl sealed::Sealed for XmlValue {}

impl Exchangeable for XmlValue {
    const KIND: ExchangeKind = ExchangeKind::Xml;

    fn into_value(self) -> Value {
        Value::Xml(self.value)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Xml(value) | Value::Text(value) => Ok(XmlValue { value }),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(XmlValue);

impl sealed::Sealed for LongText {}

impl Exchangeable for LongText {
    const KIND: ExchangeKind = ExchangeKind::LongText;

    fn into_value(self) -> Value {
        Value::LongText(self.value)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::LongText(value) | Value::Text(value) => Ok(LongText { value }),
            other => Err(kind_mismatch(Self::KIND, &other)),
        }
    }
}

impl_identity_conversion!(LongText);

/// Maps a host type onto a base exchange type.
///
/// This is the user extension point of the type system: implement it to bind
/// your own types to statements and read them out of rows. The base value is
/// taken by move in [`TypeConversion::from_base`], which also covers the move
/// semantics of [`crate::Row::move_as`].
///
/// ```
/// use sqlbind::{Error, Indicator, TypeConversion};
///
/// /// Stored in the database as the string "on" or "off".
/// #[derive(Debug, PartialEq)]
/// struct Switch(bool);
///
/// impl TypeConversion for Switch {
///     type Base = String;
///
///     fn from_base(base: String, _ind: Indicator) -> Result<Self, Error> {
///         match base.as_str() {
///             "on" => Ok(Switch(true)),
///             "off" => Ok(Switch(false)),
///             other => Err(Error::Conversion(format!("Not a switch: {other}"))),
///         }
///     }
///
///     fn to_base(&self) -> Result<Option<String>, Error> {
///         Ok(Some(if self.0 { "on" } else { "off" }.to_string()))
///     }
/// }
/// ```
pub trait TypeConversion: Sized {
    /// The base exchange type this type converts to and from.
    type Base: Exchangeable;

    /// Whether SQL NULL is representable by the type itself, without an
    /// explicit indicator. `Option<T>` is the canonical nullable type.
    const NULLABLE: bool = false;

    /// Converts a fetched base value into the host type. `ind` is
    /// [`Indicator::Truncated`] if the driver had to cut the value short,
    /// [`Indicator::Ok`] otherwise.
    fn from_base(base: Self::Base, ind: Indicator) -> Result<Self, Error>;

    /// The value representing SQL NULL. Only called when
    /// [`Self::NULLABLE`] is `true`.
    fn null_value() -> Result<Self, Error> {
        Err(Error::null_not_allowed())
    }

    /// Converts the host value into its base representation for binding.
    /// `Ok(None)` binds SQL NULL.
    fn to_base(&self) -> Result<Option<Self::Base>, Error>;
}

impl<T: TypeConversion> TypeConversion for Option<T> {
    type Base = T::Base;

    const NULLABLE: bool = true;

    fn from_base(base: Self::Base, ind: Indicator) -> Result<Self, Error> {
        Ok(Some(T::from_base(base, ind)?))
    }

    fn null_value() -> Result<Self, Error> {
        Ok(None)
    }

    fn to_base(&self) -> Result<Option<Self::Base>, Error> {
        match self {
            Some(value) => value.to_base(),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widening_is_accepted() {
        assert_eq!(42_i32, i32::from_value(Value::I64(42)).unwrap());
        assert_eq!(42_i64, i64::from_value(Value::I16(42)).unwrap());
    }

    #[test]
    fn integer_narrowing_is_range_checked() {
        assert!(i8::from_value(Value::I64(1000)).is_err());
        assert!(u32::from_value(Value::I32(-1)).is_err());
    }

    #[test]
    fn text_does_not_convert_to_numbers() {
        assert!(i32::from_value(Value::Text("42".to_string())).is_err());
    }

    #[test]
    fn option_binds_null() {
        let value: Option<i32> = None;
        assert_eq!(None, value.to_base().unwrap());
        let value = Some(7_i32);
        assert_eq!(Some(7), value.to_base().unwrap());
    }

    #[test]
    fn option_represents_null() {
        assert_eq!(None, Option::<i32>::null_value().unwrap());
        assert!(i32::null_value().is_err());
    }
}
