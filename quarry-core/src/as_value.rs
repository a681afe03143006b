use crate::{EntityReference, Error, OptionValue, Result, Value, parse};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::any;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant for the type and, where it is
/// lossless, neighbouring variants (an `i64` can be read from `Value::Int32`, a `Uuid`
/// from a reference or from text).
///
/// ```rust
/// use quarry_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int32(Some(42)));
/// assert_eq!(i64::try_from_value(v).unwrap(), 42);
/// ```
pub trait AsValue {
    /// Typed null of this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {value:?} to {}",
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    $($pat_rest => $expr_rest,)*
                    #[allow(unreachable_patterns)]
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}

impl_as_value!(
    bool,
    Value::Boolean,
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
);
impl_as_value!(
    i32,
    Value::Int32,
    Value::OptionSet(Some(v)) => Ok(v.code),
    Value::Int64(Some(v)) => i32::try_from(v).map_err(|_| Error::msg(format!(
        "Value {v}: i64 is out of range for i32"
    ))),
);
impl_as_value!(
    i64,
    Value::Int64,
    Value::Int32(Some(v)) => Ok(v as i64),
    Value::OptionSet(Some(v)) => Ok(v.code as i64),
);
impl_as_value!(
    f64,
    Value::Float64,
    Value::Int32(Some(v)) => Ok(v as f64),
    Value::Int64(Some(v)) => Ok(v as f64),
    Value::Decimal(Some(v)) | Value::Money(Some(v)) => v
        .to_f64()
        .ok_or_else(|| Error::msg(format!("Value {v} does not fit a f64"))),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Money(Some(v)) => Ok(v),
    Value::Int32(Some(v)) => Ok(Decimal::from(v)),
    Value::Int64(Some(v)) => Ok(Decimal::from(v)),
);
impl_as_value!(
    String,
    Value::Varchar,
    Value::OptionSet(Some(OptionValue { label: Some(v), .. })) => Ok(v),
);
impl_as_value!(
    Date,
    Value::Date,
    Value::Timestamp(Some(v)) => Ok(v.date()),
    Value::Varchar(Some(v)) => parse::parse_date(&v),
);
impl_as_value!(
    OffsetDateTime,
    Value::Timestamp,
    Value::Varchar(Some(v)) => parse::parse_timestamp(&v),
);
impl_as_value!(
    Uuid,
    Value::Uuid,
    Value::Reference(Some(v)) => Ok(v.id),
    Value::Varchar(Some(v)) => Ok(Uuid::parse_str(&v)?),
);
impl_as_value!(
    OptionValue,
    Value::OptionSet,
    Value::Int32(Some(v)) => Ok(OptionValue::new(v)),
);
impl_as_value!(EntityReference, Value::Reference);

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(T::try_from_value(value)?))
        }
    }
}
