use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Pointer to a record of another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReference {
    pub entity: String,
    pub id: Uuid,
    /// Display name cached by the service, when it sent one.
    pub name: Option<String>,
}

impl EntityReference {
    pub fn new(entity: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity: entity.into(),
            id,
            name: None,
        }
    }
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Code of an option set plus its localized label, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    pub code: i32,
    pub label: Option<String>,
}

impl OptionValue {
    pub fn new(code: i32) -> Self {
        Self { code, label: None }
    }
    pub fn labeled(code: i32, label: impl Into<String>) -> Self {
        Self {
            code,
            label: Some(label.into()),
        }
    }
}

/// Strongly typed attribute value as exchanged with the remote service.
///
/// Every variant wraps an `Option` so that a cleared attribute still carries its type:
/// `Value::Varchar(None)` is an explicit null for a text attribute.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Money(Option<Decimal>),
    Varchar(Option<String>),
    Date(Option<Date>),
    Timestamp(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
    OptionSet(Option<OptionValue>),
    Reference(Option<EntityReference>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) | Value::Money(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::OptionSet(v) => v.is_none(),
            Value::Reference(v) => v.is_none(),
        }
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// The typed null of the same variant.
    pub fn as_null(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(..) => Value::Boolean(None),
            Value::Int32(..) => Value::Int32(None),
            Value::Int64(..) => Value::Int64(None),
            Value::Float64(..) => Value::Float64(None),
            Value::Decimal(..) => Value::Decimal(None),
            Value::Money(..) => Value::Money(None),
            Value::Varchar(..) => Value::Varchar(None),
            Value::Date(..) => Value::Date(None),
            Value::Timestamp(..) => Value::Timestamp(None),
            Value::Uuid(..) => Value::Uuid(None),
            Value::OptionSet(..) => Value::OptionSet(None),
            Value::Reference(..) => Value::Reference(None),
        }
    }

    /// Numeric view used when comparing values of different numeric variants.
    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int32(Some(v)) => Some(Decimal::from(*v)),
            Value::Int64(Some(v)) => Some(Decimal::from(*v)),
            Value::Float64(Some(v)) => Decimal::try_from(*v).ok(),
            Value::Decimal(Some(v)) | Value::Money(Some(v)) => Some(*v),
            Value::OptionSet(Some(v)) => Some(Decimal::from(v.code)),
            Value::Boolean(Some(v)) => Some(Decimal::from(*v as i32)),
            Value::Varchar(Some(v)) => v.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_identifier(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(Some(v)) => Some(*v),
            Value::Reference(Some(v)) => Some(v.id),
            Value::Varchar(Some(v)) => Uuid::parse_str(v.trim()).ok(),
            _ => None,
        }
    }

    /// Loose comparison across variants, `None` when the values are not comparable or
    /// either of them is null.
    ///
    /// Numbers compare by value whatever their width, option codes compare as integers,
    /// references compare by identifier and text is parsed when compared to a typed value.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::Varchar(Some(l)), Value::Varchar(Some(r))) => {
                Some(l.to_lowercase().cmp(&r.to_lowercase()))
            }
            (Value::Boolean(Some(l)), Value::Boolean(Some(r))) => Some(l.cmp(r)),
            (Value::Date(Some(l)), Value::Date(Some(r))) => Some(l.cmp(r)),
            (Value::Timestamp(Some(l)), Value::Timestamp(Some(r))) => Some(l.cmp(r)),
            (Value::Date(Some(l)), Value::Timestamp(Some(r))) => Some(l.cmp(&r.date())),
            (Value::Timestamp(Some(l)), Value::Date(Some(r))) => Some(l.date().cmp(r)),
            (Value::Date(Some(l)), Value::Varchar(Some(r))) => {
                crate::parse::parse_date(r).ok().map(|r| l.cmp(&r))
            }
            (Value::Varchar(Some(..)), Value::Date(Some(..))) => {
                other.compare(self).map(Ordering::reverse)
            }
            (Value::Timestamp(Some(l)), Value::Varchar(Some(r))) => {
                crate::parse::parse_timestamp(r).ok().map(|r| l.cmp(&r))
            }
            (Value::Varchar(Some(..)), Value::Timestamp(Some(..))) => {
                other.compare(self).map(Ordering::reverse)
            }
            (Value::OptionSet(Some(l)), Value::Varchar(Some(r)))
                if r.trim().parse::<i32>().is_err() =>
            {
                l.label
                    .as_ref()
                    .map(|label| label.to_lowercase().cmp(&r.to_lowercase()))
            }
            (Value::Varchar(Some(..)), Value::OptionSet(Some(..))) => {
                other.compare(self).map(Ordering::reverse)
            }
            _ => {
                if let (Some(l), Some(r)) = (self.as_identifier(), other.as_identifier()) {
                    return Some(l.cmp(&r));
                }
                if let (Some(l), Some(r)) = (self.as_decimal(), other.as_decimal()) {
                    return Some(l.cmp(&r));
                }
                None
            }
        }
    }

    /// Equality under [`Value::compare`], nulls are never equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_decimal().and_then(|v| v.to_f64())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            v if v.is_null() => f.write_str("null"),
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::Int32(Some(v)) => write!(f, "{v}"),
            Value::Int64(Some(v)) => write!(f, "{v}"),
            Value::Float64(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) | Value::Money(Some(v)) => write!(f, "{v}"),
            Value::Varchar(Some(v)) => f.write_str(v),
            Value::Date(Some(v)) => f.write_str(&crate::parse::format_date(v)),
            Value::Timestamp(Some(v)) => f.write_str(&crate::parse::format_timestamp(v)),
            Value::Uuid(Some(v)) => write!(f, "{v}"),
            Value::OptionSet(Some(v)) => write!(f, "{}", v.code),
            Value::Reference(Some(v)) => write!(f, "{}", v.id),
            _ => f.write_str("null"),
        }
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}
