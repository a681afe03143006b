use crate::{
    AttributeMetadata, AttributeType, ColumnFormat, DateTimeBehavior, EntityReference, Error,
    LooseValue, OptionValue, QuarryError, Result, Value, parse, truncate_long,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::{Number, json};
use std::str::FromStr;
use uuid::Uuid;

/// Keys recognized as the identifier of a reference-like object.
pub const REFERENCE_ID_KEYS: [&str; 1] = ["Id"];
/// Keys recognized as the table name of a reference-like object.
pub const REFERENCE_TABLE_KEYS: [&str; 3] = ["TableName", "LogicalName", "EntityName"];
/// Key carrying the display name of a reference-like object.
pub const REFERENCE_NAME_KEY: &str = "Name";

fn mismatch(attribute: &AttributeMetadata, value: impl std::fmt::Display) -> Error {
    Error::new(QuarryError::type_mismatch(
        attribute.name(),
        format!(
            "cannot convert `{}` to {:?}",
            truncate_long!(value.to_string()),
            attribute.attribute_type
        ),
    ))
}

fn json_key<'a>(
    map: &'a serde_json::Map<String, serde_json::Value>,
    keys: &[&str],
) -> Option<&'a serde_json::Value> {
    map.iter()
        .find(|(k, _)| keys.iter().any(|key| k.eq_ignore_ascii_case(key)))
        .map(|(_, v)| v)
        .filter(|v| !v.is_null())
}

fn json_decimal(number: &Number) -> Option<Decimal> {
    if let Some(v) = number.as_i64() {
        return Some(Decimal::from(v));
    }
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// A JSON number when an `f64` holds `value` exactly, its decimal text otherwise.
fn json_number(value: Decimal) -> serde_json::Value {
    if value.fract().is_zero() {
        if let Some(v) = value.to_i64() {
            return json!(v);
        }
    }
    let exact = value.to_f64().filter(|v| {
        let text = ryu::Buffer::new().format(*v).to_owned();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .is_ok_and(|v| v == value)
    });
    match exact.and_then(Number::from_f64) {
        Some(v) => serde_json::Value::Number(v),
        None => serde_json::Value::String(value.to_string()),
    }
}

fn json_integer(attribute: &AttributeMetadata, value: &serde_json::Value) -> Result<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .ok_or_else(|| mismatch(attribute, n)),
        serde_json::Value::String(v) => v.trim().parse().map_err(|_| mismatch(attribute, v)),
        serde_json::Value::Bool(v) => Ok(*v as i64),
        other => Err(mismatch(attribute, other)),
    }
}

/// Build a reference from a loose object carrying an identifier and a table name.
///
/// The table name may be omitted when the attribute has a single target.
pub fn reference_from_json(
    attribute: Option<&AttributeMetadata>,
    value: &serde_json::Value,
) -> Result<EntityReference> {
    let single_target = attribute
        .filter(|v| v.targets.len() == 1)
        .map(|v| v.targets[0].clone());
    let name = attribute.map(|v| v.name()).unwrap_or("reference");
    match value {
        serde_json::Value::String(v) => {
            let id = Uuid::parse_str(v.trim()).map_err(|_| {
                Error::new(QuarryError::Format(format!(
                    "`{}` is not an identifier, cannot build a reference for `{name}`",
                    truncate_long!(v)
                )))
            })?;
            let entity = single_target.ok_or_else(|| {
                Error::new(QuarryError::Format(format!(
                    "`{name}` can point to several tables, a raw identifier is not enough, pass an object with {} and one of {}",
                    REFERENCE_ID_KEYS.join("/"),
                    REFERENCE_TABLE_KEYS.join("/"),
                )))
            })?;
            Ok(EntityReference::new(entity, id))
        }
        serde_json::Value::Object(map) => {
            let id = json_key(map, &REFERENCE_ID_KEYS);
            let table = json_key(map, &REFERENCE_TABLE_KEYS).and_then(|v| v.as_str());
            let Some(id) = id else {
                return Err(Error::new(QuarryError::Format(format!(
                    "The value for `{name}` has no {} key: `{}`",
                    REFERENCE_ID_KEYS.join("/"),
                    truncate_long!(value.to_string())
                ))));
            };
            let id = id
                .as_str()
                .and_then(|v| Uuid::parse_str(v.trim()).ok())
                .ok_or_else(|| {
                    Error::new(QuarryError::Format(format!(
                        "`{id}` is not a valid identifier for `{name}`"
                    )))
                })?;
            let entity = table.map(str::to_owned).or(single_target).ok_or_else(|| {
                Error::new(QuarryError::Format(format!(
                    "The value for `{name}` has none of the keys {}: `{}`",
                    REFERENCE_TABLE_KEYS.join("/"),
                    truncate_long!(value.to_string())
                )))
            })?;
            let mut reference = EntityReference::new(entity, id);
            reference.name = json_key(map, &[REFERENCE_NAME_KEY])
                .and_then(|v| v.as_str())
                .map(str::to_owned);
            Ok(reference)
        }
        other => Err(Error::new(QuarryError::Format(format!(
            "Cannot build a reference for `{name}` from `{}`",
            truncate_long!(other.to_string())
        )))),
    }
}

fn check_target(attribute: &AttributeMetadata, reference: EntityReference) -> Result<Value> {
    if !attribute.targets.is_empty()
        && !attribute
            .targets
            .iter()
            .any(|v| v.eq_ignore_ascii_case(&reference.entity))
    {
        return Err(Error::new(QuarryError::type_mismatch(
            attribute.name(),
            format!(
                "`{}` is not one of the targets [{}]",
                reference.entity,
                attribute.targets.join(", ")
            ),
        )));
    }
    Ok(Value::Reference(Some(reference)))
}

fn option_from_code(attribute: &AttributeMetadata, code: i64) -> Result<Value> {
    let code = i32::try_from(code).map_err(|_| mismatch(attribute, code))?;
    if attribute.options.is_empty() {
        return Ok(Value::OptionSet(Some(OptionValue::new(code))));
    }
    match attribute.option_label(code) {
        Some(label) => Ok(Value::OptionSet(Some(OptionValue::labeled(code, label)))),
        None => Err(Error::new(QuarryError::type_mismatch(
            attribute.name(),
            format!("{code} is not a valid option"),
        ))),
    }
}

fn native_to_native(attribute: &AttributeMetadata, value: &Value) -> Result<Value> {
    let expected = attribute.attribute_type.empty_value();
    if value.is_null() {
        return Ok(expected);
    }
    match (attribute.attribute_type, value) {
        (_, v) if v.same_type(&expected) => match v {
            Value::Reference(Some(r)) => check_target(attribute, r.clone()),
            Value::OptionSet(Some(o)) => option_from_code(attribute, o.code as i64),
            _ => Ok(v.clone()),
        },
        (t, Value::Uuid(Some(id))) if t.is_lookup() => {
            reference_from_json(Some(attribute), &json!(id.to_string()))
                .and_then(|r| check_target(attribute, r))
        }
        (AttributeType::DateTime, Value::Date(Some(v))) => {
            if attribute.date_time_behavior == DateTimeBehavior::DateOnly {
                Ok(Value::Date(Some(*v)))
            } else {
                Ok(Value::Timestamp(Some(v.midnight().assume_utc())))
            }
        }
        _ => to_native(&LooseValue::Json(to_loose_untyped(value)), attribute),
    }
}

/// Convert a loose value to the typed value the service expects for `attribute`.
pub fn to_native(value: &LooseValue, attribute: &AttributeMetadata) -> Result<Value> {
    let value = match value {
        LooseValue::Native(v) => return native_to_native(attribute, v),
        LooseValue::Json(v) => v,
    };
    if value.is_null() {
        return Ok(attribute.attribute_type.empty_value());
    }
    if matches!(value, serde_json::Value::Array(..)) {
        return Err(mismatch(attribute, value));
    }
    let result = match attribute.attribute_type {
        AttributeType::String | AttributeType::Memo => match value {
            serde_json::Value::String(v) => Value::Varchar(Some(v.clone())),
            serde_json::Value::Number(v) => Value::Varchar(Some(v.to_string())),
            serde_json::Value::Bool(v) => Value::Varchar(Some(v.to_string())),
            other => return Err(mismatch(attribute, other)),
        },
        AttributeType::Integer => {
            let v = json_integer(attribute, value)?;
            Value::Int32(Some(i32::try_from(v).map_err(|_| mismatch(attribute, v))?))
        }
        AttributeType::BigInt => Value::Int64(Some(json_integer(attribute, value)?)),
        AttributeType::Double => match value {
            serde_json::Value::Number(v) => Value::Float64(v.as_f64()),
            serde_json::Value::String(v) => {
                Value::Float64(Some(v.trim().parse().map_err(|_| mismatch(attribute, v))?))
            }
            other => return Err(mismatch(attribute, other)),
        },
        AttributeType::Decimal | AttributeType::Money => {
            let v = match value {
                serde_json::Value::Number(v) => {
                    json_decimal(v).ok_or_else(|| mismatch(attribute, v))?
                }
                serde_json::Value::String(v) => {
                    Decimal::from_str(v.trim()).map_err(|_| mismatch(attribute, v))?
                }
                other => return Err(mismatch(attribute, other)),
            };
            let v = match attribute.precision {
                Some(precision) => v.round_dp(precision),
                None => v,
            };
            if attribute.attribute_type == AttributeType::Money {
                Value::Money(Some(v))
            } else {
                Value::Decimal(Some(v))
            }
        }
        AttributeType::Boolean => match value {
            serde_json::Value::Bool(v) => Value::Boolean(Some(*v)),
            serde_json::Value::Number(..) => {
                Value::Boolean(Some(json_integer(attribute, value)? != 0))
            }
            serde_json::Value::String(v) => match v.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Value::Boolean(Some(true)),
                "false" | "no" | "0" => Value::Boolean(Some(false)),
                label => match attribute.option_code(label) {
                    Some(code) => Value::Boolean(Some(code != 0)),
                    None => return Err(mismatch(attribute, v)),
                },
            },
            other => return Err(mismatch(attribute, other)),
        },
        AttributeType::DateTime => {
            let serde_json::Value::String(v) = value else {
                return Err(mismatch(attribute, value));
            };
            if attribute.date_time_behavior == DateTimeBehavior::DateOnly {
                Value::Date(Some(parse::parse_date(v).map_err(|e| {
                    e.context(QuarryError::type_mismatch(attribute.name(), "not a date"))
                })?))
            } else {
                Value::Timestamp(Some(parse::parse_timestamp(v).map_err(|e| {
                    e.context(QuarryError::type_mismatch(attribute.name(), "not a date-time"))
                })?))
            }
        }
        AttributeType::Picklist | AttributeType::State | AttributeType::Status => match value {
            serde_json::Value::String(v) if v.trim().parse::<i64>().is_err() => {
                match attribute.option_code(v.trim()) {
                    Some(code) => option_from_code(attribute, code as i64)?,
                    None => return Err(mismatch(attribute, v)),
                }
            }
            serde_json::Value::Object(map) => match json_key(map, &["Value", "Code"]) {
                Some(code) => option_from_code(attribute, json_integer(attribute, code)?)?,
                None => return Err(mismatch(attribute, value)),
            },
            _ => option_from_code(attribute, json_integer(attribute, value)?)?,
        },
        AttributeType::Lookup | AttributeType::Customer | AttributeType::Owner => {
            check_target(attribute, reference_from_json(Some(attribute), value)?)?
        }
        AttributeType::Uniqueidentifier => match value {
            serde_json::Value::String(v) => Value::Uuid(Some(
                Uuid::parse_str(v.trim()).map_err(|_| {
                    Error::new(QuarryError::Format(format!(
                        "`{}` is not a valid identifier for `{}`",
                        truncate_long!(v),
                        attribute.name()
                    )))
                })?,
            )),
            other => return Err(mismatch(attribute, other)),
        },
    };
    Ok(result)
}

/// Best effort conversion of a loose value when no metadata is known.
pub fn to_native_untyped(value: &LooseValue) -> Result<Value> {
    let value = match value {
        LooseValue::Native(v) => return Ok(v.clone()),
        LooseValue::Json(v) => v,
    };
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Boolean(Some(*v)),
        serde_json::Value::Number(v) => {
            if let Some(v) = v.as_i64() {
                match i32::try_from(v) {
                    Ok(v) => Value::Int32(Some(v)),
                    Err(..) => Value::Int64(Some(v)),
                }
            } else {
                Value::Float64(v.as_f64())
            }
        }
        serde_json::Value::String(v) => Value::Varchar(Some(v.clone())),
        serde_json::Value::Object(..) => {
            Value::Reference(Some(reference_from_json(None, value)?))
        }
        serde_json::Value::Array(..) => {
            return Err(Error::new(QuarryError::type_mismatch(
                "value",
                format!(
                    "cannot use the list `{}` as a single value",
                    truncate_long!(value.to_string())
                ),
            )));
        }
    })
}

pub fn reference_to_json(reference: &EntityReference) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(REFERENCE_ID_KEYS[0].into(), json!(reference.id.to_string()));
    map.insert(REFERENCE_TABLE_KEYS[0].into(), json!(reference.entity));
    if let Some(name) = &reference.name {
        map.insert(REFERENCE_NAME_KEY.into(), json!(name));
    }
    serde_json::Value::Object(map)
}

/// Default loose rendering of a value, used when no metadata is available.
pub fn to_loose_untyped(value: &Value) -> serde_json::Value {
    match value {
        v if v.is_null() => serde_json::Value::Null,
        Value::Boolean(Some(v)) => json!(v),
        Value::Int32(Some(v)) => json!(v),
        Value::Int64(Some(v)) => json!(v),
        Value::Float64(Some(v)) => Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Decimal(Some(v)) | Value::Money(Some(v)) => json_number(*v),
        Value::Varchar(Some(v)) => json!(v),
        Value::Date(Some(v)) => json!(parse::format_date(v)),
        Value::Timestamp(Some(v)) => json!(parse::format_timestamp(v)),
        Value::Uuid(Some(v)) => json!(v.to_string()),
        Value::OptionSet(Some(v)) => json!(v.code),
        Value::Reference(Some(v)) => reference_to_json(v),
        _ => serde_json::Value::Null,
    }
}

fn group_thousands(integral: &str) -> String {
    let (sign, digits) = match integral.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integral),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push_str(sign);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_grouped(text: &str) -> String {
    match text.split_once('.') {
        Some((integral, fraction)) => format!("{}.{}", group_thousands(integral), fraction),
        None => group_thousands(text),
    }
}

fn display_value(attribute: &AttributeMetadata, value: &Value) -> Result<serde_json::Value> {
    let unsupported = || {
        Error::new(QuarryError::UnsupportedFormat {
            attribute: attribute.name().to_owned(),
            format: ColumnFormat::Display.to_string(),
        })
    };
    let text = match value {
        Value::OptionSet(Some(v)) => v
            .label
            .clone()
            .or_else(|| attribute.option_label(v.code).map(str::to_owned))
            .unwrap_or_else(|| v.code.to_string()),
        Value::Boolean(Some(v)) => attribute
            .option_label(*v as i32)
            .map(str::to_owned)
            .unwrap_or_else(|| if *v { "Yes" } else { "No" }.to_owned()),
        Value::Int32(Some(v)) => group_thousands(itoa::Buffer::new().format(*v)),
        Value::Int64(Some(v)) => group_thousands(itoa::Buffer::new().format(*v)),
        Value::Float64(Some(v)) => format_grouped(&v.to_string()),
        Value::Decimal(Some(v)) | Value::Money(Some(v)) => {
            let precision = attribute.precision.unwrap_or(v.scale()) as usize;
            format_grouped(&format!("{:.precision$}", v))
        }
        Value::Date(Some(v)) => parse::format_date(v),
        Value::Timestamp(Some(v)) => {
            if attribute.date_time_behavior == DateTimeBehavior::DateOnly {
                parse::format_date(&v.date())
            } else {
                parse::format_timestamp_display(v)
            }
        }
        Value::Reference(Some(v)) => v.name.clone().unwrap_or_else(|| v.id.to_string()),
        _ => return Err(unsupported()),
    };
    Ok(json!(text))
}

/// Convert a typed value read from the service to its loose rendering in `format`.
///
/// - `Default` keeps the natural shape: option codes as integers, references as objects.
/// - `Raw` yields the underlying scalar: option codes, reference identifiers.
/// - `Display` yields labels and formatted text, and is lossy.
pub fn from_native(
    value: &Value,
    attribute: &AttributeMetadata,
    format: ColumnFormat,
) -> Result<serde_json::Value> {
    match format {
        ColumnFormat::Display => {
            if matches!(
                attribute.attribute_type,
                AttributeType::String | AttributeType::Memo | AttributeType::Uniqueidentifier
            ) {
                return Err(Error::new(QuarryError::UnsupportedFormat {
                    attribute: attribute.name().to_owned(),
                    format: format.to_string(),
                }));
            }
            if value.is_null() {
                return Ok(serde_json::Value::Null);
            }
            display_value(attribute, value)
        }
        ColumnFormat::Raw => Ok(match value {
            Value::Reference(Some(v)) => json!(v.id.to_string()),
            v => to_loose_untyped(v),
        }),
        ColumnFormat::Default => Ok(to_loose_untyped(value)),
    }
}
