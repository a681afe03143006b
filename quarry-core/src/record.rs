use crate::{AsValue, Error, Result, Value, convert};
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Loose output/input map, the shape callers exchange with the pipeline and the reader.
pub type LooseMap = serde_json::Map<String, serde_json::Value>;

/// Key carrying the identity of a record in loose maps.
pub const ID_KEY: &str = "Id";
/// Key carrying the entity name of a record in loose maps.
pub const TABLE_NAME_KEY: &str = "TableName";

/// Ordered attribute values of one entity record, plus its identity once persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub entity: String,
    pub id: Option<Uuid>,
    pub attributes: IndexMap<String, Value>,
}

impl Record {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Default::default()
        }
    }
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
    /// Typed read of an attribute, a missing attribute reads as null.
    pub fn get_as<T: AsValue>(&self, name: &str) -> Result<T> {
        T::try_from_value(self.get(name).cloned().unwrap_or_default())
            .map_err(|e| e.context(format!("While reading `{}.{}`", self.entity, name)))
    }
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)?;
        if let Some(id) = self.id {
            write!(f, "({id})")?;
        }
        f.write_str(" {")?;
        for (i, (k, v)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {k}: {v}")?;
        }
        f.write_str(" }")
    }
}

/// A value on the loose input surface: either caller data or an already typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum LooseValue {
    Json(serde_json::Value),
    Native(Value),
}

impl LooseValue {
    pub fn is_null(&self) -> bool {
        match self {
            LooseValue::Json(v) => v.is_null(),
            LooseValue::Native(v) => v.is_null(),
        }
    }
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LooseValue::Json(v) => v.clone(),
            LooseValue::Native(v) => convert::to_loose_untyped(v),
        }
    }
}

impl From<serde_json::Value> for LooseValue {
    fn from(value: serde_json::Value) -> Self {
        LooseValue::Json(value)
    }
}

impl From<Value> for LooseValue {
    fn from(value: Value) -> Self {
        LooseValue::Native(value)
    }
}

/// One record on the caller's input stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRecord {
    pub values: IndexMap<String, LooseValue>,
}

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }
    /// Build from a JSON object, anything else is a format error.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into()),
            other => Err(Error::new(crate::QuarryError::Format(format!(
                "Expected an object as input record, found `{other}`"
            )))),
        }
    }
    pub fn with(mut self, name: impl Into<String>, value: impl Into<LooseValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
    pub fn get(&self, name: &str) -> Option<&LooseValue> {
        self.values.get(name).or_else(|| {
            self.values
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }
    pub fn to_json(&self) -> LooseMap {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl From<LooseMap> for InputRecord {
    fn from(value: LooseMap) -> Self {
        Self {
            values: value
                .into_iter()
                .map(|(k, v)| (k, LooseValue::Json(v)))
                .collect(),
        }
    }
}

impl Display for InputRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::Object(self.to_json()))
    }
}
