use crate::{OptionValue, Value};
use std::{collections::HashMap, sync::Arc};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Memo,
    Integer,
    BigInt,
    Double,
    Decimal,
    Money,
    Boolean,
    DateTime,
    Picklist,
    State,
    Status,
    Lookup,
    Customer,
    Owner,
    Uniqueidentifier,
}

impl AttributeType {
    /// Typed null used when clearing an attribute of this type.
    pub fn empty_value(&self) -> Value {
        match self {
            AttributeType::String | AttributeType::Memo => Value::Varchar(None),
            AttributeType::Integer => Value::Int32(None),
            AttributeType::BigInt => Value::Int64(None),
            AttributeType::Double => Value::Float64(None),
            AttributeType::Decimal => Value::Decimal(None),
            AttributeType::Money => Value::Money(None),
            AttributeType::Boolean => Value::Boolean(None),
            AttributeType::DateTime => Value::Timestamp(None),
            AttributeType::Picklist | AttributeType::State | AttributeType::Status => {
                Value::OptionSet(None)
            }
            AttributeType::Lookup | AttributeType::Customer | AttributeType::Owner => {
                Value::Reference(None)
            }
            AttributeType::Uniqueidentifier => Value::Uuid(None),
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            AttributeType::Lookup | AttributeType::Customer | AttributeType::Owner
        )
    }

    pub fn is_option_set(&self) -> bool {
        matches!(
            self,
            AttributeType::Picklist | AttributeType::State | AttributeType::Status
        )
    }
}

/// How a date-time attribute stores its value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeBehavior {
    /// Point in time, normalized to UTC by the service.
    #[default]
    UserLocal,
    /// Calendar date without a time of day, never shifted across time zones.
    DateOnly,
    /// Date and time stored as given.
    TimeZoneIndependent,
}

/// Declarative description of an entity attribute.
#[derive(Debug, Clone)]
pub struct AttributeMetadata {
    pub logical_name: String,
    pub attribute_type: AttributeType,
    /// Entities a lookup may point to.
    pub targets: Vec<String>,
    /// Options of option sets, or the false/true labels of a boolean.
    pub options: Vec<OptionValue>,
    /// Decimal places kept by decimal and money attributes.
    pub precision: Option<u32>,
    pub date_time_behavior: DateTimeBehavior,
    pub valid_for_create: bool,
    pub valid_for_update: bool,
    pub valid_for_read: bool,
}

impl AttributeMetadata {
    pub fn new(logical_name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            logical_name: logical_name.into(),
            attribute_type,
            targets: Vec::new(),
            options: Vec::new(),
            precision: match attribute_type {
                AttributeType::Money => Some(2),
                _ => None,
            },
            date_time_behavior: DateTimeBehavior::default(),
            valid_for_create: true,
            valid_for_update: true,
            valid_for_read: true,
        }
    }
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|(code, label)| OptionValue::labeled(code, label))
            .collect();
        self
    }
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }
    pub fn date_only(mut self) -> Self {
        self.date_time_behavior = DateTimeBehavior::DateOnly;
        self
    }
    /// Managed by the service: readable, never written by callers.
    pub fn read_only(mut self) -> Self {
        self.valid_for_create = false;
        self.valid_for_update = false;
        self
    }
    pub fn create_only(mut self) -> Self {
        self.valid_for_update = false;
        self
    }
    pub fn name(&self) -> &str {
        &self.logical_name
    }
    pub fn option_label(&self, code: i32) -> Option<&str> {
        self.options
            .iter()
            .find(|v| v.code == code)
            .and_then(|v| v.label.as_deref())
    }
    pub fn option_code(&self, label: &str) -> Option<i32> {
        self.options
            .iter()
            .find(|v| {
                v.label
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(label))
            })
            .map(|v| v.code)
    }
}

/// Schema of an entity as declared by the service.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    pub logical_name: String,
    pub primary_id_attribute: String,
    pub primary_name_attribute: Option<String>,
    pub attributes: Vec<AttributeMetadata>,
}

impl EntityMetadata {
    /// Entity with the conventional `{name}id` primary key attribute.
    pub fn new(logical_name: impl Into<String>) -> Self {
        let logical_name = logical_name.into();
        let primary_id_attribute = format!("{logical_name}id");
        Self {
            attributes: vec![
                AttributeMetadata::new(&primary_id_attribute, AttributeType::Uniqueidentifier)
                    .create_only(),
            ],
            logical_name,
            primary_id_attribute,
            primary_name_attribute: None,
        }
    }
    pub fn primary_name(mut self, name: impl Into<String>) -> Self {
        self.primary_name_attribute = Some(name.into());
        self
    }
    pub fn attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes
            .retain(|v| v.logical_name != attribute.logical_name);
        self.attributes.push(attribute);
        self
    }
    pub fn name(&self) -> &str {
        &self.logical_name
    }
    pub fn find_attribute(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attributes
            .iter()
            .find(|v| v.logical_name.eq_ignore_ascii_case(name))
    }
    pub fn is_primary_id(&self, name: &str) -> bool {
        self.primary_id_attribute.eq_ignore_ascii_case(name)
    }
}

/// Snapshot of the metadata known to a compilation. Entities missing from the catalog
/// are compiled untyped.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entities: HashMap<String, Arc<EntityMetadata>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, metadata: Arc<EntityMetadata>) -> &mut Self {
        self.entities
            .insert(metadata.logical_name.to_lowercase(), metadata);
        self
    }
    pub fn with(mut self, metadata: Arc<EntityMetadata>) -> Self {
        self.insert(metadata);
        self
    }
    pub fn get(&self, entity: &str) -> Option<&Arc<EntityMetadata>> {
        self.entities.get(&entity.to_lowercase())
    }
    pub fn attribute(&self, entity: &str, attribute: &str) -> Option<&AttributeMetadata> {
        self.get(entity).and_then(|v| v.find_attribute(attribute))
    }
}
