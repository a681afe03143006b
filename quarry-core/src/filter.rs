use crate::{
    ConditionExpression, ConditionOperator, EntityMetadata, Error, FilterExpression,
    LogicalOperator, LooseValue, QuarryError, Result, Value, convert, truncate_long,
};
use std::fmt::{self, Display, Formatter};

/// Reserved keys turning a filter map into a group.
pub const GROUP_KEYS: [(&str, GroupKind); 4] = [
    ("and", GroupKind::And),
    ("or", GroupKind::Or),
    ("not", GroupKind::Not),
    ("xor", GroupKind::Xor),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    And,
    Or,
    /// Negation of the conjunction of the children.
    Not,
    /// Exactly one of two children holds.
    Xor,
}

impl Display for GroupKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupKind::And => "and",
            GroupKind::Or => "or",
            GroupKind::Not => "not",
            GroupKind::Xor => "xor",
        })
    }
}

/// Filter input classified once, before compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition {
        attribute: String,
        operator: ConditionOperator,
        value: serde_json::Value,
    },
    Group {
        kind: GroupKind,
        children: Vec<FilterNode>,
    },
}

fn shape_error(message: String) -> Error {
    Error::new(QuarryError::UnsupportedFilterShape(message))
}

impl FilterNode {
    pub fn and(children: impl IntoIterator<Item = FilterNode>) -> Self {
        FilterNode::Group {
            kind: GroupKind::And,
            children: children.into_iter().collect(),
        }
    }

    pub fn condition(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        value: serde_json::Value,
    ) -> Self {
        FilterNode::Condition {
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    /// Classify a loose filter.
    ///
    /// - A map of attribute to value is the conjunction of its conditions.
    /// - A map with a single `and`/`or`/`not`/`xor` key is a group over its value, an
    ///   array of nodes or a single node.
    /// - An array of nodes is their disjunction.
    pub fn parse(input: &serde_json::Value) -> Result<FilterNode> {
        match input {
            serde_json::Value::Object(map) => Self::parse_map(map),
            serde_json::Value::Array(items) => Ok(FilterNode::Group {
                kind: GroupKind::Or,
                children: items.iter().map(Self::parse).collect::<Result<_>>()?,
            }),
            other => Err(shape_error(format!(
                "expected a map or a list of maps, found `{}`",
                truncate_long!(other.to_string())
            ))),
        }
    }

    fn parse_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<FilterNode> {
        let group = map.iter().find_map(|(k, v)| {
            GROUP_KEYS
                .iter()
                .find(|(name, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, kind)| (k, *kind, v))
        });
        let Some((key, kind, value)) = group else {
            return Ok(FilterNode::Group {
                kind: GroupKind::And,
                children: map
                    .iter()
                    .map(|(k, v)| Self::parse_condition(k, v))
                    .collect::<Result<_>>()?,
            });
        };
        if map.len() > 1 {
            return Err(Error::new(QuarryError::AmbiguousFilter(format!(
                "the group key `{key}` cannot be mixed with other keys ({}), nest them in the group",
                map.keys()
                    .filter(|k| *k != key)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))));
        }
        let children = match value {
            serde_json::Value::Array(items) => {
                items.iter().map(Self::parse).collect::<Result<Vec<_>>>()?
            }
            serde_json::Value::Object(..) => vec![Self::parse(value)?],
            other => {
                return Err(shape_error(format!(
                    "the `{key}` group expects a map or a list of maps, found `{}`",
                    truncate_long!(other.to_string())
                )));
            }
        };
        match kind {
            GroupKind::Not if children.is_empty() => {
                Err(shape_error("a `not` group needs at least one child".into()))
            }
            GroupKind::Xor if children.len() != 2 => Err(shape_error(format!(
                "a `xor` group needs exactly two children, found {}",
                children.len()
            ))),
            _ => Ok(FilterNode::Group { kind, children }),
        }
    }

    fn parse_condition(attribute: &str, value: &serde_json::Value) -> Result<FilterNode> {
        let condition = match value {
            serde_json::Value::Object(map)
                if map.keys().any(|k| k.eq_ignore_ascii_case("operator")) =>
            {
                let mut operator = None;
                let mut operand = serde_json::Value::Null;
                for (k, v) in map {
                    match k.to_lowercase().as_str() {
                        "operator" => {
                            let name = v.as_str().ok_or_else(|| {
                                shape_error(format!(
                                    "the operator of `{attribute}` must be a string"
                                ))
                            })?;
                            operator = Some(ConditionOperator::parse(name)?);
                        }
                        "value" | "values" => operand = v.clone(),
                        other => {
                            return Err(Error::new(QuarryError::AmbiguousFilter(format!(
                                "unexpected key `{other}` in the condition on `{attribute}`"
                            ))));
                        }
                    }
                }
                let operator = operator.unwrap_or(ConditionOperator::Equal);
                Self::condition(attribute, operator, operand)
            }
            serde_json::Value::Array(..) => {
                Self::condition(attribute, ConditionOperator::In, value.clone())
            }
            serde_json::Value::Null => {
                Self::condition(attribute, ConditionOperator::Null, serde_json::Value::Null)
            }
            _ => Self::condition(attribute, ConditionOperator::Equal, value.clone()),
        };
        Ok(condition)
    }
}

enum Compiled {
    Condition(ConditionExpression),
    Filter(FilterExpression),
}

/// Compiles [`FilterNode`]s to the native filter tree of one entity.
///
/// The native tree only has `and`/`or` groups: negations are pushed down to the
/// conditions, each inverted comparison being or-ed with a null test so that the result
/// is the exact complement of the original condition.
pub struct FilterCompiler<'a> {
    metadata: Option<&'a EntityMetadata>,
    entity: Option<&'a str>,
    alias: Option<&'a str>,
}

impl<'a> FilterCompiler<'a> {
    /// Values are converted with `metadata` when given, untyped otherwise.
    pub fn new(metadata: Option<&'a EntityMetadata>) -> Self {
        Self {
            metadata,
            entity: None,
            alias: None,
        }
    }

    /// Name of the filtered entity, needed by untyped compilation to express a filter
    /// matching no record.
    pub fn with_entity(mut self, entity: &'a str) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Qualify every condition with the alias of a linked entity.
    pub fn with_alias(mut self, alias: Option<&'a str>) -> Self {
        self.alias = alias;
        self
    }

    /// Parse and compile a loose filter.
    pub fn compile_loose(&self, input: &serde_json::Value) -> Result<FilterExpression> {
        self.compile(&FilterNode::parse(input)?)
    }

    pub fn compile(&self, node: &FilterNode) -> Result<FilterExpression> {
        Ok(match self.compile_node(node, false)? {
            Compiled::Condition(condition) => FilterExpression::and().condition(condition),
            Compiled::Filter(filter) => filter,
        })
    }

    fn compile_node(&self, node: &FilterNode, negate: bool) -> Result<Compiled> {
        match node {
            FilterNode::Condition {
                attribute,
                operator,
                value,
            } => self.compile_condition(attribute, *operator, value, negate),
            FilterNode::Group { kind, children } => match kind {
                GroupKind::And | GroupKind::Or => {
                    let operator = match (kind, negate) {
                        (GroupKind::And, false) | (GroupKind::Or, true) => LogicalOperator::And,
                        _ => LogicalOperator::Or,
                    };
                    if negate && children.is_empty() {
                        return self.nothing(*kind);
                    }
                    let mut filter = FilterExpression::new(operator);
                    for child in children {
                        match self.compile_node(child, negate)? {
                            Compiled::Condition(v) => filter.conditions.push(v),
                            Compiled::Filter(v) => filter.filters.push(v),
                        }
                    }
                    Ok(Compiled::Filter(filter))
                }
                GroupKind::Not if children.is_empty() => {
                    Err(shape_error("a `not` group needs at least one child".into()))
                }
                GroupKind::Not => self.compile_node(
                    &FilterNode::Group {
                        kind: GroupKind::And,
                        children: children.clone(),
                    },
                    !negate,
                ),
                GroupKind::Xor => {
                    let [a, b] = children.as_slice() else {
                        return Err(shape_error(format!(
                            "a `xor` group needs exactly two children, found {}",
                            children.len()
                        )));
                    };
                    // (a or b) and not (a and b)
                    let expanded = FilterNode::Group {
                        kind: GroupKind::And,
                        children: vec![
                            FilterNode::Group {
                                kind: GroupKind::Or,
                                children: vec![a.clone(), b.clone()],
                            },
                            FilterNode::Group {
                                kind: GroupKind::Not,
                                children: vec![a.clone(), b.clone()],
                            },
                        ],
                    };
                    self.compile_node(&expanded, negate)
                }
            },
        }
    }

    /// `primary id Null`, false for every record.
    fn nothing(&self, kind: GroupKind) -> Result<Compiled> {
        let primary_id = match (self.metadata, self.entity) {
            (Some(metadata), _) => metadata.primary_id_attribute.clone(),
            (None, Some(entity)) => format!("{entity}id"),
            (None, None) => {
                return Err(shape_error(format!(
                    "the negation of an empty `{kind}` group matches no record, which needs the name of the filtered entity"
                )));
            }
        };
        Ok(Compiled::Condition(ConditionExpression {
            entity_alias: self.alias.map(str::to_owned),
            attribute: primary_id,
            operator: ConditionOperator::Null,
            values: Vec::new(),
        }))
    }

    fn convert_value(&self, attribute: &str, value: &serde_json::Value) -> Result<Value> {
        let loose = LooseValue::Json(value.clone());
        match self.metadata {
            Some(metadata) => {
                let Some(definition) = metadata.find_attribute(attribute) else {
                    return Err(Error::new(QuarryError::UnknownAttribute {
                        entity: metadata.logical_name.clone(),
                        attribute: attribute.to_owned(),
                    }));
                };
                convert::to_native(&loose, definition)
            }
            None => convert::to_native_untyped(&loose),
        }
    }

    fn compile_condition(
        &self,
        attribute: &str,
        operator: ConditionOperator,
        value: &serde_json::Value,
        negate: bool,
    ) -> Result<Compiled> {
        use ConditionOperator::*;
        let (alias, attribute) = match (self.alias, attribute.split_once('.')) {
            (_, Some((alias, attribute))) => (Some(alias), attribute),
            (alias, None) => (alias, attribute),
        };
        let typed = alias.is_none() || alias == self.alias;
        let to_value = |value: &serde_json::Value| -> Result<Value> {
            if typed {
                self.convert_value(attribute, value)
            } else {
                convert::to_native_untyped(&LooseValue::Json(value.clone()))
            }
        };
        let (operator, values) = match operator {
            Null | NotNull => (operator, Vec::new()),
            In | NotIn => {
                let items = match value {
                    serde_json::Value::Array(items) => items.clone(),
                    serde_json::Value::Null => Vec::new(),
                    other => vec![other.clone()],
                };
                let values = items.iter().map(&to_value).collect::<Result<Vec<_>>>()?;
                (operator, values)
            }
            Like | NotLike => match value {
                serde_json::Value::String(v) => (operator, vec![Value::Varchar(Some(v.clone()))]),
                other => {
                    return Err(Error::new(QuarryError::type_mismatch(
                        attribute,
                        format!("`{operator}` expects a text pattern, found `{other}`"),
                    )));
                }
            },
            _ => {
                if matches!(value, serde_json::Value::Array(..)) {
                    return Err(Error::new(QuarryError::type_mismatch(
                        attribute,
                        format!("`{operator}` expects a single value, use In for lists"),
                    )));
                }
                let value = to_value(value)?;
                match (operator, value.is_null()) {
                    (Equal, true) => (Null, Vec::new()),
                    (NotEqual, true) => (NotNull, Vec::new()),
                    (_, true) => {
                        return Err(Error::new(QuarryError::type_mismatch(
                            attribute,
                            format!("`{operator}` cannot compare with null"),
                        )));
                    }
                    _ => (operator, vec![value]),
                }
            }
        };
        let make = |operator: ConditionOperator, values: Vec<Value>| ConditionExpression {
            entity_alias: alias.map(str::to_owned),
            attribute: attribute.to_owned(),
            operator,
            values,
        };
        if !negate {
            return Ok(Compiled::Condition(make(operator, values)));
        }
        if operator.is_unary() {
            return Ok(Compiled::Condition(make(operator.inverse(), values)));
        }
        Ok(Compiled::Filter(
            FilterExpression::or()
                .condition(make(operator.inverse(), values))
                .condition(make(Null, Vec::new())),
        ))
    }
}
