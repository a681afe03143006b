use crate::{Error, QuarryError, Result, Value};
use std::fmt::{self, Display, Formatter};

/// Comparison applied by a native condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    Like,
    NotLike,
    In,
    NotIn,
    Null,
    NotNull,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
}

impl ConditionOperator {
    /// Operator holding exactly when `self` does not, for non null attributes.
    pub fn inverse(&self) -> ConditionOperator {
        use ConditionOperator::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            Like => NotLike,
            NotLike => Like,
            In => NotIn,
            NotIn => In,
            Null => NotNull,
            NotNull => Null,
            GreaterThan => LessEqual,
            GreaterEqual => LessThan,
            LessThan => GreaterEqual,
            LessEqual => GreaterThan,
        }
    }

    /// Whether the condition tests nullness and takes no value.
    pub fn is_unary(&self) -> bool {
        matches!(self, ConditionOperator::Null | ConditionOperator::NotNull)
    }

    /// Whether the condition takes a list of values.
    pub fn is_membership(&self) -> bool {
        matches!(self, ConditionOperator::In | ConditionOperator::NotIn)
    }

    /// Name used by the XML query dialect.
    pub fn fetch_name(&self) -> &'static str {
        use ConditionOperator::*;
        match self {
            Equal => "eq",
            NotEqual => "ne",
            Like => "like",
            NotLike => "not-like",
            In => "in",
            NotIn => "not-in",
            Null => "null",
            NotNull => "not-null",
            GreaterThan => "gt",
            GreaterEqual => "ge",
            LessThan => "lt",
            LessEqual => "le",
        }
    }

    /// Parse an operator name, case insensitive, accepting both the long names and the
    /// XML dialect abbreviations.
    pub fn parse(name: &str) -> Result<Self> {
        use ConditionOperator::*;
        let normalized = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        let patterns: &[(&[&str], ConditionOperator)] = &[
            (&["eq", "equal", "equals"], Equal),
            (&["ne", "neq", "notequal"], NotEqual),
            (&["like"], Like),
            (&["notlike"], NotLike),
            (&["in"], In),
            (&["notin"], NotIn),
            (&["null", "isnull"], Null),
            (&["notnull", "isnotnull"], NotNull),
            (&["gt", "greaterthan"], GreaterThan),
            (&["ge", "greaterequal", "greaterthanorequal"], GreaterEqual),
            (&["lt", "lessthan"], LessThan),
            (&["le", "lessequal", "lessthanorequal"], LessEqual),
        ];
        for (names, operator) in patterns {
            if names.contains(&normalized.as_str()) {
                return Ok(*operator);
            }
        }
        Err(Error::new(QuarryError::UnsupportedFilterShape(format!(
            "unknown operator `{name}`"
        ))))
    }
}

impl Display for ConditionOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use ConditionOperator::*;
        f.write_str(match self {
            Equal => "Equal",
            NotEqual => "NotEqual",
            Like => "Like",
            NotLike => "NotLike",
            In => "In",
            NotIn => "NotIn",
            Null => "Null",
            NotNull => "NotNull",
            GreaterThan => "GreaterThan",
            GreaterEqual => "GreaterEqual",
            LessThan => "LessThan",
            LessEqual => "LessEqual",
        })
    }
}

/// Native condition on one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpression {
    /// Alias or name of the linked entity owning the attribute, `None` for the root.
    pub entity_alias: Option<String>,
    pub attribute: String,
    pub operator: ConditionOperator,
    pub values: Vec<Value>,
}

impl ConditionExpression {
    pub fn new(
        attribute: impl Into<String>,
        operator: ConditionOperator,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            entity_alias: None,
            attribute: attribute.into(),
            operator,
            values: values.into_iter().collect(),
        }
    }
    pub fn equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, ConditionOperator::Equal, [value.into()])
    }
    pub fn null(attribute: impl Into<String>) -> Self {
        Self::new(attribute, ConditionOperator::Null, [])
    }
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.entity_alias = Some(alias.into());
        self
    }
}

impl Display for ConditionExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(alias) = &self.entity_alias {
            write!(f, "{alias}.")?;
        }
        write!(f, "{} {}", self.attribute, self.operator)?;
        match self.values.as_slice() {
            [] => Ok(()),
            [v] if !self.operator.is_membership() => write!(f, " {v}"),
            values => {
                f.write_str(" (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}
