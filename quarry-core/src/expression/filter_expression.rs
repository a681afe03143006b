use crate::ConditionExpression;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        })
    }
}

/// Native filter group. An empty group matches every record, whatever its operator.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FilterExpression {
    pub operator: LogicalOperator,
    pub conditions: Vec<ConditionExpression>,
    pub filters: Vec<FilterExpression>,
}

impl FilterExpression {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            ..Default::default()
        }
    }
    pub fn and() -> Self {
        Self::new(LogicalOperator::And)
    }
    pub fn or() -> Self {
        Self::new(LogicalOperator::Or)
    }
    pub fn condition(mut self, condition: ConditionExpression) -> Self {
        self.conditions.push(condition);
        self
    }
    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filters.push(filter);
        self
    }
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.filters.is_empty()
    }

    /// Conjunction of `self` and `other` where empty sides are dropped.
    pub fn and_also(self, other: FilterExpression) -> FilterExpression {
        match (self.is_empty(), other.is_empty()) {
            (_, true) => self,
            (true, false) => other,
            _ if self.operator == LogicalOperator::And => self.filter(other),
            _ => FilterExpression::and().filter(self).filter(other),
        }
    }

    /// Number of conditions in the whole tree.
    pub fn condition_count(&self) -> usize {
        self.conditions.len() + self.filters.iter().map(Self::condition_count).sum::<usize>()
    }
}

impl Display for FilterExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("true");
        }
        f.write_str("(")?;
        let mut first = true;
        for condition in &self.conditions {
            if !first {
                write!(f, " {} ", self.operator)?;
            }
            first = false;
            write!(f, "{condition}")?;
        }
        for filter in &self.filters {
            if !first {
                write!(f, " {} ", self.operator)?;
            }
            first = false;
            write!(f, "{filter}")?;
        }
        f.write_str(")")
    }
}
