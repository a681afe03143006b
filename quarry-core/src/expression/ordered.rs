use std::fmt::{self, Display, Formatter};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    #[default]
    ASC,
    DESC,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExpression {
    pub attribute: String,
    pub order: Order,
}

impl OrderExpression {
    pub fn new(attribute: impl Into<String>, order: Order) -> Self {
        Self {
            attribute: attribute.into(),
            order,
        }
    }

    /// `name` or `name+` sorts ascending, `name-` descending.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if let Some(attribute) = value.strip_suffix('-') {
            Self::new(attribute.trim(), Order::DESC)
        } else {
            Self::new(value.trim_end_matches('+').trim(), Order::ASC)
        }
    }
}

impl Display for OrderExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.attribute, self.order)
    }
}
