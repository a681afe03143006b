mod condition;
mod filter_expression;
mod ordered;

pub use condition::*;
pub use filter_expression::*;
pub use ordered::*;
