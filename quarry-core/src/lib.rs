mod as_value;
mod column;
pub mod convert;
mod error;
mod expression;
mod fetch_xml;
mod filter;
mod join;
mod matching;
mod metadata;
pub mod parse;
mod pipeline;
mod query;
mod reader;
mod record;
mod request;
mod service;
mod util;
mod value;
pub mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use column::*;
pub use error::*;
pub use expression::*;
pub use filter::*;
pub use join::*;
pub use matching::*;
pub use metadata::*;
pub use pipeline::*;
pub use query::*;
pub use reader::*;
pub use record::*;
pub use request::*;
pub use service::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
