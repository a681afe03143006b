//! Compile loose filters, joins and column lists into native queries of a
//! metadata-driven record service, and write records through a batched pipeline.
//!
//! ```
//! use quarry::{Catalog, QueryBuilder};
//! use serde_json::json;
//!
//! let query = QueryBuilder::new("contact")
//!     .filter(json!({ "or": [{ "firstname": "Rob" }, { "lastname": ["One", "Two"] }] }))
//!     .order_by("lastname-")
//!     .top(10)
//!     .build(&Catalog::new())
//!     .expect("the query should compile");
//! assert_eq!(query.top, Some(10));
//! ```
pub use quarry_core::*;
