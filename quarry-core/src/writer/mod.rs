mod context;
mod fetch_xml_writer;

pub use context::*;
pub use fetch_xml_writer::*;
