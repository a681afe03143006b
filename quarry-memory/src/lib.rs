mod evaluate;
mod service;

pub use service::*;
