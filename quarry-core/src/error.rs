use crate::Fault;
use thiserror::Error;

/// Failure kinds raised by the compilers, the converter and the write pipeline.
///
/// Errors travel as [`crate::Error`] (`anyhow::Error`) so that context can be attached
/// along the way, the kind is recovered with [`QuarryError::of`].
#[derive(Debug, Clone, Error)]
pub enum QuarryError {
    /// Malformed identity or reference input.
    #[error("format error: {0}")]
    Format(String),

    /// A value cannot be coerced to the declared attribute type.
    #[error("type mismatch for `{attribute}`: {message}")]
    TypeMismatch { attribute: String, message: String },

    #[error("attribute `{attribute}` does not exist on `{entity}`")]
    UnknownAttribute { entity: String, attribute: String },

    /// A filter map mixes a group key with other keys.
    #[error("ambiguous filter: {0}")]
    AmbiguousFilter(String),

    /// A simplified join map carries more than one `entity.attribute` pair.
    #[error("ambiguous join: {0}")]
    AmbiguousJoin(String),

    #[error("invalid join: {0}")]
    InvalidJoin(String),

    #[error("unsupported filter shape: {0}")]
    UnsupportedFilterShape(String),

    /// A display format was requested on a type that has none.
    #[error("attribute `{attribute}` has no {format} representation")]
    UnsupportedFormat { attribute: String, format: String },

    #[error("{count} records matched on [{}] but multiple matches are not allowed", attributes.join(", "))]
    MultipleMatches { attributes: Vec<String>, count: usize },

    #[error("remote fault{}: {fault}", if *retryable { " (retryable)" } else { "" })]
    RemoteFault { fault: Fault, retryable: bool },

    #[error("the operation was cancelled")]
    Cancelled,

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl QuarryError {
    /// Find the first `QuarryError` in the chain of `error`.
    pub fn of(error: &crate::Error) -> Option<&QuarryError> {
        error
            .downcast_ref::<QuarryError>()
            .or_else(|| error.chain().find_map(|e| e.downcast_ref::<QuarryError>()))
    }

    pub fn type_mismatch(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        QuarryError::TypeMismatch {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuarryError::RemoteFault { retryable: true, .. })
    }
}
