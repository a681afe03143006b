use crate::Record;
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Fault codes the service raises when throttling or on concurrent modifications.
pub const TRANSIENT_FAULT_CODES: [i32; 4] = [
    -2147015902, // number of requests exceeded
    -2147015903, // combined execution time exceeded
    -2147015898, // concurrent requests exceeded
    -2147088254, // record locked by another transaction
];

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    #[default]
    Create,
    Update,
    Upsert,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Create => "Create",
            OperationKind::Update => "Update",
            OperationKind::Upsert => "Upsert",
        })
    }
}

/// Native write request. `Update` requires the record identity, `Upsert` updates the
/// identified record or creates it when missing.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub operation: OperationKind,
    pub record: Record,
}

impl WriteRequest {
    pub fn create(record: Record) -> Self {
        Self {
            operation: OperationKind::Create,
            record,
        }
    }
    pub fn update(record: Record) -> Self {
        Self {
            operation: OperationKind::Update,
            record,
        }
    }
    pub fn upsert(record: Record) -> Self {
        Self {
            operation: OperationKind::Upsert,
            record,
        }
    }
}

impl Display for WriteRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operation, self.record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    pub id: Uuid,
    /// Whether the record did not exist before, always true for `Create`.
    pub created: bool,
}

/// Error reported by the service for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.message, self.code as u32)
    }
}

impl std::error::Error for Fault {}
