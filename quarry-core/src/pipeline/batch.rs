use crate::{Error, InputRecord, LooseMap, OperationKind, WriteRequest};
use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};
use uuid::Uuid;

/// Identifies one batch item from classification to its outcome.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationToken(pub u64);

impl Display for CorrelationToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A classified input ready to be sent.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub token: CorrelationToken,
    /// Position of the input in the caller's stream, shared by the items of one input.
    pub input_index: usize,
    pub input: Arc<InputRecord>,
    pub request: WriteRequest,
    /// Times the request was sent.
    pub attempts: u32,
}

impl BatchItem {
    pub fn operation(&self) -> OperationKind {
        self.request.operation
    }
}

/// Items sent together in one call.
#[derive(Debug, Default)]
pub struct Batch {
    pub items: Vec<BatchItem>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    /// Requests in submission order with the token of each position.
    pub fn submission(&self) -> (Vec<WriteRequest>, Vec<CorrelationToken>) {
        self.items
            .iter()
            .map(|v| (v.request.clone(), v.token))
            .unzip()
    }
}

#[derive(Debug)]
pub enum Outcome {
    Succeeded {
        id: Uuid,
        /// Whether the service created the record.
        created: bool,
        /// The input with `Id` and `TableName`, when pass thru is requested.
        output: Option<LooseMap>,
    },
    Failed {
        error: Error,
        retryable: bool,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }
}

/// Final result of one item.
#[derive(Debug)]
pub struct ItemOutcome {
    pub token: CorrelationToken,
    pub input_index: usize,
    /// `None` when the input failed before its operation was known.
    pub operation: Option<OperationKind>,
    pub attempts: u32,
    pub input: Arc<InputRecord>,
    pub outcome: Outcome,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
    pub fn id(&self) -> Option<Uuid> {
        match &self.outcome {
            Outcome::Succeeded { id, .. } => Some(*id),
            Outcome::Failed { .. } => None,
        }
    }
    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Failed { error, .. } => Some(error),
            Outcome::Succeeded { .. } => None,
        }
    }
}

impl Display for ItemOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} input {}", self.token, self.input_index)?;
        if let Some(operation) = self.operation {
            write!(f, " {operation}")?;
        }
        match &self.outcome {
            Outcome::Succeeded { id, .. } => write!(f, " succeeded: {id}"),
            Outcome::Failed { error, .. } => {
                write!(f, " failed after {} attempts: {error:#}", self.attempts)
            }
        }
    }
}
