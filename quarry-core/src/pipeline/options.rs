use crate::{Error, QuarryError, Result, TRANSIENT_FAULT_CODES};
use std::time::Duration;

/// Delay progression between the attempts of a failed item.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the initial delay.
    #[default]
    Fixed,
    /// Double the delay after each attempt.
    Exponential,
}

/// Longest delay between two attempts whatever the backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Parameters of [`crate::WritePipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Requests sent together in one multi operation call.
    pub batch_size: usize,
    /// Batches in flight at the same time.
    pub max_degree_of_parallelism: usize,
    /// Further attempts of an item failing with a transient fault.
    pub retries: u32,
    pub initial_retry_delay: Duration,
    pub backoff: Backoff,
    /// Fault codes considered transient.
    pub transient_codes: Vec<i32>,
    /// Input keys never written.
    pub ignored_properties: Vec<String>,
    /// Input keys written on creation only.
    pub no_update_columns: Vec<String>,
    pub create_only: bool,
    /// An input with no existing record is reported as a failed item, never created.
    pub no_create: bool,
    /// An input identifying an existing record is reported as a failed item, never
    /// updated.
    pub no_update: bool,
    /// On update write every settable attribute, the ones missing from the input as null.
    pub update_all_columns: bool,
    pub upsert: bool,
    /// Attribute sets identifying existing records, tried in order until one matches.
    pub match_on: Vec<Vec<String>>,
    /// Update every record matched instead of failing.
    pub allow_multiple_matches: bool,
    /// Emit the written input with its identity on success.
    pub pass_thru: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_degree_of_parallelism: 1,
            retries: 0,
            initial_retry_delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            transient_codes: TRANSIENT_FAULT_CODES.to_vec(),
            ignored_properties: Vec::new(),
            no_update_columns: Vec::new(),
            create_only: false,
            no_create: false,
            no_update: false,
            update_all_columns: false,
            upsert: false,
            match_on: Vec::new(),
            allow_multiple_matches: false,
            pass_thru: false,
        }
    }
}

impl WriteOptions {
    pub fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = value;
        self
    }
    pub fn max_degree_of_parallelism(mut self, value: usize) -> Self {
        self.max_degree_of_parallelism = value;
        self
    }
    pub fn retries(mut self, retries: u32, initial_delay: Duration, backoff: Backoff) -> Self {
        self.retries = retries;
        self.initial_retry_delay = initial_delay;
        self.backoff = backoff;
        self
    }
    pub fn match_on<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_on
            .push(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Reject conflicting or meaningless combinations.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(Error::new(QuarryError::InvalidOptions(message.into())));
        if self.batch_size == 0 {
            return invalid("the batch size must be at least 1");
        }
        if self.max_degree_of_parallelism == 0 {
            return invalid("the degree of parallelism must be at least 1");
        }
        if self.create_only && (self.no_create || self.upsert || self.update_all_columns) {
            return invalid(
                "create only cannot be combined with no create, upsert or update all columns",
            );
        }
        if self.create_only && !self.match_on.is_empty() {
            return invalid("create only never matches existing records, remove match on");
        }
        if self.upsert && (self.no_create || self.no_update) {
            return invalid(
                "upsert both creates and updates, it cannot be combined with no create or no update",
            );
        }
        if self.upsert && !self.match_on.is_empty() {
            return invalid(
                "upsert identifies records by their identity, it cannot be combined with match on",
            );
        }
        if self.no_create && self.no_update {
            return invalid("no create and no update together leave nothing to do");
        }
        if self.allow_multiple_matches && self.match_on.is_empty() {
            return invalid("allow multiple matches requires match on");
        }
        if self.match_on.iter().any(Vec::is_empty) {
            return invalid("match on attribute sets cannot be empty");
        }
        Ok(())
    }

    pub fn is_transient(&self, code: i32) -> bool {
        self.transient_codes.contains(&code)
    }

    /// Wait before attempt `attempt + 1`, `attempt` starting at 1.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.initial_retry_delay,
            Backoff::Exponential => self
                .initial_retry_delay
                .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1))),
        };
        delay.min(MAX_RETRY_DELAY)
    }

    pub(crate) fn is_ignored(&self, name: &str) -> bool {
        self.ignored_properties
            .iter()
            .any(|v| v.eq_ignore_ascii_case(name))
    }

    pub(crate) fn is_no_update(&self, name: &str) -> bool {
        self.no_update_columns
            .iter()
            .any(|v| v.eq_ignore_ascii_case(name))
    }
}
