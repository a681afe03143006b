use crate::{
    Batch, BatchItem, CorrelationToken, Error, ID_KEY, ItemOutcome, Outcome, QuarryError,
    Service, TABLE_NAME_KEY, WriteOptions, WriteRequest, WriteResponse, send_value,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::watch;

/// Copy of an error shared by every item of a failed call, keeping its kind.
fn duplicate(error: &Error) -> Error {
    match QuarryError::of(error) {
        Some(kind) if error.chain().count() == 1 => Error::new(kind.clone()),
        Some(kind) => Error::new(kind.clone()).context(error.to_string()),
        None => Error::msg(format!("{error:#}")),
    }
}

/// Result of one submission for one item.
enum Attempt {
    Done(WriteResponse),
    Failed { error: Error, retryable: bool },
}

/// Consumes batches from the dispatch queue until it is closed.
pub(crate) struct Worker<S: Service> {
    pub(crate) id: usize,
    pub(crate) service: S,
    pub(crate) entity: Arc<str>,
    pub(crate) options: Arc<WriteOptions>,
    pub(crate) batches: flume::Receiver<Batch>,
    pub(crate) results: flume::Sender<ItemOutcome>,
    pub(crate) cancel: watch::Receiver<bool>,
}

impl<S: Service> Worker<S> {
    pub(crate) async fn run(mut self) {
        while let Ok(batch) = self.batches.recv_async().await {
            if self.is_cancelled() {
                fail_items(&self.results, &self.entity, batch.items, || {
                    Error::new(QuarryError::Cancelled)
                });
                continue;
            }
            log::debug!(
                "Worker {} received a batch of {} {} item(s)",
                self.id,
                batch.len(),
                self.entity
            );
            self.process(batch).await;
        }
        log::debug!("Worker {} done", self.id);
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn classify_error(&self, error: Error) -> (Error, bool) {
        let retryable = match QuarryError::of(&error) {
            Some(QuarryError::RemoteFault { fault, .. }) => self.options.is_transient(fault.code),
            _ => false,
        };
        (error, retryable)
    }

    /// Send the requests once, results are in submission order.
    async fn submit(&self, mut requests: Vec<WriteRequest>) -> Vec<Attempt> {
        let count = requests.len();
        let call_failed = |(error, retryable): (Error, bool)| {
            (0..count)
                .map(|_| Attempt::Failed {
                    error: duplicate(&error),
                    retryable,
                })
                .collect::<Vec<_>>()
        };
        if count == 1 {
            let Some(request) = requests.pop() else {
                return Vec::new();
            };
            return match self.service.execute(request).await {
                Ok(response) => vec![Attempt::Done(response)],
                Err(error) => {
                    let (error, retryable) = self.classify_error(error);
                    vec![Attempt::Failed { error, retryable }]
                }
            };
        }
        let results = match self.service.execute_multiple(requests).await {
            Ok(v) => v,
            Err(error) => return call_failed(self.classify_error(error)),
        };
        if results.len() != count {
            return call_failed((
                Error::msg(format!(
                    "The service returned {} results for {count} requests",
                    results.len()
                )),
                false,
            ));
        }
        results
            .into_iter()
            .map(|v| match v {
                Ok(response) => Attempt::Done(response),
                Err(fault) => Attempt::Failed {
                    retryable: self.options.is_transient(fault.code),
                    error: Error::new(QuarryError::RemoteFault {
                        retryable: self.options.is_transient(fault.code),
                        fault,
                    }),
                },
            })
            .collect()
    }

    fn emit(&self, item: BatchItem, outcome: Outcome) {
        if let Outcome::Failed { error, .. } = &outcome {
            log::warn!(
                "{} {} of `{}` failed after {} attempt(s): {:#}",
                item.token,
                item.operation(),
                self.entity,
                item.attempts,
                error
            );
        }
        send_value!(
            self.results,
            ItemOutcome {
                token: item.token,
                input_index: item.input_index,
                operation: Some(item.operation()),
                attempts: item.attempts,
                input: item.input,
                outcome,
            }
        );
    }

    fn terminal(&self, item: &BatchItem, error: Error) -> Error {
        error.context(format!(
            "{} of `{}` failed for {}",
            item.operation(),
            self.entity,
            item.input
        ))
    }

    fn succeeded(&self, item: &BatchItem, response: WriteResponse) -> Outcome {
        let output = self.options.pass_thru.then(|| {
            let mut output = item.input.to_json();
            output.insert(ID_KEY.into(), response.id.to_string().into());
            output.insert(TABLE_NAME_KEY.into(), self.entity.to_string().into());
            output
        });
        Outcome::Succeeded {
            id: response.id,
            created: response.created,
            output,
        }
    }

    async fn process(&mut self, batch: Batch) {
        let mut batch = batch;
        loop {
            for item in &mut batch.items {
                item.attempts += 1;
            }
            let (requests, tokens) = batch.submission();
            let attempts = self.submit(requests).await;
            let mut items = batch
                .items
                .drain(..)
                .map(|v| (v.token, v))
                .collect::<HashMap<CorrelationToken, BatchItem>>();
            let mut retry = Batch::with_capacity(items.len());
            for (index, attempt) in attempts.into_iter().enumerate() {
                let Some(item) = tokens.get(index).and_then(|v| items.remove(v)) else {
                    log::error!("No item at position {index} of the submission");
                    continue;
                };
                match attempt {
                    Attempt::Done(response) => {
                        let outcome = self.succeeded(&item, response);
                        self.emit(item, outcome);
                    }
                    Attempt::Failed {
                        error,
                        retryable: true,
                    } if item.attempts <= self.options.retries => {
                        log::warn!(
                            "{} attempt {} of {} failed, retrying: {:#}",
                            item.token,
                            item.attempts,
                            self.options.retries + 1,
                            error
                        );
                        retry.items.push(item);
                    }
                    Attempt::Failed { error, retryable } => {
                        let error = self.terminal(&item, error);
                        self.emit(item, Outcome::Failed { error, retryable });
                    }
                }
            }
            for (_, item) in items {
                let error = self.terminal(&item, Error::msg("The service returned no result"));
                self.emit(
                    item,
                    Outcome::Failed {
                        error,
                        retryable: false,
                    },
                );
            }
            if retry.is_empty() {
                return;
            }
            let attempt = retry.items.iter().map(|v| v.attempts).max().unwrap_or(1);
            let delay = self.options.retry_delay(attempt);
            if !self.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    Ok(_) = self.cancel.wait_for(|v| *v) => {}
                }
            }
            if self.is_cancelled() {
                for item in retry.items {
                    let error = self.terminal(&item, Error::new(QuarryError::Cancelled));
                    self.emit(
                        item,
                        Outcome::Failed {
                            error,
                            retryable: false,
                        },
                    );
                }
                return;
            }
            batch = retry;
        }
    }
}

/// Emit a failure for items that never reached a worker.
pub(crate) fn fail_items(
    results: &flume::Sender<ItemOutcome>,
    entity: &str,
    items: Vec<BatchItem>,
    error: impl Fn() -> Error,
) {
    for item in items {
        let error = error().context(format!(
            "{} of `{entity}` failed for {}",
            item.operation(),
            item.input
        ));
        send_value!(
            results,
            ItemOutcome {
                token: item.token,
                input_index: item.input_index,
                operation: Some(item.operation()),
                attempts: item.attempts,
                input: item.input,
                outcome: Outcome::Failed {
                    error,
                    retryable: false,
                },
            }
        );
    }
}
