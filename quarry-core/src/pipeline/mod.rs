mod batch;
mod classify;
mod options;
mod worker;

pub use batch::*;
pub use classify::*;
pub use options::*;

use crate::{
    Error, InputRecord, QuarryError, Result, Service, send_value,
    stream::{Stream, StreamExt},
};
use std::{pin::pin, sync::Arc};
use tokio::sync::watch;
use worker::{Worker, fail_items};

/// Stops a running [`WritePipeline`].
///
/// Input reading and dispatch stop, batches already sent complete and emit their outcomes,
/// everything else fails with [`QuarryError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        log::debug!("Write pipeline cancellation requested");
        self.0.send_replace(true);
    }
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Writes a stream of loose input records to one entity.
///
/// A producer task classifies the input and groups it in batches, dispatched through a
/// bounded queue to `max_degree_of_parallelism` workers. Every input yields at least one
/// [`ItemOutcome`] on the returned stream, in no particular order across batches.
pub struct WritePipeline<S: Service> {
    service: S,
    entity: String,
    options: WriteOptions,
    cancel: CancelHandle,
}

impl<S: Service> WritePipeline<S> {
    pub fn new(service: S, entity: impl Into<String>, options: WriteOptions) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            service,
            entity: entity.into(),
            options,
            cancel: CancelHandle(Arc::new(cancel)),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Validate the options, load the entity metadata and start the tasks.
    pub async fn run<I>(self, input: I) -> Result<impl Stream<Item = ItemOutcome> + Send + 'static>
    where
        I: Stream<Item = InputRecord> + Send + 'static,
    {
        let Self {
            service,
            entity,
            options,
            cancel,
        } = self;
        options.validate()?;
        let metadata = service.entity_metadata(&entity).await?;
        let entity: Arc<str> = metadata.logical_name.as_str().into();
        let options = Arc::new(options);
        let (batch_tx, batch_rx) = flume::bounded::<Batch>(options.max_degree_of_parallelism);
        let (result_tx, result_rx) = flume::unbounded::<ItemOutcome>();
        let mut tasks = Vec::with_capacity(options.max_degree_of_parallelism + 1);
        for id in 0..options.max_degree_of_parallelism {
            let worker = Worker {
                id,
                service: service.clone(),
                entity: entity.clone(),
                options: options.clone(),
                batches: batch_rx.clone(),
                results: result_tx.clone(),
                cancel: cancel.0.subscribe(),
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        drop(batch_rx);
        log::debug!(
            "Writing `{}` with batches of {} and {} worker(s)",
            entity,
            options.batch_size,
            options.max_degree_of_parallelism
        );
        let mut classifier = Classifier::new(metadata, options.clone());
        let mut cancelled = cancel.0.subscribe();
        tasks.push(tokio::spawn(async move {
            let batch_size = options.batch_size;
            let mut input = pin!(input);
            let mut batch = Batch::with_capacity(batch_size);
            let mut index = 0usize;
            loop {
                let is_cancelled = *cancelled.borrow();
                if is_cancelled {
                    break;
                }
                let next = tokio::select! {
                    v = input.next() => v,
                    Ok(_) = cancelled.wait_for(|v| *v) => None,
                };
                let Some(record) = next else {
                    break;
                };
                let record = Arc::new(record);
                match classifier.items(&service, index, record.clone()).await {
                    Ok(items) => {
                        for item in items {
                            batch.items.push(item);
                            if batch.len() >= batch_size {
                                let full = std::mem::replace(
                                    &mut batch,
                                    Batch::with_capacity(batch_size),
                                );
                                if let Err(e) = batch_tx.send_async(full).await {
                                    fail_items(&result_tx, &entity, e.into_inner().items, || {
                                        Error::msg("The workers stopped before the batch was sent")
                                    });
                                }
                            }
                        }
                    }
                    Err(error) => {
                        let error = error.context(format!(
                            "Could not write `{entity}` for input {index}: {record}"
                        ));
                        log::warn!("{:#}", error);
                        send_value!(
                            result_tx,
                            ItemOutcome {
                                token: classifier.next_token(),
                                input_index: index,
                                operation: None,
                                attempts: 0,
                                input: record,
                                outcome: Outcome::Failed {
                                    error,
                                    retryable: false,
                                },
                            }
                        );
                    }
                }
                index += 1;
            }
            let is_cancelled = *cancelled.borrow();
            if !batch.is_empty() {
                if is_cancelled {
                    fail_items(&result_tx, &entity, batch.items, || {
                        Error::new(QuarryError::Cancelled)
                    });
                } else if let Err(e) = batch_tx.send_async(batch).await {
                    fail_items(&result_tx, &entity, e.into_inner().items, || {
                        Error::msg("The workers stopped before the batch was sent")
                    });
                }
            }
            log::debug!("Read {index} input record(s) for `{entity}`");
        }));
        tokio::spawn(async move {
            for result in futures::future::join_all(tasks).await {
                if let Err(e) = result {
                    log::error!("Write pipeline task failed: {e}");
                }
            }
        });
        Ok(result_rx.into_stream())
    }
}
