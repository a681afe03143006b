use crate::{
    Catalog, ColumnSet, EntityCollection, EntityMetadata, Error, Fault, QuarryError,
    QueryExpression, Record, Result, TRANSIENT_FAULT_CODES, WriteRequest, WriteResponse,
};
use std::{future::Future, sync::Arc};
use uuid::Uuid;

/// Remote structured data service.
///
/// Implementations are cheap to clone, each worker of the write pipeline owns a clone.
pub trait Service: Clone + Send + Sync + 'static {
    fn entity_metadata(
        &self,
        entity: &str,
    ) -> impl Future<Output = Result<Arc<EntityMetadata>>> + Send;

    /// One page of the records selected by `query`.
    fn retrieve_multiple(
        &self,
        query: &QueryExpression,
    ) -> impl Future<Output = Result<EntityCollection>> + Send;

    /// The record with identity `id`, `None` when it does not exist.
    fn retrieve(
        &self,
        entity: &str,
        id: Uuid,
        columns: &ColumnSet,
    ) -> impl Future<Output = Result<Option<Record>>> + Send;

    /// Execute the requests as one batch, results follow the order of the requests.
    ///
    /// The outer error means the whole call failed and no result is known.
    fn execute_multiple(
        &self,
        requests: Vec<WriteRequest>,
    ) -> impl Future<Output = Result<Vec<std::result::Result<WriteResponse, Fault>>>> + Send;

    /// Execute a single request, a fault is returned as [`QuarryError::RemoteFault`].
    fn execute(&self, request: WriteRequest) -> impl Future<Output = Result<WriteResponse>> + Send {
        async move {
            let mut results = self.execute_multiple(vec![request]).await?;
            if results.len() != 1 {
                return Err(Error::msg(format!(
                    "Expected exactly one result from the service, received {}",
                    results.len()
                )));
            }
            match results.pop() {
                Some(Ok(response)) => Ok(response),
                Some(Err(fault)) => Err(Error::new(QuarryError::RemoteFault {
                    retryable: TRANSIENT_FAULT_CODES.contains(&fault.code),
                    fault,
                })),
                None => Err(Error::msg("No result from the service")),
            }
        }
    }
}

impl Catalog {
    /// Catalog with the metadata of `entities` read from `service`.
    pub async fn load<S: Service>(
        service: &S,
        entities: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Catalog> {
        let mut catalog = Catalog::new();
        for entity in entities {
            let entity = entity.as_ref();
            if catalog.get(entity).is_none() {
                catalog.insert(service.entity_metadata(entity).await?);
            }
        }
        Ok(catalog)
    }
}
