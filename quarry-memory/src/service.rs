use crate::evaluate::{Row, Scope, Tables, join, output, project, sort};
use indexmap::IndexMap;
use quarry_core::{
    AttributeType, ColumnSet, DEFAULT_PAGE_SIZE, EntityCollection, EntityMetadata, Error, Fault,
    OperationKind, QuarryError, QueryExpression, Record, Result, Service, Value, WriteRequest,
    WriteResponse,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use uuid::Uuid;

/// The record does not exist.
pub const OBJECT_DOES_NOT_EXIST: i32 = -2147220969;
/// A record with the same identity already exists.
pub const DUPLICATE_RECORD: i32 = -2147220937;
/// The request names an attribute the entity does not declare.
pub const ATTRIBUTE_NOT_FOUND: i32 = -2147217149;
/// A value does not fit the attribute, or the attribute cannot be written.
pub const INVALID_ARGUMENT: i32 = -2147220989;

/// Calls received by a [`MemoryService`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub retrieve_multiple: usize,
    pub retrieve: usize,
    /// Single request executions.
    pub execute: usize,
    /// Batched executions, whatever their size.
    pub execute_multiple: usize,
    /// Requests received by either kind of execution.
    pub requests: usize,
}

#[derive(Debug, Default)]
struct Store {
    metadata: HashMap<String, Arc<EntityMetadata>>,
    tables: HashMap<String, IndexMap<Uuid, Record>>,
    /// Fault returned to each of the next requests, with the remaining count.
    request_faults: Option<(Fault, usize)>,
    /// Fault failing each of the next calls as a whole, with the remaining count.
    call_faults: Option<(Fault, usize)>,
    calls: CallCounts,
}

impl Tables for Store {
    fn metadata(&self, entity: &str) -> Option<&EntityMetadata> {
        self.metadata.get(&entity.to_lowercase()).map(AsRef::as_ref)
    }
    fn records(&self, entity: &str) -> Vec<&Record> {
        self.tables
            .get(&entity.to_lowercase())
            .map(|v| v.values().collect())
            .unwrap_or_default()
    }
}

fn take_fault(faults: &mut Option<(Fault, usize)>) -> Option<Fault> {
    let (fault, remaining) = faults.as_mut()?;
    let fault = fault.clone();
    *remaining -= 1;
    if *remaining == 0 {
        *faults = None;
    }
    Some(fault)
}

impl Store {
    fn entity(&self, entity: &str) -> std::result::Result<Arc<EntityMetadata>, Fault> {
        self.metadata
            .get(&entity.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                Fault::new(
                    OBJECT_DOES_NOT_EXIST,
                    format!("Entity `{entity}` does not exist"),
                )
            })
    }

    fn query(&self, query: &QueryExpression) -> Result<EntityCollection> {
        let metadata = self
            .entity(&query.entity_name)
            .map_err(|fault| {
                Error::new(QuarryError::RemoteFault {
                    fault,
                    retryable: false,
                })
            })?;
        let mut rows = self
            .records(&metadata.logical_name)
            .into_iter()
            .map(|v| Row::new(v.clone()))
            .collect::<Vec<_>>();
        for link in &query.link_entities {
            rows = join(self, rows, link, None);
        }
        let mut rows = rows
            .into_iter()
            .filter(|row| {
                Scope {
                    tables: self,
                    row,
                    current: &row.root,
                }
                .holds(&query.criteria)
            })
            .collect::<Vec<_>>();
        sort(self, &mut rows, &query.orders);
        if let Some(top) = query.top {
            rows.truncate(top as usize);
        }
        let total = rows.len();
        let (count, page_number) = query
            .page_info
            .as_ref()
            .map(|v| (v.count.max(1) as usize, v.page_number.max(1) as usize))
            .unwrap_or((DEFAULT_PAGE_SIZE as usize, 1));
        let start = ((page_number - 1) * count).min(total);
        let end = (start + count).min(total);
        let more_records = end < total;
        let records = rows[start..end]
            .iter()
            .map(|row| output(self, row, &query.columns, &query.link_entities))
            .collect::<Vec<_>>();
        log::debug!(
            "Query of `{}` returned {} of {} record(s) on page {}",
            metadata.logical_name,
            records.len(),
            total,
            page_number
        );
        Ok(EntityCollection {
            entity_name: metadata.logical_name.clone(),
            records,
            total_record_count: query.return_total_record_count.then_some(total as u64),
            more_records,
            paging_cookie: more_records.then(|| page_number.to_string()),
        })
    }

    /// Attributes of `record` checked against the metadata, for the given operation.
    fn validate(
        &self,
        metadata: &EntityMetadata,
        record: &Record,
        creating: bool,
    ) -> std::result::Result<(), Fault> {
        for (name, value) in &record.attributes {
            let Some(attribute) = metadata.find_attribute(name) else {
                return Err(Fault::new(
                    ATTRIBUTE_NOT_FOUND,
                    format!("`{}` has no attribute `{name}`", metadata.logical_name),
                ));
            };
            let writable = if creating {
                attribute.valid_for_create
            } else {
                attribute.valid_for_update
            };
            if !writable {
                return Err(Fault::new(
                    INVALID_ARGUMENT,
                    format!("`{}.{name}` cannot be written", metadata.logical_name),
                ));
            }
            let fits = match value {
                Value::Null => true,
                Value::Date(..) => attribute.attribute_type == AttributeType::DateTime,
                v => v.same_type(&attribute.attribute_type.empty_value()),
            };
            if !fits {
                return Err(Fault::new(
                    INVALID_ARGUMENT,
                    format!(
                        "`{value}` is not a valid {:?} value for `{}.{name}`",
                        attribute.attribute_type, metadata.logical_name
                    ),
                ));
            }
        }
        Ok(())
    }

    fn apply(&mut self, request: WriteRequest) -> std::result::Result<WriteResponse, Fault> {
        if let Some(fault) = take_fault(&mut self.request_faults) {
            return Err(fault);
        }
        let metadata = self.entity(&request.record.entity)?;
        let table = metadata.logical_name.to_lowercase();
        let existing = request
            .record
            .id
            .filter(|id| self.tables.get(&table).is_some_and(|v| v.contains_key(id)));
        let creating = match (request.operation, existing) {
            (OperationKind::Create, Some(id)) => {
                return Err(Fault::new(
                    DUPLICATE_RECORD,
                    format!("`{}` {id} already exists", metadata.logical_name),
                ));
            }
            (OperationKind::Update, None) => {
                return Err(Fault::new(
                    OBJECT_DOES_NOT_EXIST,
                    format!(
                        "`{}` {} does not exist",
                        metadata.logical_name,
                        request
                            .record
                            .id
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "without identity".into())
                    ),
                ));
            }
            (_, existing) => existing.is_none(),
        };
        self.validate(&metadata, &request.record, creating)?;
        let id = request.record.id.unwrap_or_else(Uuid::new_v4);
        let rows = self.tables.entry(table).or_default();
        let record = rows.entry(id).or_insert_with(|| {
            let mut record = Record::new(&metadata.logical_name);
            record.id = Some(id);
            record
        });
        for (name, value) in request.record.attributes {
            let name = metadata
                .find_attribute(&name)
                .map(|v| v.logical_name.clone())
                .unwrap_or(name);
            record.set(name, value);
        }
        log::trace!("{} {}", request.operation, record);
        Ok(WriteResponse {
            id,
            created: creating,
        })
    }
}

/// Record service holding its tables in memory, shared between clones.
///
/// Besides evaluating queries and writes it can inject faults and counts the calls it
/// receives, to observe how clients use a service.
#[derive(Debug, Default, Clone)]
pub struct MemoryService {
    store: Arc<RwLock<Store>>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity, replacing its previous metadata.
    pub fn with_entity(self, metadata: EntityMetadata) -> Self {
        {
            let Ok(mut store) = self.store.try_write() else {
                log::error!(
                    "Cannot declare `{}` while the service is in use",
                    metadata.logical_name
                );
                return self;
            };
            store
                .metadata
                .insert(metadata.logical_name.to_lowercase(), Arc::new(metadata));
        }
        self
    }

    /// Store `record` as is, bypassing validation.
    pub async fn insert(&self, record: Record) -> Uuid {
        let id = record.id.unwrap_or_else(Uuid::new_v4);
        let mut record = record;
        record.id = Some(id);
        self.store
            .write()
            .await
            .tables
            .entry(record.entity.to_lowercase())
            .or_default()
            .insert(id, record);
        id
    }

    /// Every record of `entity` in insertion order.
    pub async fn records(&self, entity: &str) -> Vec<Record> {
        self.store
            .read()
            .await
            .tables
            .get(&entity.to_lowercase())
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every record, pending fault and call count. Metadata stays.
    pub async fn reset(&self) {
        let mut store = self.store.write().await;
        store.tables.clear();
        store.request_faults = None;
        store.call_faults = None;
        store.calls = CallCounts::default();
    }

    /// Fail each of the next `count` requests with `fault`.
    pub async fn inject_faults(&self, fault: Fault, count: usize) {
        self.store.write().await.request_faults = (count > 0).then_some((fault, count));
    }

    /// Fail each of the next `count` execute calls as a whole with `fault`.
    pub async fn inject_call_faults(&self, fault: Fault, count: usize) {
        self.store.write().await.call_faults = (count > 0).then_some((fault, count));
    }

    pub async fn calls(&self) -> CallCounts {
        self.store.read().await.calls
    }
}

impl Service for MemoryService {
    async fn entity_metadata(&self, entity: &str) -> Result<Arc<EntityMetadata>> {
        self.store.read().await.entity(entity).map_err(|fault| {
            Error::new(QuarryError::RemoteFault {
                fault,
                retryable: false,
            })
        })
    }

    async fn retrieve_multiple(&self, query: &QueryExpression) -> Result<EntityCollection> {
        let mut store = self.store.write().await;
        store.calls.retrieve_multiple += 1;
        store.query(query)
    }

    async fn retrieve(
        &self,
        entity: &str,
        id: Uuid,
        columns: &ColumnSet,
    ) -> Result<Option<Record>> {
        let mut store = self.store.write().await;
        store.calls.retrieve += 1;
        let metadata = store.entity(entity).map_err(|fault| {
            Error::new(QuarryError::RemoteFault {
                fault,
                retryable: false,
            })
        })?;
        Ok(store
            .tables
            .get(&metadata.logical_name.to_lowercase())
            .and_then(|v| v.get(&id))
            .map(|v| project(v, Some(&metadata), columns)))
    }

    async fn execute_multiple(
        &self,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<std::result::Result<WriteResponse, Fault>>> {
        let mut store = self.store.write().await;
        store.calls.execute_multiple += 1;
        store.calls.requests += requests.len();
        if let Some(fault) = take_fault(&mut store.call_faults) {
            return Err(Error::new(QuarryError::RemoteFault {
                retryable: quarry_core::TRANSIENT_FAULT_CODES.contains(&fault.code),
                fault,
            }));
        }
        Ok(requests.into_iter().map(|v| store.apply(v)).collect())
    }

    async fn execute(&self, request: WriteRequest) -> Result<WriteResponse> {
        let mut store = self.store.write().await;
        store.calls.execute += 1;
        store.calls.requests += 1;
        let result = match take_fault(&mut store.call_faults) {
            Some(fault) => Err(fault),
            None => store.apply(request),
        };
        result.map_err(|fault| {
            Error::new(QuarryError::RemoteFault {
                retryable: quarry_core::TRANSIENT_FAULT_CODES.contains(&fault.code),
                fault,
            })
        })
    }
}
