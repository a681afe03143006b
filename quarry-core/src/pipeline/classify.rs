use crate::{
    BatchItem, CorrelationToken, EntityMetadata, Error, ID_KEY, InputRecord, OperationKind,
    QuarryError, Record, Result, Service, TABLE_NAME_KEY, Value, WriteOptions, WriteRequest,
    convert, find_matches,
};
use std::sync::Arc;
use uuid::Uuid;

/// Decides the operation of each input and builds its native request.
pub struct Classifier {
    metadata: Arc<EntityMetadata>,
    options: Arc<WriteOptions>,
    next_token: u64,
}

impl Classifier {
    pub fn new(metadata: Arc<EntityMetadata>, options: Arc<WriteOptions>) -> Self {
        Self {
            metadata,
            options,
            next_token: 0,
        }
    }

    pub fn next_token(&mut self) -> CorrelationToken {
        self.next_token += 1;
        CorrelationToken(self.next_token)
    }

    /// Identity carried by the input, under `Id` or the primary id attribute.
    fn identity(&self, input: &InputRecord) -> Result<Option<Uuid>> {
        let value = input
            .get(ID_KEY)
            .filter(|v| !v.is_null())
            .or_else(|| input.get(&self.metadata.primary_id_attribute));
        let Some(value) = value else {
            return Ok(None);
        };
        let Some(attribute) = self
            .metadata
            .find_attribute(&self.metadata.primary_id_attribute)
        else {
            return Err(Error::msg(format!(
                "`{}` does not declare its primary id attribute",
                self.metadata.logical_name
            )));
        };
        match convert::to_native(value, attribute)? {
            Value::Uuid(v) => Ok(v),
            Value::Reference(v) => Ok(v.map(|v| v.id)),
            other => Err(Error::new(QuarryError::Format(format!(
                "`{other}` is not an identity"
            )))),
        }
    }

    /// Operations to run for `input`, one per matched record when multiple matches are
    /// allowed.
    pub async fn classify<S: Service>(
        &self,
        service: &S,
        input: &InputRecord,
    ) -> Result<Vec<(OperationKind, Option<Uuid>)>> {
        let options = &self.options;
        let id = self.identity(input)?;
        if options.upsert {
            return Ok(vec![(OperationKind::Upsert, id)]);
        }
        if options.create_only {
            return Ok(vec![(OperationKind::Create, id)]);
        }
        let mut targets = id.into_iter().collect::<Vec<_>>();
        if targets.is_empty() {
            for attributes in &options.match_on {
                targets = find_matches(
                    service,
                    &self.metadata,
                    input,
                    attributes,
                    options.allow_multiple_matches,
                )
                .await?
                .into_iter()
                .filter_map(|v| v.id)
                .collect();
                if !targets.is_empty() {
                    log::debug!(
                        "{} matched {} record(s) on [{}]",
                        input,
                        targets.len(),
                        attributes.join(", ")
                    );
                    break;
                }
            }
        }
        if targets.is_empty() {
            if options.no_create {
                return Err(Error::msg(format!(
                    "No existing `{}` record for the input and creation is disabled",
                    self.metadata.logical_name
                )));
            }
            return Ok(vec![(OperationKind::Create, None)]);
        }
        if options.no_update {
            return Err(Error::msg(format!(
                "The input identifies an existing `{}` record and updates are disabled",
                self.metadata.logical_name
            )));
        }
        Ok(targets
            .into_iter()
            .map(|v| (OperationKind::Update, Some(v)))
            .collect())
    }

    /// Native record of `input` for `operation`.
    pub fn record(
        &self,
        input: &InputRecord,
        operation: OperationKind,
        id: Option<Uuid>,
    ) -> Result<Record> {
        let options = &self.options;
        let metadata = &self.metadata;
        let updating = operation != OperationKind::Create;
        let mut record = Record::new(&metadata.logical_name);
        record.id = id;
        for (name, value) in &input.values {
            if name.eq_ignore_ascii_case(ID_KEY)
                || name.eq_ignore_ascii_case(TABLE_NAME_KEY)
                || metadata.is_primary_id(name)
                || options.is_ignored(name)
                || (updating && options.is_no_update(name))
            {
                continue;
            }
            let Some(attribute) = metadata.find_attribute(name) else {
                return Err(Error::new(QuarryError::UnknownAttribute {
                    entity: metadata.logical_name.clone(),
                    attribute: name.clone(),
                }));
            };
            let value = convert::to_native(value, attribute)?;
            record.set(&attribute.logical_name, value);
        }
        if updating && options.update_all_columns {
            for attribute in &metadata.attributes {
                let name = &attribute.logical_name;
                if attribute.valid_for_update
                    && !metadata.is_primary_id(name)
                    && !options.is_ignored(name)
                    && !options.is_no_update(name)
                    && !record.contains(name)
                {
                    record.set(name, attribute.attribute_type.empty_value());
                }
            }
        }
        Ok(record)
    }

    /// Batch items of one input, the classification errors are returned for the caller to
    /// report against the input.
    pub async fn items<S: Service>(
        &mut self,
        service: &S,
        input_index: usize,
        input: Arc<InputRecord>,
    ) -> Result<Vec<BatchItem>> {
        let operations = self.classify(service, &input).await?;
        let mut items = Vec::with_capacity(operations.len());
        for (operation, id) in operations {
            let record = self.record(&input, operation, id).map_err(|e| {
                e.context(format!(
                    "{operation} of `{}` failed for {input}",
                    self.metadata.logical_name
                ))
            })?;
            items.push(BatchItem {
                token: self.next_token(),
                input_index,
                input: input.clone(),
                request: WriteRequest { operation, record },
                attempts: 0,
            });
        }
        Ok(items)
    }
}
