use crate::{
    ColumnSet, EntityMetadata, EntityReference, Error, ID_KEY, LooseMap, QuarryError, Record,
    Result, Service, TABLE_NAME_KEY, Value, convert,
};
use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    sync::Arc,
};
use uuid::Uuid;

/// Separator between an attribute name and its format in a column name.
pub const FORMAT_SEPARATOR: char = ':';

/// Attributes maintained by the service, left out of "all columns" unless requested.
pub const SYSTEM_ATTRIBUTES: [&str; 16] = [
    "createdby",
    "createdon",
    "createdonbehalfby",
    "importsequencenumber",
    "modifiedby",
    "modifiedon",
    "modifiedonbehalfby",
    "organizationid",
    "overriddencreatedon",
    "owningbusinessunit",
    "owningteam",
    "owninguser",
    "timezoneruleversionnumber",
    "utcconversiontimezonecode",
    "versionnumber",
    "traversedpath",
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    #[default]
    Default,
    Raw,
    Display,
}

impl Display for ColumnFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnFormat::Default => "Default",
            ColumnFormat::Raw => "Raw",
            ColumnFormat::Display => "Display",
        })
    }
}

/// A requested output column: `name`, `name:Raw` or `name:Display`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub attribute: String,
    pub format: ColumnFormat,
}

impl ColumnSpec {
    pub fn new(attribute: impl Into<String>, format: ColumnFormat) -> Self {
        Self {
            attribute: attribute.into(),
            format,
        }
    }

    /// Split on the last separator. Purely syntactic, the attribute is not validated.
    pub fn parse(column: &str) -> Result<Self> {
        let Some((attribute, format)) = column.rsplit_once(FORMAT_SEPARATOR) else {
            return Ok(Self::new(column.trim(), ColumnFormat::Default));
        };
        let format = match format.trim().to_lowercase().as_str() {
            "raw" => ColumnFormat::Raw,
            "display" => ColumnFormat::Display,
            "" | "default" => ColumnFormat::Default,
            _ => {
                return Err(Error::new(QuarryError::Format(format!(
                    "Unknown column format `{format}` in `{column}`, expected Raw or Display"
                ))));
            }
        };
        Ok(Self::new(attribute.trim(), format))
    }

    /// Name of the key in output records, the original column text.
    pub fn output_name(&self) -> String {
        match self.format {
            ColumnFormat::Default => self.attribute.clone(),
            format => format!("{}{FORMAT_SEPARATOR}{format}", self.attribute),
        }
    }
}

/// Names of the attributes of `metadata`, sorted, without system attributes unless
/// `include_system`, and without anything in `exclude`.
pub fn all_column_names(
    metadata: &EntityMetadata,
    include_system: bool,
    exclude: &[impl AsRef<str>],
) -> Vec<String> {
    let mut result = metadata
        .attributes
        .iter()
        .filter(|v| v.valid_for_read)
        .map(|v| v.logical_name.as_str())
        .filter(|v| {
            include_system
                || !SYSTEM_ATTRIBUTES
                    .iter()
                    .any(|system| system.eq_ignore_ascii_case(v))
        })
        .filter(|v| !exclude.iter().any(|e| e.as_ref().eq_ignore_ascii_case(v)))
        .map(str::to_owned)
        .collect::<Vec<_>>();
    result.sort();
    result
}

/// Turns records read from the service into loose output maps.
///
/// Lookup names requested through the `lookups return name` option are resolved with one
/// read per referenced record, cached for the lifetime of the resolver.
pub struct ColumnResolver {
    metadata: Arc<EntityMetadata>,
    columns: Vec<ColumnSpec>,
    lookups_return_name: bool,
    names: HashMap<(String, Uuid), Option<String>>,
}

impl ColumnResolver {
    /// `columns` empty means every readable non system attribute.
    pub fn new(metadata: Arc<EntityMetadata>, columns: &[impl AsRef<str>]) -> Result<Self> {
        let columns = if columns.is_empty() {
            all_column_names(&metadata, false, &[] as &[&str])
                .into_iter()
                .map(|v| ColumnSpec::new(v, ColumnFormat::Default))
                .collect()
        } else {
            columns
                .iter()
                .map(|v| ColumnSpec::parse(v.as_ref()))
                .collect::<Result<Vec<_>>>()?
        };
        for column in &columns {
            if metadata.find_attribute(&column.attribute).is_none() {
                return Err(Error::new(QuarryError::UnknownAttribute {
                    entity: metadata.logical_name.clone(),
                    attribute: column.attribute.clone(),
                }));
            }
        }
        Ok(Self {
            metadata,
            columns,
            lookups_return_name: false,
            names: HashMap::new(),
        })
    }

    pub fn lookups_return_name(mut self, value: bool) -> Self {
        self.lookups_return_name = value;
        self
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Attributes to request from the service.
    pub fn column_set(&self) -> ColumnSet {
        let mut names = Vec::<String>::new();
        for column in &self.columns {
            if !names.iter().any(|v| v.eq_ignore_ascii_case(&column.attribute)) {
                names.push(column.attribute.clone());
            }
        }
        ColumnSet::Columns(names)
    }

    async fn lookup_name<S: Service>(
        &mut self,
        service: &S,
        reference: &EntityReference,
    ) -> Result<Option<String>> {
        if let Some(name) = &reference.name {
            return Ok(Some(name.clone()));
        }
        let key = (reference.entity.to_lowercase(), reference.id);
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }
        let target = service.entity_metadata(&reference.entity).await?;
        let name = match &target.primary_name_attribute {
            Some(attribute) => service
                .retrieve(
                    &reference.entity,
                    reference.id,
                    &ColumnSet::Columns(vec![attribute.clone()]),
                )
                .await?
                .and_then(|record| match record.get(attribute) {
                    Some(Value::Varchar(Some(v))) => Some(v.clone()),
                    _ => None,
                }),
            None => None,
        };
        log::debug!(
            "Resolved the name of {}({}) to {:?}",
            reference.entity,
            reference.id,
            name
        );
        self.names.insert(key, name.clone());
        Ok(name)
    }

    /// Convert one record, keys follow the requested column names. `Id` and `TableName`
    /// are always present, attributes of linked entities (`alias.attribute`) are copied
    /// untyped.
    pub async fn resolve<S: Service>(&mut self, service: &S, record: &Record) -> Result<LooseMap> {
        let mut result = LooseMap::new();
        for i in 0..self.columns.len() {
            let column = self.columns[i].clone();
            let Some(attribute) = self.metadata.find_attribute(&column.attribute).cloned() else {
                continue;
            };
            let value = record
                .get(&column.attribute)
                .cloned()
                .unwrap_or_else(|| attribute.attribute_type.empty_value());
            let converted = match (&value, column.format) {
                (Value::Reference(Some(reference)), ColumnFormat::Default | ColumnFormat::Display)
                    if column.format == ColumnFormat::Display || self.lookups_return_name =>
                {
                    match self.lookup_name(service, reference).await? {
                        Some(name) => serde_json::Value::String(name),
                        None if column.format == ColumnFormat::Display => {
                            convert::from_native(&value, &attribute, ColumnFormat::Display)?
                        }
                        None => serde_json::Value::Null,
                    }
                }
                _ => convert::from_native(&value, &attribute, column.format).map_err(|e| {
                    e.context(format!(
                        "While reading column `{}` of {}",
                        column.output_name(),
                        record
                    ))
                })?,
            };
            result.insert(column.output_name(), converted);
        }
        for (name, value) in &record.attributes {
            if name.contains('.') && !result.contains_key(name) {
                result.insert(name.clone(), convert::to_loose_untyped(value));
            }
        }
        result.insert(
            ID_KEY.into(),
            record
                .id
                .map(|v| serde_json::Value::String(v.to_string()))
                .unwrap_or(serde_json::Value::Null),
        );
        result.insert(
            TABLE_NAME_KEY.into(),
            serde_json::Value::String(record.entity.clone()),
        );
        Ok(result)
    }
}
