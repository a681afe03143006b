use crate::{
    Catalog, ColumnSpec, ConditionOperator, EntityMetadata, Error, FilterCompiler,
    FilterExpression, FilterNode, GroupKind, JoinCompiler, JoinInput, LinkEntity,
    OrderExpression, QuarryError, Record, Result,
};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Attributes returned by a query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ColumnSet {
    #[default]
    All,
    Columns(Vec<String>),
}

impl ColumnSet {
    pub fn contains(&self, attribute: &str) -> bool {
        match self {
            ColumnSet::All => true,
            ColumnSet::Columns(columns) => {
                columns.iter().any(|v| v.eq_ignore_ascii_case(attribute))
            }
        }
    }
    pub fn is_all(&self) -> bool {
        matches!(self, ColumnSet::All)
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ColumnSet::Columns(iter.into_iter().map(Into::into).collect())
    }
}

/// Records per page when the query does not say.
pub const DEFAULT_PAGE_SIZE: u32 = 5000;

/// Paging state of a query, `page_number` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub count: u32,
    pub page_number: u32,
    pub paging_cookie: Option<String>,
}

impl PageInfo {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            page_number: 1,
            paging_cookie: None,
        }
    }
}

/// Native query of one entity.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryExpression {
    pub entity_name: String,
    pub columns: ColumnSet,
    pub criteria: FilterExpression,
    pub link_entities: Vec<LinkEntity>,
    pub orders: Vec<OrderExpression>,
    pub top: Option<u32>,
    pub page_info: Option<PageInfo>,
    pub return_total_record_count: bool,
}

impl QueryExpression {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            ..Default::default()
        }
    }
    pub fn columns(mut self, columns: ColumnSet) -> Self {
        self.columns = columns;
        self
    }
    pub fn criteria(mut self, criteria: FilterExpression) -> Self {
        self.criteria = criteria;
        self
    }
    pub fn link(mut self, link: LinkEntity) -> Self {
        self.link_entities.push(link);
        self
    }
    pub fn order(mut self, order: OrderExpression) -> Self {
        self.orders.push(order);
        self
    }
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }
    /// Same selection without columns, limit and paging, asking for the total count.
    pub fn count_only(&self) -> Self {
        Self {
            entity_name: self.entity_name.clone(),
            columns: ColumnSet::Columns(Vec::new()),
            criteria: self.criteria.clone(),
            link_entities: self
                .link_entities
                .iter()
                .cloned()
                .map(Self::strip_columns)
                .collect(),
            orders: Vec::new(),
            top: None,
            page_info: None,
            return_total_record_count: true,
        }
    }
    fn strip_columns(mut link: LinkEntity) -> LinkEntity {
        link.columns.clear();
        link.link_entities = link
            .link_entities
            .into_iter()
            .map(Self::strip_columns)
            .collect();
        link
    }
}

impl Display for QueryExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fetch_xml())
    }
}

/// One page of records returned by the service.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EntityCollection {
    pub entity_name: String,
    pub records: Vec<Record>,
    /// Present when the query asked for it.
    pub total_record_count: Option<u64>,
    pub more_records: bool,
    pub paging_cookie: Option<String>,
}

/// Assembles a [`QueryExpression`] from the loose query surface.
///
/// The selection is `filter AND NOT (exclude_filter OR id IN exclude_ids) AND id IN ids
/// AND name IN names`, any missing part being left out.
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    pub table: String,
    pub columns: Vec<String>,
    pub filter: Option<serde_json::Value>,
    pub exclude_filter: Option<serde_json::Value>,
    pub joins: Vec<JoinInput>,
    pub order_by: Vec<String>,
    pub top: Option<u32>,
    pub ids: Vec<Uuid>,
    pub names: Vec<String>,
    pub exclude_ids: Vec<Uuid>,
    pub page_size: Option<u32>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
    pub fn filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }
    pub fn exclude_filter(mut self, filter: serde_json::Value) -> Self {
        self.exclude_filter = Some(filter);
        self
    }
    pub fn join(mut self, join: impl Into<JoinInput>) -> Self {
        self.joins.push(join.into());
        self
    }
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by.push(order.into());
        self
    }
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }
    pub fn ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.ids.extend(ids);
        self
    }
    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }
    pub fn exclude_ids(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.exclude_ids.extend(ids);
        self
    }
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn primary_id(&self, metadata: Option<&EntityMetadata>) -> String {
        metadata
            .map(|v| v.primary_id_attribute.clone())
            .unwrap_or_else(|| format!("{}id", self.table))
    }

    fn selection(&self, metadata: Option<&EntityMetadata>) -> Result<FilterNode> {
        let ids_json = |ids: &[Uuid]| {
            serde_json::Value::Array(
                ids.iter()
                    .map(|v| serde_json::Value::String(v.to_string()))
                    .collect(),
            )
        };
        let primary_id = self.primary_id(metadata);
        let mut children = Vec::new();
        if let Some(filter) = &self.filter {
            children.push(FilterNode::parse(filter).map_err(|e| {
                e.context(format!("While parsing the filter of `{}`", self.table))
            })?);
        }
        let mut excluded = Vec::new();
        if let Some(filter) = &self.exclude_filter {
            excluded.push(FilterNode::parse(filter).map_err(|e| {
                e.context(format!("While parsing the exclude filter of `{}`", self.table))
            })?);
        }
        if !self.exclude_ids.is_empty() {
            excluded.push(FilterNode::condition(
                &primary_id,
                ConditionOperator::In,
                ids_json(&self.exclude_ids),
            ));
        }
        if !excluded.is_empty() {
            children.push(FilterNode::Group {
                kind: GroupKind::Not,
                children: vec![FilterNode::Group {
                    kind: GroupKind::Or,
                    children: excluded,
                }],
            });
        }
        if !self.ids.is_empty() {
            children.push(FilterNode::condition(
                &primary_id,
                ConditionOperator::In,
                ids_json(&self.ids),
            ));
        }
        if !self.names.is_empty() {
            let Some(name) = metadata.and_then(|v| v.primary_name_attribute.as_ref()) else {
                return Err(Error::new(QuarryError::InvalidOptions(format!(
                    "cannot select `{}` by name without a known primary name attribute",
                    self.table
                ))));
            };
            children.push(FilterNode::condition(
                name,
                ConditionOperator::In,
                serde_json::Value::Array(
                    self.names
                        .iter()
                        .map(|v| serde_json::Value::String(v.clone()))
                        .collect(),
                ),
            ));
        }
        Ok(FilterNode::and(children))
    }

    /// Compile the query, entities found in `catalog` are compiled typed.
    pub fn build(&self, catalog: &Catalog) -> Result<QueryExpression> {
        let metadata = catalog.get(&self.table).map(AsRef::as_ref);
        let criteria = FilterCompiler::new(metadata)
            .with_entity(&self.table)
            .compile(&self.selection(metadata)?)?;
        let mut columns = Vec::<String>::new();
        for column in &self.columns {
            let spec = ColumnSpec::parse(column)?;
            if let Some(metadata) = metadata
                && metadata.find_attribute(&spec.attribute).is_none()
            {
                return Err(Error::new(QuarryError::UnknownAttribute {
                    entity: metadata.logical_name.clone(),
                    attribute: spec.attribute,
                }));
            }
            if !columns
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&spec.attribute))
            {
                columns.push(spec.attribute);
            }
        }
        let joins = JoinCompiler::new(catalog);
        let link_entities = self
            .joins
            .iter()
            .map(|v| joins.compile(&self.table, v))
            .collect::<Result<Vec<_>>>()?;
        let query = QueryExpression {
            entity_name: self.table.clone(),
            columns: if columns.is_empty() {
                ColumnSet::All
            } else {
                ColumnSet::Columns(columns)
            },
            criteria,
            link_entities,
            orders: self
                .order_by
                .iter()
                .map(|v| OrderExpression::parse(v))
                .collect(),
            top: self.top,
            page_info: self.page_size.map(PageInfo::new),
            return_total_record_count: false,
        };
        log::debug!("Built query {}", crate::truncate_long!(query.to_fetch_xml()));
        Ok(query)
    }

    /// The same selection, counting records instead of returning them.
    pub fn build_count_only(&self, catalog: &Catalog) -> Result<QueryExpression> {
        Ok(self.build(catalog)?.count_only())
    }
}
