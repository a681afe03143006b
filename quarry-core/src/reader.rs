use crate::{
    ColumnResolver, ColumnSet, DEFAULT_PAGE_SIZE, LooseMap, PageInfo, QueryExpression, Record,
    Result, Service,
    stream::{Stream, StreamExt},
    truncate_long,
};
use async_stream::try_stream;
use std::pin::pin;

/// Options of the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Default formatted lookups surface the name of the referenced record.
    pub lookups_return_name: bool,
    /// Records per page requested from the service.
    pub page_size: u32,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            lookups_return_name: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Every record selected by `query`, following the paging cookies.
///
/// A query with a `top` limit is read in a single request without paging.
pub fn retrieve_all<S: Service>(
    service: S,
    mut query: QueryExpression,
    page_size: u32,
) -> impl Stream<Item = Result<Record>> + Send {
    try_stream! {
        let top = query.top.map(|v| v as usize);
        if top.is_some() {
            query.page_info = None;
        } else if query.page_info.is_none() {
            query.page_info = Some(PageInfo::new(page_size));
        }
        let mut returned = 0usize;
        'pages: loop {
            log::debug!("Retrieving {}", truncate_long!(query.to_fetch_xml()));
            let collection = service.retrieve_multiple(&query).await?;
            for record in collection.records {
                if top.is_some_and(|top| returned >= top) {
                    break 'pages;
                }
                returned += 1;
                yield record;
            }
            if !collection.more_records || top.is_some_and(|top| returned >= top) {
                break;
            }
            let Some(page) = query.page_info.as_mut() else {
                break;
            };
            page.page_number += 1;
            page.paging_cookie = collection.paging_cookie;
        }
    }
}

/// Reads records as loose maps with the requested output columns.
pub struct Reader<S: Service> {
    service: S,
    query: QueryExpression,
    columns: Vec<String>,
    options: ReadOptions,
}

impl<S: Service> Reader<S> {
    pub fn new(service: S, query: QueryExpression) -> Self {
        Self {
            service,
            query,
            columns: Vec::new(),
            options: ReadOptions::default(),
        }
    }

    /// Output columns, `name`, `name:Raw` or `name:Display`. When not given they are the
    /// columns of the query.
    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn stream(self) -> impl Stream<Item = Result<LooseMap>> + Send {
        let Self {
            service,
            mut query,
            columns,
            options,
        } = self;
        try_stream! {
            let metadata = service.entity_metadata(&query.entity_name).await?;
            let columns = if columns.is_empty() {
                match &query.columns {
                    ColumnSet::All => Vec::new(),
                    ColumnSet::Columns(v) => v.clone(),
                }
            } else {
                columns
            };
            let mut resolver = ColumnResolver::new(metadata, &columns)?
                .lookups_return_name(options.lookups_return_name);
            query.columns = resolver.column_set();
            let records = retrieve_all(service.clone(), query, options.page_size);
            let mut records = pin!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                yield resolver.resolve(&service, &record).await?;
            }
        }
    }

    /// Collect every output record.
    pub async fn read_all(self) -> Result<Vec<LooseMap>> {
        let stream = self.stream();
        let mut stream = pin!(stream);
        let mut result = Vec::new();
        while let Some(record) = stream.next().await {
            result.push(record?);
        }
        Ok(result)
    }
}

/// Number of records selected by `query`, ignoring its limit and paging.
pub async fn count<S: Service>(service: &S, query: &QueryExpression) -> Result<u64> {
    let mut query = query.count_only();
    let collection = service.retrieve_multiple(&query).await?;
    if let Some(total) = collection.total_record_count {
        return Ok(total);
    }
    let mut total = collection.records.len() as u64;
    let mut more = collection.more_records;
    let mut cookie = collection.paging_cookie;
    while more {
        let page = query
            .page_info
            .get_or_insert_with(|| PageInfo::new(DEFAULT_PAGE_SIZE));
        page.page_number += 1;
        page.paging_cookie = cookie.take();
        let collection = service.retrieve_multiple(&query).await?;
        total += collection.records.len() as u64;
        more = collection.more_records;
        cookie = collection.paging_cookie;
    }
    log::debug!("Counted {total} {} records", query.entity_name);
    Ok(total)
}
