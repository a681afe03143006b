use crate::{
    ColumnSet, ConditionExpression, ConditionOperator, EntityMetadata, Error, FilterExpression,
    InputRecord, PageInfo, QuarryError, QueryExpression, Record, Result, Service, convert,
};

/// Existing records equal to `record` on the `match_on` attributes, read with their
/// identity and the matched attributes.
///
/// Only the attributes present on the record take part, a null value matches records
/// where the attribute is null. When none of them is present nothing matches. More than
/// one match is an error unless `allow_multiple`.
pub async fn find_matches<S: Service>(
    service: &S,
    metadata: &EntityMetadata,
    record: &InputRecord,
    match_on: &[impl AsRef<str>],
    allow_multiple: bool,
) -> Result<Vec<Record>> {
    let mut criteria = FilterExpression::and();
    let mut attributes = Vec::new();
    for name in match_on {
        let name = name.as_ref();
        let Some(value) = record.get(name) else {
            continue;
        };
        let Some(attribute) = metadata.find_attribute(name) else {
            return Err(Error::new(QuarryError::UnknownAttribute {
                entity: metadata.logical_name.clone(),
                attribute: name.to_owned(),
            }));
        };
        let value = convert::to_native(value, attribute)
            .map_err(|e| e.context(format!("While matching `{name}` of {record}")))?;
        criteria = criteria.condition(if value.is_null() {
            ConditionExpression::null(&attribute.logical_name)
        } else {
            ConditionExpression::new(&attribute.logical_name, ConditionOperator::Equal, [value])
        });
        attributes.push(attribute.logical_name.clone());
    }
    if attributes.is_empty() {
        return Ok(Vec::new());
    }
    let mut columns = vec![metadata.primary_id_attribute.clone()];
    columns.extend(attributes.iter().cloned());
    let mut query = QueryExpression::new(&metadata.logical_name)
        .columns(ColumnSet::Columns(columns))
        .criteria(criteria);
    log::debug!("Matching {record} with {}", query.to_fetch_xml());
    let mut matches = Vec::new();
    loop {
        let collection = service.retrieve_multiple(&query).await?;
        matches.extend(collection.records);
        if !collection.more_records {
            break;
        }
        let page = query.page_info.get_or_insert_with(|| PageInfo::new(5000));
        page.page_number += 1;
        page.paging_cookie = collection.paging_cookie;
    }
    if !allow_multiple && matches.len() > 1 {
        return Err(Error::new(QuarryError::MultipleMatches {
            attributes,
            count: matches.len(),
        }));
    }
    Ok(matches)
}
