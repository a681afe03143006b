use quarry_core::{
    ColumnSet, ConditionExpression, ConditionOperator, EntityMetadata, FilterExpression,
    JoinType, LinkEntity, LogicalOperator, Order, OrderExpression, Record, Value,
};
use std::cmp::Ordering;

/// A root record with the records its links matched, `None` for an unmatched outer link.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) root: Record,
    pub(crate) links: Vec<(String, Option<Record>)>,
}

impl Row {
    pub(crate) fn new(root: Record) -> Self {
        Self {
            root,
            links: Vec::new(),
        }
    }

    fn link(&self, alias: &str) -> Option<Option<&Record>> {
        self.links
            .iter()
            .rev()
            .find(|(name, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, record)| record.as_ref())
    }
}

/// Tables the evaluation can read, keyed by entity name.
pub(crate) trait Tables {
    fn metadata(&self, entity: &str) -> Option<&EntityMetadata>;
    fn records(&self, entity: &str) -> Vec<&Record>;
}

/// Value of `attribute` on `record`, the primary id reads the record identity and a
/// missing attribute reads as null.
pub(crate) fn attribute_value(
    record: &Record,
    metadata: Option<&EntityMetadata>,
    attribute: &str,
) -> Value {
    let is_primary_id = match metadata {
        Some(metadata) => metadata.is_primary_id(attribute),
        None => attribute.eq_ignore_ascii_case(&format!("{}id", record.entity)),
    };
    if is_primary_id {
        return Value::Uuid(record.id);
    }
    record.get(attribute).cloned().unwrap_or_default()
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Varchar(Some(v)) => Some(v.clone()),
        Value::OptionSet(Some(v)) => v.label.clone().or_else(|| Some(v.code.to_string())),
        v if v.is_null() => None,
        v => Some(v.to_string()),
    }
}

/// `%` matches any sequence and `_` any single char, case insensitive.
pub(crate) fn like(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase().chars().collect::<Vec<_>>();
    let pattern = pattern.to_lowercase().chars().collect::<Vec<_>>();
    let (mut v, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while v < value.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == value[v]) {
            v += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, v));
            p += 1;
        } else if let Some((bp, bv)) = backtrack {
            p = bp + 1;
            v = bv + 1;
            backtrack = Some((bp, bv + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn compare(value: &Value, operand: &Value, expected: impl Fn(Ordering) -> bool) -> bool {
    value.compare(operand).is_some_and(expected)
}

/// Whether `value` satisfies the condition. Comparisons never hold on nulls, only
/// `Null` and `NotNull` look at nullness.
pub(crate) fn condition_holds(value: &Value, condition: &ConditionExpression) -> bool {
    use ConditionOperator::*;
    let first = condition.values.first().cloned().unwrap_or_default();
    match condition.operator {
        Null => value.is_null(),
        NotNull => !value.is_null(),
        _ if value.is_null() => false,
        Equal => value.loose_eq(&first),
        NotEqual => !value.loose_eq(&first),
        Like | NotLike => {
            let matched = match (text(value), text(&first)) {
                (Some(value), Some(pattern)) => like(&value, &pattern),
                _ => false,
            };
            matched == (condition.operator == Like)
        }
        In => condition.values.iter().any(|v| value.loose_eq(v)),
        NotIn => !condition.values.iter().any(|v| value.loose_eq(v)),
        GreaterThan => compare(value, &first, Ordering::is_gt),
        GreaterEqual => compare(value, &first, Ordering::is_ge),
        LessThan => compare(value, &first, Ordering::is_lt),
        LessEqual => compare(value, &first, Ordering::is_le),
    }
}

/// Evaluates filters with conditions on `current` unless they name a link of `row`.
pub(crate) struct Scope<'a, T: Tables> {
    pub(crate) tables: &'a T,
    pub(crate) row: &'a Row,
    pub(crate) current: &'a Record,
}

impl<T: Tables> Scope<'_, T> {
    fn value(&self, alias: Option<&str>, attribute: &str) -> Value {
        let record = match alias {
            Some(alias) => match self.row.link(alias) {
                Some(Some(record)) => record,
                Some(None) => return Value::Null,
                None if self.row.root.entity.eq_ignore_ascii_case(alias) => &self.row.root,
                None => {
                    log::warn!("Condition on `{alias}.{attribute}` names no link of the query");
                    return Value::Null;
                }
            },
            None => self.current,
        };
        attribute_value(record, self.tables.metadata(&record.entity), attribute)
    }

    pub(crate) fn holds(&self, filter: &FilterExpression) -> bool {
        let mut results = filter
            .conditions
            .iter()
            .map(|v| condition_holds(&self.value(v.entity_alias.as_deref(), &v.attribute), v))
            .chain(filter.filters.iter().map(|v| self.holds(v)));
        match filter.operator {
            LogicalOperator::And => results.all(|v| v),
            LogicalOperator::Or => filter.is_empty() || results.any(|v| v),
        }
    }
}

/// Rows of `rows` joined with `link`, reading the parent side from `parent` (`None` for
/// the root record).
pub(crate) fn join<T: Tables>(
    tables: &T,
    rows: Vec<Row>,
    link: &LinkEntity,
    parent: Option<&str>,
) -> Vec<Row> {
    let name = link.reference_name().to_owned();
    let target = tables.metadata(&link.link_to_entity);
    let candidates = tables.records(&link.link_to_entity);
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let from = match parent {
            None => Some(&row.root),
            Some(parent) => row.link(parent).flatten(),
        };
        let key = from
            .map(|v| attribute_value(v, tables.metadata(&v.entity), &link.link_from_attribute))
            .unwrap_or_default();
        let mut matched = Vec::new();
        for candidate in &candidates {
            if !attribute_value(candidate, target, &link.link_to_attribute).loose_eq(&key) {
                continue;
            }
            let mut joined = row.clone();
            joined.links.push((name.clone(), Some((*candidate).clone())));
            let scope = Scope {
                tables,
                row: &joined,
                current: candidate,
            };
            if !scope.holds(&link.link_criteria) {
                continue;
            }
            let mut nested = vec![joined];
            for child in &link.link_entities {
                nested = join(tables, nested, child, Some(&name));
            }
            matched.extend(nested);
        }
        if matched.is_empty() && link.join_operator == JoinType::LeftOuter {
            let mut unmatched = row;
            unmatched.links.push((name.clone(), None));
            let mut unmatched = vec![unmatched];
            for child in &link.link_entities {
                unmatched = join(tables, unmatched, child, Some(&name));
            }
            result.extend(unmatched);
        } else {
            result.extend(matched);
        }
    }
    result
}

/// Sort `rows` on `orders`, nulls first when ascending.
pub(crate) fn sort<T: Tables>(tables: &T, rows: &mut [Row], orders: &[OrderExpression]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in orders {
            let (alias, attribute) = match order.attribute.split_once('.') {
                Some((alias, attribute)) => (Some(alias), attribute),
                None => (None, order.attribute.as_str()),
            };
            let value = |row: &Row| {
                Scope {
                    tables,
                    row,
                    current: &row.root,
                }
                .value(alias, attribute)
            };
            let (l, r) = (value(a), value(b));
            let ordering = match (l.is_null(), r.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => l.compare(&r).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.order {
                Order::ASC => ordering,
                Order::DESC => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Keep the columns of `columns` on `record`, the identity always stays.
pub(crate) fn project(
    record: &Record,
    metadata: Option<&EntityMetadata>,
    columns: &ColumnSet,
) -> Record {
    let mut result = Record::new(&record.entity);
    result.id = record.id;
    match columns {
        ColumnSet::All => result.attributes = record.attributes.clone(),
        ColumnSet::Columns(columns) => {
            for column in columns {
                let value = attribute_value(record, metadata, column);
                if record.contains(column) || !value.is_null() {
                    result.set(column, value);
                }
            }
        }
    }
    result
}

/// The output record of `row`: the projected root plus the columns of every matched link,
/// named `alias.attribute`.
pub(crate) fn output<T: Tables>(
    tables: &T,
    row: &Row,
    columns: &ColumnSet,
    links: &[LinkEntity],
) -> Record {
    fn link_columns<T: Tables>(tables: &T, row: &Row, links: &[LinkEntity], output: &mut Record) {
        for link in links {
            let name = link.reference_name();
            if let Some(Some(record)) = row.link(name) {
                let metadata = tables.metadata(&record.entity);
                for column in &link.columns {
                    output.set(
                        format!("{name}.{column}"),
                        attribute_value(record, metadata, column),
                    );
                }
            }
            link_columns(tables, row, &link.link_entities, output);
        }
    }
    let mut result = project(&row.root, tables.metadata(&row.root.entity), columns);
    link_columns(tables, row, links, &mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::like;

    #[test]
    fn like_patterns() {
        assert!(like("Robert", "rob%"));
        assert!(like("Robert", "%BERT"));
        assert!(like("Robert", "r_bert"));
        assert!(like("Robert", "%o%e%"));
        assert!(like("", "%"));
        assert!(!like("Robert", "rob"));
        assert!(!like("Rob", "rob_"));
        assert!(!like("Robert", "%x%"));
    }
}
