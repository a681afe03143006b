use crate::{
    ColumnSet, ConditionExpression, ConditionOperator, Error, FilterExpression, JoinType,
    LinkEntity, LogicalOperator, Order, OrderExpression, PageInfo, QuarryError, QueryExpression,
    Result, Value, consume_while, truncate_long,
};

/// Minimal XML element tree, enough for the query dialect.
#[derive(Debug, Default, Clone, PartialEq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
    fn required(&self, name: &str) -> Result<&str> {
        self.attribute(name).ok_or_else(|| {
            format_error(format!(
                "`<{}>` is missing the `{name}` attribute",
                self.name
            ))
        })
    }
    fn flag(&self, name: &str) -> bool {
        self.attribute(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
    }
    fn number(&self, name: &str) -> Result<Option<u32>> {
        self.attribute(name)
            .map(|v| {
                v.trim().parse::<u32>().map_err(|e| {
                    format_error(format!("invalid `{name}` value `{v}` on `<{}>`: {e}", self.name))
                })
            })
            .transpose()
    }
}

fn format_error(message: String) -> Error {
    Error::new(QuarryError::Format(message))
}

fn skip_whitespace(input: &mut &str) {
    consume_while(input, char::is_whitespace);
}

fn expect(input: &mut &str, token: &str) -> Result<()> {
    match input.strip_prefix(token) {
        Some(rest) => {
            *input = rest;
            Ok(())
        }
        None => Err(format_error(format!(
            "expected `{token}` at `{}`",
            truncate_long!(input)
        ))),
    }
}

/// Skip the prolog, comments and processing instructions.
fn skip_misc(input: &mut &str) -> Result<()> {
    loop {
        skip_whitespace(input);
        let end = if input.starts_with("<?") {
            "?>"
        } else if input.starts_with("<!--") {
            "-->"
        } else {
            return Ok(());
        };
        let Some(position) = input.find(end) else {
            return Err(format_error(format!(
                "unterminated `{}`",
                truncate_long!(input)
            )));
        };
        *input = &input[position + end.len()..];
    }
}

fn decode(value: &str) -> Result<String> {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(position) = rest.find('&') {
        result.push_str(&rest[..position]);
        rest = &rest[position + 1..];
        let Some(end) = rest.find(';') else {
            return Err(format_error(format!("unterminated entity in `{value}`")));
        };
        let entity = &rest[..end];
        let decoded = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(decimal) = entity.strip_prefix('#') {
                    decimal.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32).ok_or_else(|| {
                    format_error(format!("unknown entity `&{entity};` in `{value}`"))
                })?
            }
        };
        result.push(decoded);
        rest = &rest[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn parse_element(input: &mut &str) -> Result<Element> {
    expect(input, "<")?;
    let name = consume_while(input, is_name_char);
    if name.is_empty() {
        return Err(format_error(format!(
            "expected an element name at `{}`",
            truncate_long!(input)
        )));
    }
    let mut element = Element {
        name: name.to_owned(),
        ..Default::default()
    };
    loop {
        skip_whitespace(input);
        if input.starts_with("/>") {
            *input = &input[2..];
            return Ok(element);
        }
        if input.starts_with('>') {
            *input = &input[1..];
            break;
        }
        let key = consume_while(input, is_name_char);
        if key.is_empty() {
            return Err(format_error(format!(
                "unexpected input in `<{name}>` at `{}`",
                truncate_long!(input)
            )));
        }
        skip_whitespace(input);
        expect(input, "=")?;
        skip_whitespace(input);
        let quote = match input.chars().next() {
            Some(c @ ('"' | '\'')) => c,
            _ => {
                return Err(format_error(format!(
                    "expected a quoted value for `{key}` in `<{name}>`"
                )));
            }
        };
        *input = &input[1..];
        let value = consume_while(input, |c| c != quote);
        expect(input, &quote.to_string())?;
        element.attributes.push((key.to_owned(), decode(value)?));
    }
    loop {
        skip_misc(input)?;
        if input.starts_with("</") {
            *input = &input[2..];
            let closing = consume_while(input, is_name_char);
            if closing != element.name {
                return Err(format_error(format!(
                    "`<{}>` closed by `</{closing}>`",
                    element.name
                )));
            }
            skip_whitespace(input);
            expect(input, ">")?;
            element.text = element.text.trim().to_owned();
            return Ok(element);
        }
        if input.starts_with('<') {
            element.children.push(parse_element(input)?);
            continue;
        }
        if input.is_empty() {
            return Err(format_error(format!("unterminated `<{}>`", element.name)));
        }
        let text = consume_while(input, |c| c != '<');
        element.text.push_str(&decode(text)?);
    }
}

fn parse_condition(element: &Element) -> Result<ConditionExpression> {
    let attribute = element.required("attribute")?;
    let operator = ConditionOperator::parse(element.required("operator")?)?;
    let mut values = element
        .children
        .iter()
        .filter(|v| v.name == "value")
        .map(|v| Value::Varchar(Some(v.text.clone())))
        .collect::<Vec<_>>();
    if let Some(value) = element.attribute("value") {
        values.insert(0, Value::Varchar(Some(value.to_owned())));
    }
    let mut condition = ConditionExpression::new(attribute, operator, values);
    if let Some(alias) = element.attribute("entityname") {
        condition = condition.with_alias(alias);
    }
    Ok(condition)
}

fn parse_filter(element: &Element) -> Result<FilterExpression> {
    let operator = match element.attribute("type") {
        None => LogicalOperator::And,
        Some(v) if v.eq_ignore_ascii_case("and") => LogicalOperator::And,
        Some(v) if v.eq_ignore_ascii_case("or") => LogicalOperator::Or,
        Some(v) => {
            return Err(format_error(format!(
                "unknown filter type `{v}`, expected and or or"
            )));
        }
    };
    let mut filter = FilterExpression::new(operator);
    for child in &element.children {
        match child.name.as_str() {
            "condition" => filter.conditions.push(parse_condition(child)?),
            "filter" => filter.filters.push(parse_filter(child)?),
            other => {
                return Err(format_error(format!("unexpected `<{other}>` in `<filter>`")));
            }
        }
    }
    Ok(filter)
}

fn parse_link(parent: &str, element: &Element) -> Result<LinkEntity> {
    let mut link = LinkEntity::new(
        parent,
        element.required("to")?,
        element.required("name")?,
        element.required("from")?,
    );
    if let Some(join_type) = element.attribute("link-type") {
        link.join_operator = JoinType::parse(join_type)?;
    }
    link.entity_alias = element.attribute("alias").map(str::to_owned);
    for child in &element.children {
        match child.name.as_str() {
            "attribute" => link.columns.push(child.required("name")?.to_owned()),
            "all-attributes" => {}
            "filter" => {
                let filter = parse_filter(child)?;
                link.link_criteria = std::mem::take(&mut link.link_criteria).and_also(filter);
            }
            "link-entity" => {
                let nested = parse_link(link.reference_name(), child)?;
                link.link_entities.push(nested);
            }
            other => {
                return Err(format_error(format!(
                    "unexpected `<{other}>` in `<link-entity>`"
                )));
            }
        }
    }
    Ok(link)
}

impl QueryExpression {
    /// Parse the XML query dialect. Condition values are kept as text, the service
    /// compares them with the typed attribute values.
    pub fn from_fetch_xml(xml: &str) -> Result<QueryExpression> {
        let mut input = xml.trim_start_matches('\u{feff}');
        skip_misc(&mut input)?;
        let fetch = parse_element(&mut input)?;
        skip_misc(&mut input)?;
        if !input.trim().is_empty() {
            return Err(format_error(format!(
                "unexpected content after `</fetch>`: `{}`",
                truncate_long!(input)
            )));
        }
        if fetch.name != "fetch" {
            return Err(format_error(format!(
                "expected `<fetch>` as root, found `<{}>`",
                fetch.name
            )));
        }
        let mut entities = fetch.children.iter().filter(|v| v.name == "entity");
        let (Some(entity), None) = (entities.next(), entities.next()) else {
            return Err(format_error("`<fetch>` must contain exactly one `<entity>`".into()));
        };
        let mut query = QueryExpression::new(entity.required("name")?);
        query.top = fetch.number("top")?;
        if let Some(count) = fetch.number("count")? {
            let mut page = PageInfo::new(count);
            page.page_number = fetch.number("page")?.unwrap_or(1);
            page.paging_cookie = fetch.attribute("paging-cookie").map(str::to_owned);
            query.page_info = Some(page);
        }
        query.return_total_record_count = fetch.flag("returntotalrecordcount");
        let mut columns = Vec::new();
        let mut all = false;
        for child in &entity.children {
            match child.name.as_str() {
                "attribute" => columns.push(child.required("name")?.to_owned()),
                "all-attributes" => all = true,
                "order" => query.orders.push(OrderExpression::new(
                    child.required("attribute")?,
                    if child.flag("descending") {
                        Order::DESC
                    } else {
                        Order::ASC
                    },
                )),
                "filter" => {
                    let filter = parse_filter(child)?;
                    query.criteria = std::mem::take(&mut query.criteria).and_also(filter);
                }
                "link-entity" => {
                    let link = parse_link(&query.entity_name, child)?;
                    query.link_entities.push(link);
                }
                other => {
                    return Err(format_error(format!("unexpected `<{other}>` in `<entity>`")));
                }
            }
        }
        query.columns = if all || columns.is_empty() {
            ColumnSet::All
        } else {
            ColumnSet::Columns(columns)
        };
        log::debug!("Parsed query {}", truncate_long!(query.to_fetch_xml()));
        Ok(query)
    }
}
