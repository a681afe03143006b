use crate::{
    ColumnSet, ConditionExpression, FilterExpression, LinkEntity, Order, OrderExpression,
    QueryExpression, Value,
    writer::{Context, Fragment},
};
use std::fmt::Write;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Printer of the XML query dialect.
///
/// Every method has a default implementation, implementors override the pieces their
/// service renders differently.
pub trait FetchXmlWriter {
    fn as_dyn(&self) -> &dyn FetchXmlWriter;

    /// Escape the XML special chars while copying into buffer.
    fn write_escaped(&self, _context: &mut Context, out: &mut String, value: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            let replace = match c {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' => "&quot;",
                '\'' => "&apos;",
                _ => continue,
            };
            out.push_str(&value[position..i]);
            out.push_str(replace);
            position = i + c.len_utf8();
        }
        out.push_str(&value[position..]);
    }

    fn write_indent(&self, context: &mut Context, out: &mut String) {
        if context.pretty {
            if !out.is_empty() {
                out.push('\n');
            }
            for _ in 0..context.depth {
                out.push_str("  ");
            }
        }
    }

    fn write_attribute(&self, context: &mut Context, out: &mut String, name: &str, value: &str) {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        self.write_escaped(context, out, value);
        out.push('"');
    }

    /// Text form of a value inside an attribute or a `<value>` element.
    fn write_value(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            v if v.is_null() => {}
            Value::Boolean(Some(v)) => out.push_str(["0", "1"][*v as usize]),
            Value::Int32(Some(v)) => write_integer!(out, *v),
            Value::Int64(Some(v)) => write_integer!(out, *v),
            Value::Float64(Some(v)) => {
                let mut buffer = ryu::Buffer::new();
                out.push_str(buffer.format(*v));
            }
            Value::OptionSet(Some(v)) => write_integer!(out, v.code),
            Value::Varchar(Some(v)) => self.write_escaped(context, out, v),
            _ => {
                let _ = write!(out, "{value}");
            }
        }
    }

    fn write_order(&self, context: &mut Context, out: &mut String, order: &OrderExpression) {
        self.write_indent(context, out);
        out.push_str("<order");
        self.write_attribute(context, out, "attribute", &order.attribute);
        if order.order == Order::DESC {
            self.write_attribute(context, out, "descending", "true");
        }
        out.push_str("/>");
    }

    fn write_columns(&self, context: &mut Context, out: &mut String, columns: &ColumnSet) {
        match columns {
            ColumnSet::All => {
                self.write_indent(context, out);
                out.push_str("<all-attributes/>");
            }
            ColumnSet::Columns(columns) => {
                for column in columns {
                    self.write_indent(context, out);
                    out.push_str("<attribute");
                    self.write_attribute(context, out, "name", column);
                    out.push_str("/>");
                }
            }
        }
    }

    fn write_condition(
        &self,
        context: &mut Context,
        out: &mut String,
        condition: &ConditionExpression,
    ) {
        self.write_indent(context, out);
        out.push_str("<condition");
        if let Some(alias) = &condition.entity_alias
            && context.fragment != Fragment::LinkEntity
        {
            self.write_attribute(context, out, "entityname", alias);
        }
        self.write_attribute(context, out, "attribute", &condition.attribute);
        self.write_attribute(context, out, "operator", condition.operator.fetch_name());
        match condition.values.as_slice() {
            [] => out.push_str("/>"),
            [value] if !condition.operator.is_membership() => {
                out.push_str(" value=\"");
                self.write_value(context, out, value);
                out.push_str("\"/>");
            }
            values => {
                out.push('>');
                let mut nested = context.nested(context.fragment);
                for value in values {
                    self.write_indent(&mut nested, out);
                    out.push_str("<value>");
                    self.write_value(&mut nested, out, value);
                    out.push_str("</value>");
                }
                self.write_indent(context, out);
                out.push_str("</condition>");
            }
        }
    }

    fn write_filter(&self, context: &mut Context, out: &mut String, filter: &FilterExpression) {
        if filter.is_empty() {
            return;
        }
        self.write_indent(context, out);
        out.push_str("<filter");
        self.write_attribute(context, out, "type", &filter.operator.to_string());
        out.push('>');
        let fragment = match context.fragment {
            Fragment::LinkEntity => Fragment::LinkEntity,
            _ => Fragment::Filter,
        };
        let mut nested = context.nested(fragment);
        for condition in &filter.conditions {
            self.write_condition(&mut nested, out, condition);
        }
        for filter in &filter.filters {
            self.write_filter(&mut nested, out, filter);
        }
        self.write_indent(context, out);
        out.push_str("</filter>");
    }

    fn write_link_entity(&self, context: &mut Context, out: &mut String, link: &LinkEntity) {
        self.write_indent(context, out);
        out.push_str("<link-entity");
        self.write_attribute(context, out, "name", &link.link_to_entity);
        self.write_attribute(context, out, "from", &link.link_to_attribute);
        self.write_attribute(context, out, "to", &link.link_from_attribute);
        self.write_attribute(context, out, "link-type", link.join_operator.fetch_name());
        if let Some(alias) = &link.entity_alias {
            self.write_attribute(context, out, "alias", alias);
        }
        if link.columns.is_empty() && link.link_criteria.is_empty() && link.link_entities.is_empty()
        {
            out.push_str("/>");
            return;
        }
        out.push('>');
        let mut nested = context.nested(Fragment::LinkEntity);
        self.write_columns(&mut nested, out, &ColumnSet::Columns(link.columns.clone()));
        self.write_filter(&mut nested, out, &link.link_criteria);
        for child in &link.link_entities {
            self.write_link_entity(&mut nested, out, child);
        }
        self.write_indent(context, out);
        out.push_str("</link-entity>");
    }

    fn write_query(&self, context: &mut Context, out: &mut String, query: &QueryExpression) {
        self.write_indent(context, out);
        out.push_str("<fetch");
        if let Some(top) = query.top {
            self.write_attribute(context, out, "top", itoa::Buffer::new().format(top));
        }
        if let Some(page) = &query.page_info {
            self.write_attribute(context, out, "count", itoa::Buffer::new().format(page.count));
            self.write_attribute(
                context,
                out,
                "page",
                itoa::Buffer::new().format(page.page_number),
            );
            if let Some(cookie) = &page.paging_cookie {
                self.write_attribute(context, out, "paging-cookie", cookie);
            }
        }
        if query.return_total_record_count {
            self.write_attribute(context, out, "returntotalrecordcount", "true");
        }
        out.push('>');
        let mut entity = context.nested(Fragment::Entity);
        self.write_indent(&mut entity, out);
        out.push_str("<entity");
        self.write_attribute(&mut entity, out, "name", &query.entity_name);
        out.push('>');
        let mut nested = entity.nested(Fragment::Entity);
        self.write_columns(&mut nested, out, &query.columns);
        for order in &query.orders {
            self.write_order(&mut nested, out, order);
        }
        self.write_filter(&mut nested, out, &query.criteria);
        for link in &query.link_entities {
            self.write_link_entity(&mut nested, out, link);
        }
        self.write_indent(&mut entity, out);
        out.push_str("</entity>");
        self.write_indent(context, out);
        out.push_str("</fetch>");
    }
}

/// The dialect as the service reads it.
#[derive(Default, Debug, Clone, Copy)]
pub struct FetchXml;

impl FetchXmlWriter for FetchXml {
    fn as_dyn(&self) -> &dyn FetchXmlWriter {
        self
    }
}

impl QueryExpression {
    /// Single line XML rendering of the query.
    pub fn to_fetch_xml(&self) -> String {
        let mut out = String::with_capacity(256);
        FetchXml.write_query(&mut Context::default(), &mut out, self);
        out
    }

    /// Indented XML rendering of the query.
    pub fn to_fetch_xml_pretty(&self) -> String {
        let mut out = String::with_capacity(512);
        FetchXml.write_query(&mut Context::new(Fragment::Fetch, true), &mut out, self);
        out
    }
}
