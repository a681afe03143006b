use crate::{
    Catalog, Error, FilterCompiler, FilterExpression, QuarryError, Result, truncate_long,
};
use std::fmt::{self, Display, Formatter};

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Inner,
    LeftOuter,
}

impl JoinType {
    /// Case insensitive, whitespace and `-`/`_` between words are ignored.
    pub fn parse(value: &str) -> Result<Self> {
        let patterns: &[(&[&str], JoinType)] = &[
            (&["inner"], JoinType::Inner),
            (&["inner", "join"], JoinType::Inner),
            (&["left"], JoinType::LeftOuter),
            (&["left", "outer"], JoinType::LeftOuter),
            (&["leftouter"], JoinType::LeftOuter),
            (&["left", "join"], JoinType::LeftOuter),
            (&["left", "outer", "join"], JoinType::LeftOuter),
            (&["outer"], JoinType::LeftOuter),
        ];
        let words = value
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase)
            .collect::<Vec<_>>();
        for (keywords, join_type) in patterns {
            if words.iter().map(String::as_str).eq(keywords.iter().copied()) {
                return Ok(*join_type);
            }
        }
        Err(Error::new(QuarryError::InvalidJoin(format!(
            "unknown join type `{value}`, expected Inner or LeftOuter"
        ))))
    }

    pub fn fetch_name(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::LeftOuter => "outer",
        }
    }
}

impl Display for JoinType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Inner => "Inner",
            JoinType::LeftOuter => "LeftOuter",
        })
    }
}

/// Native link between the records of two entities.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct LinkEntity {
    pub link_from_entity: String,
    pub link_from_attribute: String,
    pub link_to_entity: String,
    pub link_to_attribute: String,
    pub join_operator: JoinType,
    pub entity_alias: Option<String>,
    pub link_criteria: FilterExpression,
    pub link_entities: Vec<LinkEntity>,
    /// Attributes of the linked entity returned as `alias.attribute`.
    pub columns: Vec<String>,
}

impl LinkEntity {
    pub fn new(
        from_entity: impl Into<String>,
        from_attribute: impl Into<String>,
        to_entity: impl Into<String>,
        to_attribute: impl Into<String>,
    ) -> Self {
        Self {
            link_from_entity: from_entity.into(),
            link_from_attribute: from_attribute.into(),
            link_to_entity: to_entity.into(),
            link_to_attribute: to_attribute.into(),
            ..Default::default()
        }
    }
    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_operator = join_type;
        self
    }
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.entity_alias = Some(alias.into());
        self
    }
    pub fn criteria(mut self, criteria: FilterExpression) -> Self {
        self.link_criteria = criteria;
        self
    }
    pub fn link(mut self, link: LinkEntity) -> Self {
        self.link_entities.push(link);
        self
    }
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
    /// Name other links and qualified columns use to refer to this one.
    pub fn reference_name(&self) -> &str {
        self.entity_alias.as_deref().unwrap_or(&self.link_to_entity)
    }
}

impl Display for LinkEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} join {}",
            self.join_operator, self.link_to_entity
        )?;
        if let Some(alias) = &self.entity_alias {
            write!(f, " as {alias}")?;
        }
        write!(
            f,
            " on {}.{} = {}.{}",
            self.link_from_entity,
            self.link_from_attribute,
            self.reference_name(),
            self.link_to_attribute
        )?;
        if !self.link_criteria.is_empty() {
            write!(f, " where {}", self.link_criteria)?;
        }
        for link in &self.link_entities {
            write!(f, " [{link}]")?;
        }
        Ok(())
    }
}

/// Join input, classified before compilation.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinInput {
    Native(LinkEntity),
    /// `{"a.x": "b.y", "type": .., "alias": .., "filter": .., "links": [..]}`
    Simplified(serde_json::Value),
}

impl From<LinkEntity> for JoinInput {
    fn from(value: LinkEntity) -> Self {
        JoinInput::Native(value)
    }
}

impl From<serde_json::Value> for JoinInput {
    fn from(value: serde_json::Value) -> Self {
        JoinInput::Simplified(value)
    }
}

const JOIN_KEYS: [&str; 5] = ["type", "alias", "filter", "links", "columns"];

fn invalid(message: String) -> Error {
    Error::new(QuarryError::InvalidJoin(message))
}

fn split_qualified<'s>(value: &'s str, context: &str) -> Result<(&'s str, &'s str)> {
    match value.split_once('.') {
        Some((entity, attribute)) if !entity.is_empty() && !attribute.is_empty() => {
            Ok((entity.trim(), attribute.trim()))
        }
        _ => Err(invalid(format!(
            "expected `entity.attribute` in {context}, found `{value}`"
        ))),
    }
}

/// Compiles [`JoinInput`]s, linked filters are typed with the metadata found in the
/// catalog.
pub struct JoinCompiler<'a> {
    catalog: &'a Catalog,
}

impl<'a> JoinCompiler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Compile a join hanging from `parent`, the entity name or alias of the linking side.
    pub fn compile(&self, parent: &str, input: &JoinInput) -> Result<LinkEntity> {
        match input {
            JoinInput::Native(link) => {
                self.validate(parent, link)?;
                Ok(link.clone())
            }
            JoinInput::Simplified(value) => self.compile_simplified(&[parent], value),
        }
    }

    fn validate(&self, parent: &str, link: &LinkEntity) -> Result<()> {
        if !link.link_from_entity.eq_ignore_ascii_case(parent) {
            return Err(invalid(format!(
                "the link to `{}` starts from `{}` but hangs from `{parent}`",
                link.link_to_entity, link.link_from_entity
            )));
        }
        for child in &link.link_entities {
            if child
                .link_from_entity
                .eq_ignore_ascii_case(&link.link_to_entity)
            {
                self.validate(&link.link_to_entity, child)?;
            } else {
                self.validate(link.reference_name(), child)?;
            }
        }
        Ok(())
    }

    fn compile_simplified(
        &self,
        parents: &[&str],
        value: &serde_json::Value,
    ) -> Result<LinkEntity> {
        let is_parent = |entity: &str| parents.iter().any(|p| p.eq_ignore_ascii_case(entity));
        let serde_json::Value::Object(map) = value else {
            return Err(invalid(format!(
                "expected a join map, found `{}`",
                truncate_long!(value.to_string())
            )));
        };
        let pairs = map
            .iter()
            .filter(|(k, _)| !JOIN_KEYS.iter().any(|j| k.eq_ignore_ascii_case(j)))
            .collect::<Vec<_>>();
        let (left, right) = match pairs.as_slice() {
            [(k, serde_json::Value::String(v))] => (k.as_str(), v.as_str()),
            [(k, v)] => {
                return Err(invalid(format!(
                    "the target of `{k}` must be an `entity.attribute` string, found `{v}`"
                )));
            }
            [] => {
                return Err(invalid(format!(
                    "no `entity.attribute` pair in the join `{}`",
                    truncate_long!(value.to_string())
                )));
            }
            _ => {
                return Err(Error::new(QuarryError::AmbiguousJoin(format!(
                    "a join must have exactly one `entity.attribute` pair, found {}",
                    pairs
                        .iter()
                        .map(|(k, _)| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))));
            }
        };
        let left = split_qualified(left, "the join key")?;
        let right = split_qualified(right, "the join target")?;
        let ((from_entity, from_attribute), (to_entity, to_attribute)) =
            if is_parent(left.0) {
                (left, right)
            } else if is_parent(right.0) {
                (right, left)
            } else {
                return Err(invalid(format!(
                    "neither `{}` nor `{}` is the linking entity `{}`",
                    left.0,
                    right.0,
                    parents.join("` or `")
                )));
            };
        let mut link = LinkEntity::new(from_entity, from_attribute, to_entity, to_attribute);
        let get = |key: &str| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };
        if let Some(join_type) = get("type") {
            let name = join_type.as_str().ok_or_else(|| {
                invalid(format!(
                    "the join type must be a string, found `{join_type}`"
                ))
            })?;
            link.join_operator = JoinType::parse(name)?;
        }
        match get("alias") {
            Some(serde_json::Value::String(v)) if !v.is_empty() => {
                link.entity_alias = Some(v.clone())
            }
            None | Some(serde_json::Value::Null) => {}
            Some(other) => {
                return Err(invalid(format!(
                    "the join alias must be a string, found `{other}`"
                )));
            }
        }
        match get("columns") {
            Some(serde_json::Value::Array(items)) => {
                link.columns = items
                    .iter()
                    .map(|v| {
                        v.as_str().map(str::to_owned).ok_or_else(|| {
                            invalid(format!("the join columns must be strings, found `{v}`"))
                        })
                    })
                    .collect::<Result<_>>()?;
            }
            Some(serde_json::Value::String(v)) => link.columns = vec![v.clone()],
            _ => {}
        }
        if let Some(filter) = get("filter").filter(|v| !v.is_null()) {
            let metadata = self.catalog.get(&link.link_to_entity);
            link.link_criteria = FilterCompiler::new(metadata.map(AsRef::as_ref))
                .with_entity(&link.link_to_entity)
                .compile_loose(filter)
                .map_err(|e| e.context(format!("While compiling the filter of {link}")))?;
        }
        let children = match get("links") {
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(v @ serde_json::Value::Object(..)) => vec![v.clone()],
            _ => Vec::new(),
        };
        for child in children {
            let parents = [link.link_to_entity.as_str(), link.reference_name()];
            let child = self.compile_simplified(&parents, &child)?;
            link.link_entities.push(child);
        }
        log::debug!("Compiled join {link}");
        Ok(link)
    }
}
