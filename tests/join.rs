#[cfg(test)]
mod tests {
    use quarry::{
        AttributeMetadata, AttributeType, Catalog, EntityMetadata, JoinCompiler, JoinInput,
        JoinType, LinkEntity, QuarryError,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        Catalog::new()
            .with(Arc::new(
                EntityMetadata::new("account")
                    .primary_name("name")
                    .attribute(AttributeMetadata::new("name", AttributeType::String))
                    .attribute(AttributeMetadata::new("revenue", AttributeType::Money))
                    .attribute(
                        AttributeMetadata::new("primarycontactid", AttributeType::Lookup)
                            .targets(["contact"]),
                    ),
            ))
            .with(Arc::new(
                EntityMetadata::new("contact")
                    .primary_name("fullname")
                    .attribute(AttributeMetadata::new("fullname", AttributeType::String))
                    .attribute(
                        AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
                            .targets(["account", "contact"]),
                    ),
            ))
    }

    fn compile(catalog: &Catalog, join: serde_json::Value) -> quarry::Result<LinkEntity> {
        JoinCompiler::new(catalog).compile("contact", &JoinInput::from(join))
    }

    #[test]
    fn join_types() {
        for name in ["inner", "INNER JOIN", "Inner_Join"] {
            assert_eq!(JoinType::parse(name).unwrap(), JoinType::Inner, "{name}");
        }
        for name in ["left", "LeftOuter", "left outer", "left-outer-join", "outer", "Left Join"] {
            assert_eq!(JoinType::parse(name).unwrap(), JoinType::LeftOuter, "{name}");
        }
        for name in ["right", "full outer", "", "inner left"] {
            let error = JoinType::parse(name).expect_err(name);
            assert!(matches!(
                QuarryError::of(&error),
                Some(QuarryError::InvalidJoin(..))
            ));
        }
        assert_eq!(JoinType::default(), JoinType::Inner);
        assert_eq!(JoinType::LeftOuter.fetch_name(), "outer");
    }

    #[test]
    fn simplified() {
        let catalog = catalog();
        let link = compile(
            &catalog,
            json!({
                "contact.parentcustomerid": "account.accountid",
                "type": "left outer",
                "alias": "a",
                "columns": ["name", "revenue"],
                "filter": { "revenue": { "operator": "gt", "value": "1000" } },
            }),
        )
        .unwrap();
        assert_eq!(link.link_from_entity, "contact");
        assert_eq!(link.link_from_attribute, "parentcustomerid");
        assert_eq!(link.link_to_entity, "account");
        assert_eq!(link.link_to_attribute, "accountid");
        assert_eq!(link.join_operator, JoinType::LeftOuter);
        assert_eq!(link.reference_name(), "a");
        assert_eq!(link.columns, ["name", "revenue"]);
        assert_eq!(link.link_criteria.to_string(), "(revenue GreaterThan 1000)");
        assert_eq!(
            link.to_string(),
            "LeftOuter join account as a on contact.parentcustomerid = a.accountid where (revenue GreaterThan 1000)"
        );

        // The linking side may be written on the right
        let reversed = compile(
            &catalog,
            json!({ "account.accountid": "contact.parentcustomerid" }),
        )
        .unwrap();
        assert_eq!(
            reversed,
            LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
        );
    }

    #[test]
    fn nested() {
        let catalog = catalog();
        let link = compile(
            &catalog,
            json!({
                "contact.parentcustomerid": "account.accountid",
                "alias": "a",
                "links": {
                    "a.primarycontactid": "contact.contactid",
                    "alias": "pc",
                    "columns": "fullname",
                    "filter": { "fullname": { "operator": "like", "value": "R%" } },
                },
            }),
        )
        .unwrap();
        assert_eq!(link.link_entities.len(), 1);
        let child = &link.link_entities[0];
        assert_eq!(child.link_from_entity, "a");
        assert_eq!(child.link_to_entity, "contact");
        assert_eq!(child.reference_name(), "pc");
        assert_eq!(child.columns, ["fullname"]);
        assert_eq!(child.link_criteria.to_string(), "(fullname Like R%)");

        // Children may name the linked entity instead of its alias
        let link = compile(
            &catalog,
            json!({
                "contact.parentcustomerid": "account.accountid",
                "alias": "a",
                "links": [{ "account.primarycontactid": "contact.contactid" }],
            }),
        )
        .unwrap();
        assert_eq!(link.link_entities[0].link_from_entity, "account");
    }

    #[test]
    fn malformed() {
        let catalog = catalog();
        let invalid = [
            json!({ "alias": "a" }),
            json!("contact.parentcustomerid"),
            json!({ "contact.parentcustomerid": 5 }),
            json!({ "contact.parentcustomerid": "accountid" }),
            json!({ "lead.parentcontactid": "account.accountid" }),
            json!({ "contact.parentcustomerid": "account.accountid", "type": "cross" }),
            json!({ "contact.parentcustomerid": "account.accountid", "alias": 3 }),
            json!({ "contact.parentcustomerid": "account.accountid", "columns": [1] }),
            json!({
                "contact.parentcustomerid": "account.accountid",
                "links": [{ "lead.x": "contact.contactid" }],
            }),
        ];
        for case in invalid {
            let error = compile(&catalog, case.clone()).expect_err(&case.to_string());
            assert!(
                matches!(QuarryError::of(&error), Some(QuarryError::InvalidJoin(..))),
                "{case}: {error:#}"
            );
        }
        let error = compile(
            &catalog,
            json!({
                "contact.parentcustomerid": "account.accountid",
                "contact.contactid": "account.primarycontactid",
            }),
        )
        .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::AmbiguousJoin(..))
        ));
        let error = compile(
            &catalog,
            json!({
                "contact.parentcustomerid": "account.accountid",
                "filter": { "shoesize": 42 },
            }),
        )
        .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn native() {
        let catalog = catalog();
        let compiler = JoinCompiler::new(&catalog);
        let link = LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
            .alias("a")
            .join_type(JoinType::LeftOuter)
            .link(LinkEntity::new("a", "primarycontactid", "contact", "contactid"));
        assert_eq!(
            compiler.compile("contact", &link.clone().into()).unwrap(),
            link
        );
        let error = compiler
            .compile("account", &link.into())
            .expect_err("The link does not start from account");
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::InvalidJoin(..))
        ));
        let orphan = LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
            .link(LinkEntity::new("lead", "x", "contact", "contactid"));
        assert!(compiler.compile("contact", &orphan.into()).is_err());
    }
}
