#[cfg(test)]
mod tests {
    use quarry::{
        AttributeMetadata, AttributeType, Catalog, ColumnSet, EntityMetadata, Order,
        OrderExpression, QuarryError, QueryBuilder,
    };
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn catalog() -> Catalog {
        Catalog::new()
            .with(Arc::new(
                EntityMetadata::new("contact")
                    .primary_name("fullname")
                    .attribute(AttributeMetadata::new("firstname", AttributeType::String))
                    .attribute(AttributeMetadata::new("lastname", AttributeType::String))
                    .attribute(AttributeMetadata::new("fullname", AttributeType::String))
                    .attribute(
                        AttributeMetadata::new("accountrolecode", AttributeType::Picklist)
                            .options([(1, "Decision Maker")]),
                    )
                    .attribute(
                        AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
                            .targets(["account"]),
                    ),
            ))
            .with(Arc::new(
                EntityMetadata::new("account")
                    .primary_name("name")
                    .attribute(AttributeMetadata::new("name", AttributeType::String)),
            ))
    }

    #[test]
    fn orders() {
        assert_eq!(
            OrderExpression::parse("lastname-"),
            OrderExpression::new("lastname", Order::DESC)
        );
        assert_eq!(
            OrderExpression::parse(" firstname+ "),
            OrderExpression::new("firstname", Order::ASC)
        );
        assert_eq!(
            OrderExpression::parse("fullname"),
            OrderExpression::new("fullname", Order::ASC)
        );
    }

    #[test]
    fn selection() {
        let excluded = Uuid::parse_str("00000000-0000-4000-8000-00000000000a").unwrap();
        let selected = Uuid::parse_str("00000000-0000-4000-8000-00000000000b").unwrap();
        let query = QueryBuilder::new("contact")
            .filter(json!({ "firstname": "Rob" }))
            .exclude_filter(json!({ "lastname": "One" }))
            .exclude_ids([excluded])
            .ids([selected])
            .names(["Rob Two"])
            .build(&catalog())
            .unwrap();
        let criteria = query.criteria.to_string();
        assert!(criteria.contains("(firstname Equal Rob)"), "{criteria}");
        assert!(
            criteria.contains("(lastname NotEqual One or lastname Null)"),
            "{criteria}"
        );
        assert!(
            criteria.contains(&format!("(contactid NotIn ({excluded}) or contactid Null)")),
            "{criteria}"
        );
        assert!(
            criteria.contains(&format!("contactid In ({selected})")),
            "{criteria}"
        );
        assert!(criteria.contains("fullname In (Rob Two)"), "{criteria}");
        assert_eq!(query.criteria.condition_count(), 7);

        // Nothing to select
        let query = QueryBuilder::new("contact").build(&catalog()).unwrap();
        assert!(query.criteria.is_empty());
        assert_eq!(query.columns, ColumnSet::All);
    }

    #[test]
    fn columns_and_paging() {
        let query = QueryBuilder::new("contact")
            .columns(["fullname", "accountrolecode:Display", "ACCOUNTROLECODE"])
            .order_by("lastname-")
            .order_by("firstname")
            .top(20)
            .page_size(5)
            .build(&catalog())
            .unwrap();
        assert_eq!(
            query.columns,
            ColumnSet::Columns(vec!["fullname".into(), "accountrolecode".into()])
        );
        assert_eq!(
            query.orders,
            [
                OrderExpression::new("lastname", Order::DESC),
                OrderExpression::new("firstname", Order::ASC),
            ]
        );
        assert_eq!(query.top, Some(20));
        let page = query.page_info.as_ref().unwrap();
        assert_eq!((page.count, page.page_number), (5, 1));
        assert!(!query.return_total_record_count);
    }

    #[test]
    fn count_only() {
        let builder = QueryBuilder::new("contact")
            .columns(["fullname"])
            .filter(json!({ "firstname": "Rob" }))
            .join(json!({
                "contact.parentcustomerid": "account.accountid",
                "columns": ["name"],
                "filter": { "name": "Acme" },
            }))
            .order_by("fullname")
            .top(3)
            .page_size(2);
        let query = builder.build(&catalog()).unwrap();
        let count = builder.build_count_only(&catalog()).unwrap();
        assert_eq!(count, query.count_only());
        assert_eq!(count.columns, ColumnSet::Columns(Vec::new()));
        assert_eq!(count.criteria, query.criteria);
        assert!(count.orders.is_empty());
        assert_eq!(count.top, None);
        assert_eq!(count.page_info, None);
        assert!(count.return_total_record_count);
        assert!(count.link_entities[0].columns.is_empty());
        assert_eq!(
            count.link_entities[0].link_criteria,
            query.link_entities[0].link_criteria
        );
    }

    #[test]
    fn untyped() {
        let query = QueryBuilder::new("lead")
            .columns(["subject"])
            .filter(json!({ "budget": { "operator": "gt", "value": 1000 } }))
            .ids([Uuid::nil()])
            .build(&Catalog::new())
            .unwrap();
        assert!(query.criteria.to_string().contains("budget GreaterThan 1000"));
        assert!(query.criteria.to_string().contains("leadid In"));
        let error = QueryBuilder::new("lead")
            .names(["Big deal"])
            .build(&Catalog::new())
            .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::InvalidOptions(..))
        ));
    }

    #[test]
    fn errors() {
        let catalog = catalog();
        let error = QueryBuilder::new("contact")
            .columns(["shoesize"])
            .build(&catalog)
            .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::UnknownAttribute { .. })
        ));
        let error = QueryBuilder::new("contact")
            .columns(["fullname:Pretty"])
            .build(&catalog)
            .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::Format(..))
        ));
        let error = QueryBuilder::new("contact")
            .exclude_filter(json!({ "or": [], "firstname": "Rob" }))
            .build(&catalog)
            .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::AmbiguousFilter(..))
        ));
        let error = QueryBuilder::new("contact")
            .join(json!({ "contact.parentcustomerid": "account.accountid", "type": "cross" }))
            .build(&catalog)
            .unwrap_err();
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::InvalidJoin(..))
        ));
    }
}
