#[cfg(test)]
mod tests {
    use quarry_core::{
        AttributeMetadata, AttributeType, Catalog, ColumnSet, ConditionExpression, ConditionOperator,
        EntityMetadata, EntityReference, Fault, FilterExpression, JoinType, LinkEntity,
        OperationKind, Order, OrderExpression, PageInfo, QuarryError, QueryBuilder,
        QueryExpression, Record, retrieve_all, stream::StreamExt,
        Service, TRANSIENT_FAULT_CODES, Value, WriteRequest,
    };
    use quarry_memory::{
        ATTRIBUTE_NOT_FOUND, DUPLICATE_RECORD, MemoryService, OBJECT_DOES_NOT_EXIST,
    };
    use serde_json::json;
    use uuid::Uuid;

    fn service() -> MemoryService {
        MemoryService::new()
            .with_entity(
                EntityMetadata::new("account")
                    .primary_name("name")
                    .attribute(AttributeMetadata::new("name", AttributeType::String)),
            )
            .with_entity(
                EntityMetadata::new("contact")
                    .primary_name("fullname")
                    .attribute(AttributeMetadata::new("fullname", AttributeType::String))
                    .attribute(AttributeMetadata::new("age", AttributeType::Integer))
                    .attribute(
                        AttributeMetadata::new("parentcustomerid", AttributeType::Customer)
                            .targets(["account"]),
                    ),
            )
    }

    async fn seed(service: &MemoryService) -> (Uuid, Uuid) {
        let acme = service
            .insert(Record::new("account").with("name", Value::Varchar(Some("Acme".into()))))
            .await;
        let globex = service
            .insert(Record::new("account").with("name", Value::Varchar(Some("Globex".into()))))
            .await;
        for (name, age, account) in [
            ("Rob One", Some(30), Some(acme)),
            ("Rob Two", Some(45), Some(globex)),
            ("Ann Three", None, Some(acme)),
            ("Bob Four", Some(22), None),
        ] {
            let mut record = Record::new("contact")
                .with("fullname", Value::Varchar(Some(name.into())))
                .with("age", Value::Int32(age));
            if let Some(account) = account {
                record.set(
                    "parentcustomerid",
                    Value::Reference(Some(EntityReference::new("account", account))),
                );
            }
            service.insert(record).await;
        }
        (acme, globex)
    }

    fn names(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .map(|v| v.get("fullname").map(ToString::to_string).unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn conditions_and_orders() {
        let service = service();
        seed(&service).await;
        let query = QueryExpression::new("contact")
            .criteria(
                FilterExpression::and()
                    .condition(ConditionExpression::new(
                        "fullname",
                        ConditionOperator::Like,
                        [Value::Varchar(Some("rob%".into()))],
                    ))
                    .condition(ConditionExpression::new(
                        "age",
                        ConditionOperator::GreaterThan,
                        [Value::Int32(Some(25))],
                    )),
            )
            .order(OrderExpression::new("age", Order::DESC));
        let result = service
            .retrieve_multiple(&query)
            .await
            .expect("The query should succeed");
        assert_eq!(names(&result.records), ["Rob Two", "Rob One"]);
        assert!(!result.more_records);
        assert_eq!(result.total_record_count, None);

        // Comparisons never hold on null values
        let query = QueryExpression::new("contact").criteria(
            FilterExpression::or().condition(ConditionExpression::new(
                "age",
                ConditionOperator::LessThan,
                [Value::Int32(Some(100))],
            )),
        );
        let result = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(result.records.len(), 3);
        let query = QueryExpression::new("contact")
            .criteria(FilterExpression::and().condition(ConditionExpression::null("age")));
        let result = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(names(&result.records), ["Ann Three"]);
    }

    #[tokio::test]
    async fn links() {
        let service = service();
        seed(&service).await;
        let link = LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
            .alias("a")
            .columns(["name"])
            .criteria(FilterExpression::and().condition(ConditionExpression::equal(
                "name",
                Value::Varchar(Some("Acme".into())),
            )));
        let query = QueryExpression::new("contact")
            .columns(ColumnSet::from_iter(["fullname"]))
            .link(link.clone())
            .order(OrderExpression::new("fullname", Order::ASC));
        let result = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(names(&result.records), ["Ann Three", "Rob One"]);
        assert_eq!(
            result.records[0].get("a.name"),
            Some(&Value::Varchar(Some("Acme".into())))
        );
        assert!(!result.records[0].contains("age"));

        let query = QueryExpression::new("contact")
            .link(link.join_type(JoinType::LeftOuter))
            .criteria(FilterExpression::and().condition(
                ConditionExpression::null("name").with_alias("a"),
            ));
        let result = service.retrieve_multiple(&query).await.unwrap();
        let mut found = names(&result.records);
        found.sort();
        assert_eq!(found, ["Bob Four", "Rob Two"]);
    }

    #[tokio::test]
    async fn paging_and_counts() {
        let service = service();
        seed(&service).await;
        let mut query =
            QueryExpression::new("contact").order(OrderExpression::new("fullname", Order::ASC));
        query.page_info = Some(PageInfo::new(3));
        query.return_total_record_count = true;
        let first = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(first.records.len(), 3);
        assert!(first.more_records);
        assert_eq!(first.total_record_count, Some(4));
        let page = query.page_info.as_mut().unwrap();
        page.page_number = 2;
        page.paging_cookie = first.paging_cookie;
        let second = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(names(&second.records), ["Rob Two"]);
        assert!(!second.more_records);
        assert_eq!(second.paging_cookie, None);

        let query = QueryExpression::new("contact").top(2);
        let result = service.retrieve_multiple(&query).await.unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(service.calls().await.retrieve_multiple, 3);
    }

    #[tokio::test]
    async fn read_all_pages() {
        let service = service();
        seed(&service).await;
        let query =
            QueryExpression::new("contact").order(OrderExpression::new("fullname", Order::ASC));
        let records = retrieve_all(service.clone(), query.clone(), 3)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<quarry_core::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(service.calls().await.retrieve_multiple, 2);

        // A limited read is a single request without paging
        let mut limited = query.top(3);
        limited.page_info = Some(PageInfo::new(2));
        let records = retrieve_all(service.clone(), limited, 2)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<quarry_core::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(&records), ["Ann Three", "Bob Four", "Rob One"]);
        assert_eq!(service.calls().await.retrieve_multiple, 3);
    }

    #[tokio::test]
    async fn negated_empty_filters() {
        let service = service();
        seed(&service).await;
        let catalog = Catalog::load(&service, ["contact"]).await.unwrap();
        for filter in [json!({}), json!({ "and": [] }), json!([])] {
            let query = QueryBuilder::new("contact")
                .exclude_filter(filter.clone())
                .build(&catalog)
                .unwrap();
            let result = service.retrieve_multiple(&query).await.unwrap();
            assert!(result.records.is_empty(), "{filter}");
        }
        let query = QueryBuilder::new("contact")
            .filter(json!({ "not": [{}] }))
            .build(&catalog)
            .unwrap();
        assert!(service.retrieve_multiple(&query).await.unwrap().records.is_empty());
        let query = QueryBuilder::new("contact")
            .filter(json!({ "not": { "not": {} } }))
            .build(&catalog)
            .unwrap();
        assert_eq!(service.retrieve_multiple(&query).await.unwrap().records.len(), 4);
        let query = QueryBuilder::new("contact")
            .exclude_filter(json!({ "fullname": "Rob One" }))
            .build(&catalog)
            .unwrap();
        assert_eq!(service.retrieve_multiple(&query).await.unwrap().records.len(), 3);
    }

    #[tokio::test]
    async fn writes() {
        let service = service();
        let created = service
            .execute(WriteRequest::create(
                Record::new("contact").with("fullname", Value::Varchar(Some("New".into()))),
            ))
            .await
            .expect("Create should succeed");
        assert!(created.created);
        let results = service
            .execute_multiple(vec![
                WriteRequest::update(
                    Record::new("contact")
                        .with_id(created.id)
                        .with("age", Value::Int32(Some(50))),
                ),
                WriteRequest::update(
                    Record::new("contact")
                        .with_id(Uuid::new_v4())
                        .with("age", Value::Int32(Some(1))),
                ),
                WriteRequest::create(Record::new("contact").with_id(created.id)),
                WriteRequest::create(
                    Record::new("contact").with("shoesize", Value::Int32(Some(9))),
                ),
                WriteRequest::upsert(
                    Record::new("contact")
                        .with_id(created.id)
                        .with("fullname", Value::Varchar(Some("Renamed".into()))),
                ),
            ])
            .await
            .expect("The call should succeed");
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().code, OBJECT_DOES_NOT_EXIST);
        assert_eq!(results[2].as_ref().unwrap_err().code, DUPLICATE_RECORD);
        assert_eq!(results[3].as_ref().unwrap_err().code, ATTRIBUTE_NOT_FOUND);
        let upserted = results[4].as_ref().unwrap();
        assert_eq!(upserted.id, created.id);
        assert!(!upserted.created);
        let record = service
            .retrieve("contact", created.id, &ColumnSet::All)
            .await
            .unwrap()
            .expect("The record should exist");
        assert_eq!(
            record.get("fullname"),
            Some(&Value::Varchar(Some("Renamed".into())))
        );
        assert_eq!(record.get("age"), Some(&Value::Int32(Some(50))));
        let calls = service.calls().await;
        assert_eq!((calls.execute, calls.execute_multiple, calls.requests), (1, 1, 6));
    }

    #[tokio::test]
    async fn faults() {
        let service = service();
        let throttled = TRANSIENT_FAULT_CODES[0];
        service
            .inject_faults(Fault::new(throttled, "Too many requests"), 2)
            .await;
        let results = service
            .execute_multiple(
                (0..3)
                    .map(|_| WriteRequest::create(Record::new("contact")))
                    .collect(),
            )
            .await
            .unwrap();
        assert_eq!(results[0].as_ref().unwrap_err().code, throttled);
        assert_eq!(results[1].as_ref().unwrap_err().code, throttled);
        assert!(results[2].is_ok());

        service
            .inject_call_faults(Fault::new(throttled, "Busy"), 1)
            .await;
        let error = service
            .execute(WriteRequest {
                operation: OperationKind::Create,
                record: Record::new("contact"),
            })
            .await
            .expect_err("The call should fail");
        assert!(QuarryError::of(&error).is_some_and(QuarryError::is_retryable));
        assert!(
            service
                .execute(WriteRequest::create(Record::new("contact")))
                .await
                .is_ok()
        );

        service.reset().await;
        assert!(service.records("contact").await.is_empty());
        assert_eq!(service.calls().await, Default::default());
    }
}
