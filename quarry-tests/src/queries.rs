use crate::{TestService, contact, full_names, seed};
use futures::{StreamExt, TryStreamExt};
use quarry::{Catalog, QuarryError, QueryBuilder, QueryExpression, Record, retrieve_all};
use serde_json::json;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn kind(error: &quarry::Error) -> Option<&QuarryError> {
    QuarryError::of(error)
}

pub async fn queries<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;
    let ids = seed(
        service,
        [
            contact("Rob", "One"),
            contact("Joe", "One"),
            contact("Rob", "Two"),
            Record::new("contact")
                .with("lastname", "Nobody")
                .with("fullname", "Nobody"),
        ],
    )
    .await;
    let (rob_one, joe_one, rob_two) = (ids[0], ids[1], ids[2]);
    let query = |filter: serde_json::Value| QueryBuilder::new("contact").filter(filter);

    // Groups
    assert_eq!(
        full_names(
            service,
            &query(json!({ "and": [{ "firstname": "Rob" }, { "lastname": "One" }] }))
        )
        .await,
        ["Rob One"]
    );
    assert_eq!(
        full_names(service, &query(json!({ "firstname": "Rob", "lastname": "One" }))).await,
        ["Rob One"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!({ "or": [{ "firstname": "Joe" }, { "lastname": "Two" }] }))
        )
        .await,
        ["Joe One", "Rob Two"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!([{ "firstname": "Joe" }, { "lastname": "Two" }]))
        )
        .await,
        ["Joe One", "Rob Two"]
    );

    // A negation keeps the records where the attribute is null
    assert_eq!(
        full_names(service, &query(json!({ "not": { "firstname": "Rob" } }))).await,
        ["Joe One", "Nobody"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!({ "not": [{ "firstname": "Rob" }, { "lastname": "One" }] }))
        )
        .await,
        ["Joe One", "Nobody", "Rob Two"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!({ "xor": [{ "firstname": "Rob" }, { "lastname": "One" }] }))
        )
        .await,
        ["Joe One", "Rob Two"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!({ "not": { "or": [{ "firstname": null }, { "lastname": "Two" }] } }))
        )
        .await,
        ["Joe One", "Rob One"]
    );

    // Operators
    assert_eq!(
        full_names(
            service,
            &query(json!({ "lastname": { "operator": "like", "value": "o%" } }))
        )
        .await,
        ["Joe One", "Rob One"]
    );
    assert_eq!(
        full_names(service, &query(json!({ "firstname": ["Joe", "Ann"] }))).await,
        ["Joe One"]
    );
    assert_eq!(
        full_names(
            service,
            &query(json!({ "firstname": { "operator": "not-in", "values": ["Joe", "Ann"] } }))
        )
        .await,
        ["Rob One", "Rob Two"]
    );
    assert_eq!(
        full_names(service, &query(json!({ "firstname": null }))).await,
        ["Nobody"]
    );

    // Exclusions, identities and names
    assert_eq!(
        full_names(
            service,
            &QueryBuilder::new("contact").exclude_filter(json!({ "lastname": "One" }))
        )
        .await,
        ["Nobody", "Rob Two"]
    );
    assert_eq!(
        full_names(
            service,
            &QueryBuilder::new("contact")
                .filter(json!({ "firstname": "Rob" }))
                .exclude_ids([rob_two])
        )
        .await,
        ["Rob One"]
    );
    assert_eq!(
        full_names(service, &QueryBuilder::new("contact").ids([rob_one, joe_one])).await,
        ["Joe One", "Rob One"]
    );
    assert_eq!(
        full_names(
            service,
            &QueryBuilder::new("contact")
                .names(["Rob Two", "Joe One"])
                .exclude_filter(json!({ "firstname": "Joe" }))
        )
        .await,
        ["Rob Two"]
    );

    // Order and limit
    let catalog = Catalog::load(service, ["contact"])
        .await
        .expect("Failed to load the contact metadata");
    let query = QueryBuilder::new("contact")
        .columns(["fullname"])
        .filter(json!({ "firstname": { "operator": "not-null" } }))
        .order_by("firstname-")
        .order_by("lastname")
        .top(2)
        .build(&catalog)
        .expect("Failed to build the ordered query");
    let names = retrieve_all(service.clone(), query, 1)
        .map_ok(|v| v.get_as::<String>("fullname").unwrap_or_default())
        .try_collect::<Vec<_>>()
        .await
        .expect("Failed to read the ordered contacts");
    assert_eq!(names, ["Rob One", "Rob Two"]);

    // FetchXML
    let query = QueryExpression::from_fetch_xml(
        r#"
        <fetch top="5">
          <entity name="contact">
            <attribute name="fullname" />
            <order attribute="fullname" descending="true" />
            <filter type="or">
              <condition attribute="lastname" operator="eq" value="Two" />
              <condition attribute="firstname" operator="in">
                <value>Joe</value>
              </condition>
            </filter>
          </entity>
        </fetch>
        "#,
    )
    .expect("Failed to parse the fetch xml");
    let records = retrieve_all(service.clone(), query, 50)
        .collect::<Vec<_>>()
        .await;
    let names = records
        .into_iter()
        .map(|v| {
            v.expect("Failed to read a contact")
                .get_as::<String>("fullname")
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();
    assert_eq!(names, ["Rob Two", "Joe One"]);

    // Structural errors abort the build
    let error = QueryBuilder::new("contact")
        .filter(json!({ "and": [{ "firstname": "Rob" }], "lastname": "One" }))
        .build(&catalog)
        .expect_err("Mixing a group with conditions must fail");
    assert!(matches!(kind(&error), Some(QuarryError::AmbiguousFilter(..))));
    let error = QueryBuilder::new("contact")
        .filter(json!({
            "xor": [{ "firstname": "Rob" }, { "firstname": "Joe" }, { "lastname": "One" }]
        }))
        .build(&catalog)
        .expect_err("A xor of three children must fail");
    assert!(matches!(
        kind(&error),
        Some(QuarryError::UnsupportedFilterShape(..))
    ));
    let error = QueryBuilder::new("contact")
        .filter(json!({ "shoesize": 42 }))
        .build(&catalog)
        .expect_err("Unknown attributes must fail");
    assert!(matches!(
        kind(&error),
        Some(QuarryError::UnknownAttribute { attribute, .. }) if attribute == "shoesize"
    ));
    let error = QueryBuilder::new("contact")
        .filter(json!({ "numberofchildren": "many" }))
        .build(&catalog)
        .expect_err("Values of the wrong type must fail");
    assert!(matches!(kind(&error), Some(QuarryError::TypeMismatch { .. })));
}
