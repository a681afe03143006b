use crate::{TestService, account, contact, full_names, parent, seed};
use quarry::{
    Catalog, EntityReference, LinkEntity, LooseMap, QuarryError, QueryBuilder, QueryExpression,
    Reader, Result, Value, WriteRequest,
};
use serde_json::json;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn build<S: TestService>(service: &S, query: QueryBuilder) -> Result<QueryExpression> {
    let catalog = Catalog::load(service, ["contact", "account"]).await?;
    query.build(&catalog)
}

async fn read<S: TestService>(service: &S, query: QueryBuilder) -> Vec<LooseMap> {
    let query = build(service, query)
        .await
        .expect("Failed to build the joined query");
    let mut result = Reader::new(service.clone(), query)
        .columns(["fullname"])
        .read_all()
        .await
        .expect("Failed to read the joined query");
    result.sort_by(|a, b| a["fullname"].as_str().cmp(&b["fullname"].as_str()));
    result
}

pub async fn joins<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;
    let accounts = seed(service, [account("Acme"), account("Globex")]).await;
    let (acme, globex) = (accounts[0], accounts[1]);
    let contacts = seed(
        service,
        [
            contact("Rob", "One").with("parentcustomerid", parent(acme)),
            contact("Joe", "One").with("parentcustomerid", parent(acme)),
            contact("Rob", "Two").with("parentcustomerid", parent(globex)),
            contact("Ann", "Solo"),
        ],
    )
    .await;
    service
        .execute(WriteRequest::update(
            account("Acme").with_id(acme).with(
                "primarycontactid",
                Value::Reference(Some(EntityReference::new("contact", contacts[0]))),
            ),
        ))
        .await
        .expect("Failed to set the primary contact of Acme");

    // Inner join with a filter on the linked entity
    let acme_contacts = json!({
        "contact.parentcustomerid": "account.accountid",
        "filter": { "name": "Acme" },
    });
    assert_eq!(
        full_names(service, &QueryBuilder::new("contact").join(acme_contacts)).await,
        ["Joe One", "Rob One"]
    );
    let reversed = json!({
        "account.accountid": "contact.parentcustomerid",
        "type": "Inner",
        "filter": { "name": "Acme" },
    });
    assert_eq!(
        full_names(service, &QueryBuilder::new("contact").join(reversed)).await,
        ["Joe One", "Rob One"]
    );

    // Outer join, the root filter reads the linked entity through its alias
    let outer = json!({
        "contact.parentcustomerid": "account.accountid",
        "type": "left outer",
        "alias": "a",
    });
    assert_eq!(
        full_names(
            service,
            &QueryBuilder::new("contact")
                .join(outer.clone())
                .filter(json!({ "a.accountid": null }))
        )
        .await,
        ["Ann Solo"]
    );
    assert_eq!(
        full_names(service, &QueryBuilder::new("contact").join(outer)).await,
        ["Ann Solo", "Joe One", "Rob One", "Rob Two"]
    );

    // Columns of linked entities, nested links
    let rows = read(
        service,
        QueryBuilder::new("contact").join(json!({
            "contact.parentcustomerid": "account.accountid",
            "alias": "a",
            "columns": ["name"],
            "links": [{
                "a.primarycontactid": "contact.contactid",
                "alias": "pc",
                "columns": "fullname",
            }],
        })),
    )
    .await;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["a.name"], json!("Acme"));
        assert_eq!(row["pc.fullname"], json!("Rob One"));
        assert_eq!(row["TableName"], json!("contact"));
    }
    assert_eq!(rows[0]["fullname"], json!("Joe One"));

    // Native links
    let native = LinkEntity::new("contact", "parentcustomerid", "account", "accountid")
        .alias("a")
        .columns(["name"]);
    let rows = read(service, QueryBuilder::new("contact").join(native)).await;
    assert_eq!(
        rows.iter()
            .map(|v| v["a.name"].as_str().unwrap_or_default())
            .collect::<Vec<_>>(),
        ["Acme", "Acme", "Globex"]
    );

    // Malformed joins
    let cases = [
        (json!({ "alias": "a" }), "no pair"),
        (
            json!({ "lead.parentcontactid": "account.accountid" }),
            "unrelated entities",
        ),
        (
            json!({ "contact.parentcustomerid": "account.accountid", "type": "sideways" }),
            "unknown type",
        ),
        (json!({ "contact.parentcustomerid": "accountid" }), "unqualified target"),
    ];
    for (join, case) in cases {
        let error = build(service, QueryBuilder::new("contact").join(join))
            .await
            .expect_err(case);
        assert!(
            matches!(
                QuarryError::of(&error),
                Some(QuarryError::AmbiguousJoin(..) | QuarryError::InvalidJoin(..))
            ),
            "{case}: {error:#}"
        );
    }
    let error = build(
        service,
        QueryBuilder::new("contact").join(json!({
            "contact.parentcustomerid": "account.accountid",
            "contact.contactid": "account.primarycontactid",
        })),
    )
    .await
    .expect_err("Two pairs must fail");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::AmbiguousJoin(..))
    ));
    let error = build(
        service,
        QueryBuilder::new("contact").join(LinkEntity::new(
            "account",
            "primarycontactid",
            "contact",
            "contactid",
        )),
    )
    .await
    .expect_err("A native link from another entity must fail");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::InvalidJoin(..))
    ));
}
