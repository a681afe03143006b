use crate::{TestService, account, contact, contact_metadata, parent, role, seed};
use quarry::{Catalog, QuarryError, QueryBuilder, ReadOptions, Reader, Value, all_column_names};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::LazyLock;
use time::macros::date;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn columns<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;
    let acme = seed(service, [account("Acme")]).await[0];
    let ids = seed(
        service,
        [contact("Rob", "One")
            .with("accountrolecode", role(1))
            .with("parentcustomerid", parent(acme))
            .with("creditlimit", Value::Money(Some(Decimal::new(123450, 2))))
            .with("numberofchildren", Value::Int32(Some(3)))
            .with("birthdate", Value::Date(Some(date!(1990 - 05 - 17))))
            .with("donotemail", Value::Boolean(Some(true)))
            .with("description", "Met at the fair")],
    )
    .await;
    let catalog = Catalog::load(service, ["contact"])
        .await
        .expect("Failed to load the contact metadata");
    let query = QueryBuilder::new("contact")
        .ids(ids.clone())
        .build(&catalog)
        .expect("Failed to build the contact query");

    // Formats
    let rows = Reader::new(service.clone(), query.clone())
        .columns([
            "accountrolecode:Raw",
            "accountrolecode:Display",
            "accountrolecode",
            "parentcustomerid",
            "parentcustomerid:Raw",
            "parentcustomerid:Display",
            "creditlimit",
            "creditlimit:Display",
            "numberofchildren",
            "birthdate",
            "donotemail:Display",
        ])
        .read_all()
        .await
        .expect("Failed to read the formatted columns");
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["accountrolecode:Raw"], json!(1));
    assert_eq!(row["accountrolecode:Display"], json!("Decision Maker"));
    assert_eq!(row["accountrolecode"], json!(1));
    assert_eq!(
        row["parentcustomerid"],
        json!({ "Id": acme.to_string(), "TableName": "account" })
    );
    assert_eq!(row["parentcustomerid:Raw"], json!(acme.to_string()));
    assert_eq!(row["parentcustomerid:Display"], json!("Acme"));
    assert_eq!(row["creditlimit"], json!(1234.5));
    assert_eq!(row["creditlimit:Display"], json!("1,234.50"));
    assert_eq!(row["numberofchildren"], json!(3));
    assert_eq!(row["birthdate"], json!("1990-05-17"));
    assert_eq!(row["donotemail:Display"], json!("Yes"));
    assert_eq!(row["Id"], json!(ids[0].to_string()));
    assert_eq!(row["TableName"], json!("contact"));
    let keys = row.keys().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(
        keys[..3],
        [
            "accountrolecode:Raw",
            "accountrolecode:Display",
            "accountrolecode"
        ]
    );

    // Lookups returning the name
    let rows = Reader::new(service.clone(), query.clone())
        .columns(["parentcustomerid", "fullname"])
        .options(ReadOptions {
            lookups_return_name: true,
            ..Default::default()
        })
        .read_all()
        .await
        .expect("Failed to read the lookup names");
    assert_eq!(rows[0]["parentcustomerid"], json!("Acme"));
    assert_eq!(rows[0]["fullname"], json!("Rob One"));

    // Every column but the system ones
    let rows = Reader::new(service.clone(), query.clone())
        .read_all()
        .await
        .expect("Failed to read all the columns");
    assert!(rows[0].contains_key("firstname"));
    assert!(rows[0].contains_key("description"));
    assert!(!rows[0].contains_key("createdon"));
    let names = all_column_names(&contact_metadata(), false, &["description", "FULLNAME"]);
    assert!(names.is_sorted());
    assert!(names.contains(&"contactid".to_owned()));
    assert!(
        !names
            .iter()
            .any(|v| v == "description" || v == "fullname" || v == "createdon")
    );
    let names = all_column_names(&contact_metadata(), true, &[] as &[&str]);
    assert!(names.contains(&"createdon".to_owned()));

    // Invalid columns
    let error = Reader::new(service.clone(), query.clone())
        .columns(["description:Display"])
        .read_all()
        .await
        .expect_err("Text has no display format");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::UnsupportedFormat { .. })
    ));
    let error = Reader::new(service.clone(), query.clone())
        .columns(["shoesize"])
        .read_all()
        .await
        .expect_err("Unknown columns must fail");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::UnknownAttribute { .. })
    ));
    let error = Reader::new(service.clone(), query)
        .columns(["fullname:Fancy"])
        .read_all()
        .await
        .expect_err("Unknown formats must fail");
    assert!(matches!(QuarryError::of(&error), Some(QuarryError::Format(..))));
}
