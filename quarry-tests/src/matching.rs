use crate::{TestService, contact, contact_input, input, seed};
use quarry::{QuarryError, Record, Value, find_matches};
use uuid::Uuid;
use serde_json::json;
use std::sync::LazyLock;
use tokio::sync::Mutex;

fn identities(records: &[Record]) -> Vec<Uuid> {
    records.iter().filter_map(|v| v.id).collect()
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn matching<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;
    let ids = seed(
        service,
        [
            contact("Rob", "One"),
            contact("Joe", "One"),
            contact("Rob", "Two"),
            Record::new("contact").with("lastname", "Nobody"),
        ],
    )
    .await;
    let metadata = service
        .entity_metadata("contact")
        .await
        .expect("Failed to get the contact metadata");

    // Exactly one match
    let matches = find_matches(
        service,
        &metadata,
        &contact_input("rob", "one"),
        &["firstname", "lastname"],
        false,
    )
    .await
    .expect("Failed to match on the full name");
    assert_eq!(identities(&matches), [ids[0]]);
    assert_eq!(
        matches[0].get("firstname"),
        Some(&Value::Varchar(Some("Rob".into())))
    );
    assert_eq!(
        matches[0].get("lastname"),
        Some(&Value::Varchar(Some("One".into())))
    );

    // Several matches
    let error = find_matches(
        service,
        &metadata,
        &input(json!({ "lastname": "One" })),
        &["lastname"],
        false,
    )
    .await
    .expect_err("Two matches must fail");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::MultipleMatches { count: 2, .. })
    ));
    let matches = find_matches(
        service,
        &metadata,
        &input(json!({ "lastname": "One" })),
        &["lastname"],
        true,
    )
    .await
    .expect("Failed to match several records");
    assert_eq!(matches.len(), 2);
    let mut matches = identities(&matches);
    matches.sort();
    let mut expected = vec![ids[0], ids[1]];
    expected.sort();
    assert_eq!(matches, expected);

    // Null values match missing attributes
    let matches = find_matches(
        service,
        &metadata,
        &input(json!({ "firstname": null, "lastname": "Nobody" })),
        &["firstname", "lastname"],
        false,
    )
    .await
    .expect("Failed to match on a null value");
    assert_eq!(identities(&matches), [ids[3]]);

    // Attributes missing from the input
    let matches = find_matches(
        service,
        &metadata,
        &input(json!({ "lastname": "Two" })),
        &["emailaddress1"],
        false,
    )
    .await
    .expect("Failed to match without attributes");
    assert!(matches.is_empty());
    let matches = find_matches(
        service,
        &metadata,
        &input(json!({ "firstname": "Ann", "lastname": "Solo" })),
        &["firstname", "lastname"],
        false,
    )
    .await
    .expect("Failed to match an unknown contact");
    assert!(matches.is_empty());

    // Unknown attributes
    let error = find_matches(
        service,
        &metadata,
        &input(json!({ "shoesize": 42 })),
        &["shoesize"],
        false,
    )
    .await
    .expect_err("Unknown match attributes must fail");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::UnknownAttribute { .. })
    ));
}
