use crate::{TestService, contact, contact_input, input, seed, stored, write};
use quarry::{
    ItemOutcome, OperationKind, Outcome, QuarryError, WriteOptions, WritePipeline, stream,
};
use serde_json::json;
use std::{collections::HashSet, sync::LazyLock};
use tokio::sync::Mutex;
use uuid::Uuid;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn text(record: &quarry::Record, name: &str) -> Option<String> {
    record
        .get_as::<Option<String>>(name)
        .expect("The attribute must be text")
}

fn created(outcome: &ItemOutcome) -> bool {
    matches!(outcome.outcome, Outcome::Succeeded { created: true, .. })
}

pub async fn pipeline<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;

    // Creation in batches
    let (single, multiple) = service.write_calls().await;
    let outcomes = write(
        service,
        "contact",
        WriteOptions::default()
            .batch_size(10)
            .max_degree_of_parallelism(1),
        (0..25).map(|i| contact_input("Bulk", &format!("Contact {i:02}"))),
    )
    .await;
    assert_eq!(outcomes.len(), 25);
    assert!(outcomes.iter().all(ItemOutcome::is_success), "{outcomes:#?}");
    assert!(outcomes.iter().all(created));
    assert!(
        outcomes
            .iter()
            .all(|v| v.operation == Some(OperationKind::Create) && v.attempts == 1)
    );
    assert_eq!(
        outcomes.iter().filter_map(ItemOutcome::id).collect::<HashSet<_>>().len(),
        25
    );
    assert_eq!(
        outcomes.iter().map(|v| v.token).collect::<HashSet<_>>().len(),
        25
    );
    assert_eq!(
        outcomes.iter().map(|v| v.input_index).collect::<Vec<_>>(),
        (0..25).collect::<Vec<_>>()
    );
    assert_eq!(service.write_calls().await, (single, multiple + 3));

    // Parallel workers
    let outcomes = write(
        service,
        "contact",
        WriteOptions::default()
            .batch_size(3)
            .max_degree_of_parallelism(4),
        (0..20).map(|i| contact_input("Parallel", &format!("Contact {i:02}"))),
    )
    .await;
    assert_eq!(outcomes.len(), 20);
    assert!(outcomes.iter().all(ItemOutcome::is_success), "{outcomes:#?}");

    // Updates through the identity
    service.reset().await;
    let ids = seed(
        service,
        [
            contact("Rob", "One").with("description", "First"),
            contact("Joe", "One").with("description", "Second"),
        ],
    )
    .await;
    let (rob, joe) = (ids[0], ids[1]);
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            no_update_columns: vec!["description".into()],
            ..Default::default()
        },
        [input(json!({
            "Id": rob.to_string(),
            "firstname": "Robert",
            "description": "Ignored",
        }))],
    )
    .await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].operation, Some(OperationKind::Update));
    assert_eq!(outcomes[0].id(), Some(rob));
    assert!(!created(&outcomes[0]));
    let record = stored(service, rob).await;
    assert_eq!(text(&record, "firstname").as_deref(), Some("Robert"));
    assert_eq!(text(&record, "description").as_deref(), Some("First"));

    // Updates writing every column
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            update_all_columns: true,
            ignored_properties: vec!["fullname".into()],
            ..Default::default()
        },
        [input(json!({ "contactid": joe.to_string(), "firstname": "Joseph" }))],
    )
    .await;
    assert!(outcomes[0].is_success(), "{}", outcomes[0]);
    let record = stored(service, joe).await;
    assert_eq!(text(&record, "firstname").as_deref(), Some("Joseph"));
    assert_eq!(text(&record, "lastname"), None);
    assert_eq!(text(&record, "description"), None);
    assert_eq!(text(&record, "fullname").as_deref(), Some("Joe One"));

    // Pass thru
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            pass_thru: true,
            ..Default::default()
        },
        [contact_input("Ann", "Solo")],
    )
    .await;
    let Outcome::Succeeded {
        id,
        output: Some(output),
        ..
    } = &outcomes[0].outcome
    else {
        panic!("Expected a pass thru output, found {}", outcomes[0]);
    };
    assert_eq!(output["firstname"], json!("Ann"));
    assert_eq!(output["Id"], json!(id.to_string()));
    assert_eq!(output["TableName"], json!("contact"));

    // Upsert
    let fresh = Uuid::new_v4();
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            upsert: true,
            ..Default::default()
        },
        [
            input(json!({ "Id": rob.to_string(), "lastname": "Uno" })),
            input(json!({ "Id": fresh.to_string(), "lastname": "Fresh" })),
            input(json!({ "lastname": "Anonymous" })),
        ],
    )
    .await;
    assert!(outcomes.iter().all(ItemOutcome::is_success), "{outcomes:#?}");
    assert!(
        outcomes
            .iter()
            .all(|v| v.operation == Some(OperationKind::Upsert))
    );
    assert_eq!(
        outcomes.iter().map(created).collect::<Vec<_>>(),
        [false, true, true]
    );
    assert_eq!(outcomes[1].id(), Some(fresh));
    assert_eq!(text(&stored(service, rob).await, "lastname").as_deref(), Some("Uno"));

    // Matching existing records, the attribute sets are tried in order
    let outcomes = write(
        service,
        "contact",
        WriteOptions::default()
            .match_on(["emailaddress1"])
            .match_on(["firstname", "lastname"]),
        [
            input(json!({
                "firstname": "Robert",
                "lastname": "Uno",
                "description": "Matched",
            })),
            contact_input("New", "Person"),
        ],
    )
    .await;
    assert_eq!(outcomes[0].operation, Some(OperationKind::Update));
    assert_eq!(outcomes[0].id(), Some(rob));
    assert_eq!(outcomes[1].operation, Some(OperationKind::Create));
    assert!(outcomes[1].is_success(), "{}", outcomes[1]);
    assert_eq!(
        text(&stored(service, rob).await, "description").as_deref(),
        Some("Matched")
    );

    // Disabled operations fail the input only
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            no_create: true,
            ..WriteOptions::default().match_on(["firstname", "lastname"])
        },
        [contact_input("Nobody", "Known"), contact_input("New", "Person")],
    )
    .await;
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].is_success());
    assert_eq!(outcomes[0].operation, None);
    assert!(
        format!("{:#}", outcomes[0].error().expect("Expected an error"))
            .contains("creation is disabled")
    );
    assert!(outcomes[1].is_success(), "{}", outcomes[1]);
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            no_update: true,
            ..Default::default()
        },
        [input(json!({ "Id": rob.to_string(), "lastname": "Never" }))],
    )
    .await;
    assert!(!outcomes[0].is_success());
    assert!(
        format!("{:#}", outcomes[0].error().expect("Expected an error"))
            .contains("updates are disabled")
    );
    assert_eq!(text(&stored(service, rob).await, "lastname").as_deref(), Some("Uno"));

    // Invalid inputs do not abort their siblings
    let outcomes;
    crate::silent_logs! {
        outcomes = write(
            service,
            "contact",
            WriteOptions::default().batch_size(2),
            [
                contact_input("Good", "First"),
                input(json!({ "firstname": "Bad", "shoesize": 42 })),
                contact_input("Good", "Second"),
                input(json!({ "Id": rob.to_string(), "firstname": "Twin" })),
            ],
        )
        .await;
    }
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].is_success());
    assert!(matches!(
        outcomes[1].error().and_then(QuarryError::of),
        Some(QuarryError::UnknownAttribute { .. })
    ));
    assert_eq!(outcomes[1].input_index, 1);
    assert!(outcomes[2].is_success());
    assert!(outcomes[3].is_success());
    let outcomes = write(
        service,
        "contact",
        WriteOptions {
            create_only: true,
            ..Default::default()
        },
        [input(json!({ "Id": rob.to_string(), "firstname": "Twin" }))],
    )
    .await;
    assert!(matches!(
        outcomes[0].error().and_then(QuarryError::of),
        Some(QuarryError::RemoteFault {
            retryable: false,
            ..
        })
    ));
    assert_eq!(outcomes[0].attempts, 1);

    // Conflicting options are rejected before writing anything
    let invalid = [
        WriteOptions::default().batch_size(0),
        WriteOptions::default().max_degree_of_parallelism(0),
        WriteOptions {
            upsert: true,
            ..WriteOptions::default().match_on(["lastname"])
        },
        WriteOptions {
            no_create: true,
            no_update: true,
            ..Default::default()
        },
        WriteOptions {
            allow_multiple_matches: true,
            ..Default::default()
        },
    ];
    for options in invalid {
        let Err(error) = WritePipeline::new(service.clone(), "contact", options.clone())
            .run(stream::iter([contact_input("Never", "Written")]))
            .await
        else {
            panic!("Options {options:?} must be rejected");
        };
        assert!(matches!(
            QuarryError::of(&error),
            Some(QuarryError::InvalidOptions(..))
        ));
    }
    let error = WritePipeline::new(service.clone(), "lead", WriteOptions::default())
        .run(stream::iter([contact_input("Never", "Written")]))
        .await
        .err()
        .expect("Unknown entities must be rejected");
    assert!(matches!(
        QuarryError::of(&error),
        Some(QuarryError::RemoteFault { .. })
    ));
}
