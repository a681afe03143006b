use crate::{TestService, contact, seed};
use futures::StreamExt;
use quarry::{Catalog, PageInfo, QueryBuilder, ReadOptions, Reader, count};
use serde_json::json;
use std::{pin::pin, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn last_names(rows: &[quarry::LooseMap]) -> Vec<&str> {
    rows.iter()
        .map(|v| v["lastname"].as_str().unwrap_or_default())
        .collect()
}

pub async fn reading<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;
    seed(
        service,
        ["Delta", "Alpha", "Echo", "Charlie", "Bravo"]
            .into_iter()
            .map(|v| contact("Max", v)),
    )
    .await;
    let catalog = Catalog::load(service, ["contact"])
        .await
        .expect("Failed to load the contact metadata");
    let ordered = QueryBuilder::new("contact")
        .columns(["lastname"])
        .order_by("lastname");

    // Every page is followed
    let query = ordered
        .build(&catalog)
        .expect("Failed to build the ordered query");
    let rows = Reader::new(service.clone(), query.clone())
        .options(ReadOptions {
            page_size: 2,
            ..Default::default()
        })
        .read_all()
        .await
        .expect("Failed to read every page");
    assert_eq!(
        last_names(&rows),
        ["Alpha", "Bravo", "Charlie", "Delta", "Echo"]
    );
    assert!(rows.iter().all(|v| v.len() == 3));

    // A single page carries the cookie of the next one
    let mut first_page = query.clone();
    first_page.page_info = Some(PageInfo::new(2));
    let page = service
        .retrieve_multiple(&first_page)
        .await
        .expect("Failed to read the first page");
    assert_eq!(page.records.len(), 2);
    assert!(page.more_records);
    assert!(page.paging_cookie.is_some());
    assert_eq!(page.total_record_count, None);

    // The limit holds whatever the page size
    let query = ordered
        .clone()
        .top(3)
        .build(&catalog)
        .expect("Failed to build the limited query");
    let rows = Reader::new(service.clone(), query.clone())
        .options(ReadOptions {
            page_size: 2,
            ..Default::default()
        })
        .read_all()
        .await
        .expect("Failed to read the limited query");
    assert_eq!(last_names(&rows), ["Alpha", "Bravo", "Charlie"]);

    // Streams can be abandoned early
    let stream = Reader::new(service.clone(), query.clone()).stream();
    let mut stream = pin!(stream);
    let first = stream
        .next()
        .await
        .expect("The stream must yield a record")
        .expect("Failed to read the first record");
    assert_eq!(first["lastname"], json!("Alpha"));

    // Counting ignores the limit
    assert_eq!(count(service, &query).await.expect("Failed to count"), 5);
    let filtered = QueryBuilder::new("contact")
        .filter(json!({ "lastname": { "operator": "ge", "value": "C" } }))
        .top(1);
    let query = filtered
        .build_count_only(&catalog)
        .expect("Failed to build the count query");
    assert_eq!(query.top, None);
    assert!(query.return_total_record_count);
    let collection = service
        .retrieve_multiple(&query)
        .await
        .expect("Failed to count the filtered contacts");
    assert_eq!(collection.total_record_count, Some(3));
    let query = filtered
        .build(&catalog)
        .expect("Failed to build the filtered query");
    assert_eq!(count(service, &query).await.expect("Failed to count"), 3);
}
