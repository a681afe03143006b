use crate::{TestService, contact_input};
use futures::{StreamExt, channel::mpsc, stream};
use quarry::{
    Backoff, Fault, ItemOutcome, QuarryError, TRANSIENT_FAULT_CODES, WriteOptions, WritePipeline,
};
use std::{sync::LazyLock, time::Duration};
use tokio::{sync::Mutex, time::timeout};

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn is_cancelled(outcome: &ItemOutcome) -> bool {
    matches!(
        outcome.error().and_then(QuarryError::of),
        Some(QuarryError::Cancelled)
    )
}

pub async fn cancellation<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;

    // Input stops being read, the stream still terminates
    let (tx, rx) = mpsc::unbounded();
    let pipeline = WritePipeline::new(
        service.clone(),
        "contact",
        WriteOptions::default().batch_size(1),
    );
    let handle = pipeline.cancel_handle();
    let mut outcomes = pipeline
        .run(rx)
        .await
        .expect("Failed to start the write pipeline")
        .boxed();
    tx.unbounded_send(contact_input("Before", "Cancel"))
        .expect("Failed to send the first input");
    let first = timeout(Duration::from_secs(5), outcomes.next())
        .await
        .expect("The first outcome took too long")
        .expect("The pipeline must emit the first outcome");
    assert!(first.is_success(), "{first}");
    handle.cancel();
    assert!(handle.is_cancelled());
    for i in 0..10 {
        let _ = tx.unbounded_send(contact_input("After", &format!("Cancel {i}")));
    }
    drop(tx);
    let rest = timeout(Duration::from_secs(5), outcomes.collect::<Vec<_>>())
        .await
        .expect("The outcome stream must end after the cancellation");
    assert!(
        rest.iter().all(|v| v.is_success() || is_cancelled(v)),
        "{rest:#?}"
    );

    // Pending retries are abandoned
    service.reset().await;
    service
        .inject_faults(
            Fault::new(TRANSIENT_FAULT_CODES[0], "Number of requests exceeded the limit"),
            100,
        )
        .await;
    let pipeline = WritePipeline::new(
        service.clone(),
        "contact",
        WriteOptions::default().batch_size(1).retries(
            5,
            Duration::from_secs(60),
            Backoff::Fixed,
        ),
    );
    let handle = pipeline.cancel_handle();
    let outcomes = pipeline
        .run(stream::iter([contact_input("Waiting", "Forever")]))
        .await
        .expect("Failed to start the write pipeline");
    let pending = tokio::spawn(outcomes.collect::<Vec<_>>());
    let outcomes;
    crate::silent_logs! {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        outcomes = timeout(Duration::from_secs(5), pending)
            .await
            .expect("The retry wait must end on cancellation")
            .expect("Failed to collect the outcomes");
    }
    assert_eq!(outcomes.len(), 1);
    assert!(is_cancelled(&outcomes[0]), "{}", outcomes[0]);
    assert_eq!(outcomes[0].attempts, 1);
}
