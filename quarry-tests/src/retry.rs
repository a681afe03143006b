use crate::{TestService, contact_input, write};
use quarry::{
    Backoff, Fault, ItemOutcome, Outcome, QuarryError, TRANSIENT_FAULT_CODES, WriteOptions,
};
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn options(batch_size: usize, retries: u32) -> WriteOptions {
    WriteOptions::default().batch_size(batch_size).retries(
        retries,
        Duration::from_millis(10),
        Backoff::Exponential,
    )
}

fn busy() -> Fault {
    Fault::new(TRANSIENT_FAULT_CODES[0], "Number of requests exceeded the limit")
}

fn fault_code(outcome: &ItemOutcome) -> Option<i32> {
    match outcome.error().and_then(QuarryError::of) {
        Some(QuarryError::RemoteFault { fault, .. }) => Some(fault.code),
        _ => None,
    }
}

pub async fn retry<S: TestService>(service: &S) {
    let _lock = MUTEX.lock().await;

    // Setup
    service.reset().await;

    // Permanent faults are not retried
    service
        .inject_faults(Fault::new(-2147220989, "Invalid argument"), 1)
        .await;
    let mut outcomes;
    crate::silent_logs! {
        outcomes = write(service, "contact", options(1, 3), [contact_input("Once", "Only")]).await;
    }
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].attempts, 1);
    assert_eq!(fault_code(&outcomes[0]), Some(-2147220989));
    assert!(matches!(
        outcomes[0].outcome,
        Outcome::Failed {
            retryable: false,
            ..
        }
    ));

    // Transient faults are retried until they go away
    service.inject_faults(busy(), 2).await;
    crate::silent_logs! {
        outcomes = write(service, "contact", options(1, 3), [contact_input("Third", "Time")]).await;
    }
    assert!(outcomes[0].is_success(), "{}", outcomes[0]);
    assert_eq!(outcomes[0].attempts, 3);

    // Exhausted retries are terminal and name the input
    service.inject_faults(busy(), 10).await;
    crate::silent_logs! {
        outcomes = write(
            service,
            "contact",
            options(1, 2),
            [contact_input("Never", "Lucky")],
        )
        .await;
    }
    assert_eq!(outcomes[0].attempts, 3);
    assert!(matches!(
        outcomes[0].outcome,
        Outcome::Failed {
            retryable: true,
            ..
        }
    ));
    assert_eq!(fault_code(&outcomes[0]), Some(TRANSIENT_FAULT_CODES[0]));
    let message = format!(
        "{:#}",
        outcomes[0].error().expect("The outcome must be a failure")
    );
    assert!(message.contains("Create of `contact`"), "{message}");
    assert!(message.contains("Lucky"), "{message}");
    service.reset().await;

    // Only the failed items of a batch are sent again
    let (single, multiple) = service.write_calls().await;
    service.inject_faults(busy(), 1).await;
    crate::silent_logs! {
        outcomes = write(
            service,
            "contact",
            options(3, 1),
            [
                contact_input("Retried", "First"),
                contact_input("Passed", "Second"),
                contact_input("Passed", "Third"),
            ],
        )
        .await;
    }
    assert!(outcomes.iter().all(ItemOutcome::is_success), "{outcomes:#?}");
    assert_eq!(
        outcomes.iter().map(|v| v.attempts).collect::<Vec<_>>(),
        [2, 1, 1]
    );
    assert_eq!(service.write_calls().await, (single + 1, multiple + 1));

    // A failed call fails every item it carried
    service.inject_call_faults(busy(), 1).await;
    crate::silent_logs! {
        outcomes = write(
            service,
            "contact",
            options(3, 1),
            (0..3).map(|i| contact_input("Whole", &format!("Call {i}"))),
        )
        .await;
    }
    assert!(outcomes.iter().all(ItemOutcome::is_success), "{outcomes:#?}");
    assert!(outcomes.iter().all(|v| v.attempts == 2));
    service
        .inject_call_faults(Fault::new(-2147204784, "Access denied"), 1)
        .await;
    crate::silent_logs! {
        outcomes = write(
            service,
            "contact",
            options(3, 5),
            (0..3).map(|i| contact_input("Denied", &format!("Call {i}"))),
        )
        .await;
    }
    assert_eq!(outcomes.len(), 3);
    assert!(
        outcomes
            .iter()
            .all(|v| v.attempts == 1 && fault_code(v) == Some(-2147204784))
    );
}
