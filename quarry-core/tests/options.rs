#[cfg(test)]
mod tests {
    use quarry_core::{Backoff, MAX_RETRY_DELAY, QuarryError, TRANSIENT_FAULT_CODES, WriteOptions};
    use std::time::Duration;

    fn rejected(options: WriteOptions) -> bool {
        match options.validate() {
            Ok(()) => false,
            Err(error) => matches!(
                QuarryError::of(&error),
                Some(QuarryError::InvalidOptions(..))
            ),
        }
    }

    #[test]
    fn defaults() {
        let options = WriteOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.max_degree_of_parallelism, 1);
        assert_eq!(options.retries, 0);
        assert!(options.is_transient(TRANSIENT_FAULT_CODES[0]));
        assert!(!options.is_transient(-2147204784));
    }

    #[test]
    fn validate() {
        assert!(rejected(WriteOptions::default().batch_size(0)));
        assert!(rejected(WriteOptions::default().max_degree_of_parallelism(0)));
        assert!(rejected(WriteOptions {
            upsert: true,
            ..WriteOptions::default().match_on(["emailaddress1"])
        }));
        assert!(rejected(WriteOptions {
            upsert: true,
            no_update: true,
            ..Default::default()
        }));
        assert!(rejected(WriteOptions {
            no_create: true,
            no_update: true,
            ..Default::default()
        }));
        assert!(rejected(WriteOptions {
            create_only: true,
            update_all_columns: true,
            ..Default::default()
        }));
        assert!(rejected(WriteOptions {
            create_only: true,
            ..WriteOptions::default().match_on(["fullname"])
        }));
        assert!(rejected(WriteOptions {
            allow_multiple_matches: true,
            ..Default::default()
        }));
        assert!(rejected(WriteOptions::default().match_on(Vec::<String>::new())));
        assert!(
            WriteOptions {
                allow_multiple_matches: true,
                no_create: true,
                ..WriteOptions::default()
                    .match_on(["emailaddress1"])
                    .match_on(["firstname", "lastname"])
            }
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn retry_delay() {
        let fixed = WriteOptions::default().retries(3, Duration::from_secs(2), Backoff::Fixed);
        assert_eq!(fixed.retry_delay(1), Duration::from_secs(2));
        assert_eq!(fixed.retry_delay(3), Duration::from_secs(2));
        let exponential =
            WriteOptions::default().retries(10, Duration::from_secs(5), Backoff::Exponential);
        assert_eq!(exponential.retry_delay(1), Duration::from_secs(5));
        assert_eq!(exponential.retry_delay(2), Duration::from_secs(10));
        assert_eq!(exponential.retry_delay(4), Duration::from_secs(40));
        assert_eq!(exponential.retry_delay(7), MAX_RETRY_DELAY);
        assert_eq!(exponential.retry_delay(40), MAX_RETRY_DELAY);
    }
}
