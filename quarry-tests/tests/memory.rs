#[cfg(test)]
mod tests {
    use quarry_memory::MemoryService;
    use quarry_tests::{account_metadata, contact_metadata, execute_tests, init_logs};

    #[tokio::test]
    async fn memory() {
        init_logs();
        execute_tests(
            MemoryService::new()
                .with_entity(contact_metadata())
                .with_entity(account_metadata()),
        )
        .await;
    }
}
