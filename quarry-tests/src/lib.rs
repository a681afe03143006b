mod cancellation;
mod columns;
mod fixtures;
mod joins;
mod matching;
mod pipeline;
mod queries;
mod reading;
mod retry;

use crate::{
    cancellation::cancellation, columns::columns, joins::joins, matching::matching,
    pipeline::pipeline, queries::queries, reading::reading, retry::retry,
};
pub use fixtures::*;
use log::LevelFilter;
use quarry::{Fault, Service};
use quarry_memory::MemoryService;
use std::{env, future::Future};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// A service the scenarios can drive: its data can be wiped, faults injected and write
/// calls observed.
pub trait TestService: Service {
    /// Drop every record, pending fault and call count.
    fn reset(&self) -> impl Future<Output = ()> + Send;

    /// Fail each of the next `count` write requests with `fault`.
    fn inject_faults(&self, fault: Fault, count: usize) -> impl Future<Output = ()> + Send;

    /// Fail each of the next `count` write calls as a whole with `fault`.
    fn inject_call_faults(&self, fault: Fault, count: usize) -> impl Future<Output = ()> + Send;

    /// Single and multiple request calls received since the last reset.
    fn write_calls(&self) -> impl Future<Output = (usize, usize)> + Send;
}

impl TestService for MemoryService {
    async fn reset(&self) {
        MemoryService::reset(self).await
    }
    async fn inject_faults(&self, fault: Fault, count: usize) {
        MemoryService::inject_faults(self, fault, count).await
    }
    async fn inject_call_faults(&self, fault: Fault, count: usize) {
        MemoryService::inject_call_faults(self, fault, count).await
    }
    async fn write_calls(&self) -> (usize, usize) {
        let calls = self.calls().await;
        (calls.execute, calls.execute_multiple)
    }
}

/// Run every scenario, `service` must declare the entities of [`contact_metadata`] and
/// [`account_metadata`].
pub async fn execute_tests<S: TestService>(service: S) {
    queries(&service).await;
    joins(&service).await;
    columns(&service).await;
    reading(&service).await;
    matching(&service).await;
    pipeline(&service).await;
    retry(&service).await;
    cancellation(&service).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
