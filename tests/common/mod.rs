#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use dagrun::engine::{Executor, ExecutorConfig};

pub use dagrun_test_utils::builders;
pub use dagrun_test_utils::{ConcurrencyGauge, RecordingSink, init_tracing, with_timeout};

/// Executor whose lifecycle events are captured by the returned sink.
pub fn recording_executor(config: ExecutorConfig) -> (Executor, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let executor = Executor::new(config)
        .expect("valid executor config")
        .with_sink(sink.clone());
    (executor, sink)
}
