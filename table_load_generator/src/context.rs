use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use crate::client::TableClient;
use crate::config::RunConfig;

/// Total increment requests submitted since start.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

impl RequestCounter {
    /// Counts one more request and returns the new total.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct RunStats {
    failed_responses: AtomicU64,
    operational_errors: AtomicU64,
}

impl RunStats {
    pub fn record_failed_response(&self) {
        self.failed_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_operational_error(&self) {
        self.operational_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_responses(&self) -> u64 {
        self.failed_responses.load(Ordering::Relaxed)
    }

    pub fn operational_errors(&self) -> u64 {
        self.operational_errors.load(Ordering::Relaxed)
    }
}

/// Everything the workers and the controller share for one run.
pub struct RunContext<C> {
    config: RunConfig,
    client: C,
    counter: RequestCounter,
    stats: RunStats,
    cancel: CancellationToken,
}

impl<C: TableClient> RunContext<C> {
    pub fn new(config: RunConfig, client: C) -> Arc<Self> {
        Arc::new(Self {
            config,
            client,
            counter: RequestCounter::default(),
            stats: RunStats::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
