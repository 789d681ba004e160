use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info};

use crate::client::TableClient;
use crate::console;
use crate::context::RunContext;
use crate::input::ShutdownSignal;
use crate::worker::{WorkerReport, run_worker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: u64,
    pub failed_responses: u64,
    pub operational_errors: u64,
    pub workers: Vec<WorkerReport>,
    pub elapsed: Duration,
}

/// Runs `worker_count` workers, reporting progress until a shutdown signal
/// arrives or every worker finishes by itself, then waits for all of them.
pub async fn start_test<C, S>(ctx: Arc<RunContext<C>>, mut signals: S) -> RunSummary
where
    C: TableClient,
    S: Stream<Item = ShutdownSignal> + Unpin,
{
    let start_time = Instant::now();
    let config = ctx.config();
    let cancel = ctx.cancellation();

    let mut set = JoinSet::new();
    for worker_id in 0..config.worker_count {
        set.spawn(run_worker(ctx.clone(), worker_id));
    }
    console::say("Running. Press Q to quit.");

    let mut reports = Vec::with_capacity(config.worker_count);
    // Skip the immediate first tick, the first report comes one interval in.
    let mut interval = interval_at(start_time + config.report_interval, config.report_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut signals_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            signal = signals.next(), if signals_open => match signal {
                Some(signal) => {
                    info!(?signal, "shutdown requested");
                    cancel.cancel();
                    break;
                }
                None => {
                    debug!("shutdown signal source closed");
                    signals_open = false;
                }
            },
            _ = interval.tick() => {
                console::say(format_args!("{} items submitted.", ctx.counter().get()))
            }
            joined = set.join_next() => match joined {
                Some(joined) => collect(&mut reports, joined),
                None => break,
            },
        }
    }

    console::say("Waiting for tasks to end.");
    cancel.cancel();
    while let Some(joined) = set.join_next().await {
        collect(&mut reports, joined);
    }
    reports.sort_by_key(|report| report.worker_id);

    RunSummary {
        submitted: ctx.counter().get(),
        failed_responses: ctx.stats().failed_responses(),
        operational_errors: ctx.stats().operational_errors(),
        workers: reports,
        elapsed: start_time.elapsed(),
    }
}

fn collect(reports: &mut Vec<WorkerReport>, joined: Result<WorkerReport, JoinError>) {
    match joined {
        Ok(report) => reports.push(report),
        Err(e) => error!("worker task failed: {e}"),
    }
}
