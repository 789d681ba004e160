use std::sync::Arc;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::debug;

use crate::client::{ClientError, TableClient, UpdateOutcome};
use crate::console;
use crate::context::RunContext;
use crate::request::{IncrementRequest, UpdateItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub iterations: u64,
}

/// Submits batches until the run is cancelled or the iteration limit is hit.
pub async fn run_worker<C: TableClient>(ctx: Arc<RunContext<C>>, worker_id: usize) -> WorkerReport {
    let config = ctx.config();
    let cancel = ctx.cancellation();
    let mut iterations = 0_u64;

    while !cancel.is_cancelled() {
        if config.max_iterations.is_some_and(|limit| iterations >= limit) {
            debug!(worker_id, iterations, "iteration limit reached");
            break;
        }
        iterations += 1;

        let batch: Vec<UpdateItem> = (0..config.batch_size)
            .map(|_| UpdateItem::new(config, IncrementRequest::new(ctx.counter().increment())))
            .collect();
        let results = join_all(batch.iter().map(|item| submit(&ctx, item))).await;

        let mut operational_error = false;
        for result in results {
            match result {
                Ok(outcome) if outcome.is_error() => {
                    report_failed_response(&ctx, worker_id, &outcome)
                }
                Ok(_) | Err(ClientError::Cancelled) => {}
                Err(e) => {
                    ctx.stats().record_operational_error();
                    console::say(exception_line(&e));
                    debug!(worker_id, error = ?e, "operational error");
                    operational_error = true;
                }
            }
        }

        if operational_error {
            if cancel.is_cancelled() {
                break;
            }
            sleep(config.cooldown()).await;
        }

        if cancel.is_cancelled() {
            break;
        }
        if config.iteration_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(config.iteration_delay) => {}
            }
        }
    }

    debug!(worker_id, iterations, "worker stopped");
    WorkerReport {
        worker_id,
        iterations,
    }
}

async fn submit<C: TableClient>(
    ctx: &RunContext<C>,
    item: &UpdateItem,
) -> Result<UpdateOutcome, ClientError> {
    tokio::select! {
        _ = ctx.cancellation().cancelled() => Err(ClientError::Cancelled),
        result = ctx.client().update_item(item) => result,
    }
}

fn report_failed_response<C: TableClient>(
    ctx: &RunContext<C>,
    worker_id: usize,
    outcome: &UpdateOutcome,
) {
    ctx.stats().record_failed_response();
    console::say(failed_response_line(outcome));
    if let Some(fault) = &outcome.fault {
        debug!(
            worker_id,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            code = fault.code.as_deref().unwrap_or_default(),
            message = fault.message.as_deref().unwrap_or_default(),
            "service error detail"
        );
    }
}

fn failed_response_line(outcome: &UpdateOutcome) -> String {
    format!("Error from dynamo {}", outcome.status.as_u16())
}

fn exception_line(error: &ClientError) -> String {
    format!("!! Exception: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::testing::{Behaviour, StubClient};
    use hyper::StatusCode;
    use std::time::Duration;

    fn context(config: RunConfig, behaviour: Behaviour) -> Arc<RunContext<StubClient>> {
        RunContext::new(config, StubClient::new(behaviour))
    }

    #[tokio::test]
    async fn fixed_iterations_across_workers() {
        let mut config = RunConfig::new("T", Duration::ZERO);
        config.worker_count = 2;
        config.batch_size = 3;
        config.max_iterations = Some(5);
        let ctx = context(config, Behaviour::Succeed);

        let handles: Vec<_> = (0..2).map(|id| tokio::spawn(run_worker(ctx.clone(), id))).collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().iterations, 5);
        }
        assert_eq!(ctx.counter().get(), 30);
        assert_eq!(ctx.client().calls(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_paces_iterations() {
        let ctx = context(RunConfig::new("T", Duration::from_millis(100)), Behaviour::Succeed);
        let worker = tokio::spawn(run_worker(ctx.clone(), 0));

        sleep(Duration::from_millis(1050)).await;
        ctx.cancellation().cancel();
        worker.await.unwrap();

        let submitted = ctx.counter().get();
        assert!((9..=11).contains(&submitted), "submitted {submitted}");
    }

    #[tokio::test(start_paused = true)]
    async fn no_new_batch_after_cancellation() {
        let mut config = RunConfig::new("T", Duration::from_millis(10));
        config.batch_size = 4;
        let ctx = context(config, Behaviour::Succeed);
        let worker = tokio::spawn(run_worker(ctx.clone(), 0));

        sleep(Duration::from_millis(95)).await;
        ctx.cancellation().cancel();
        worker.await.unwrap();
        let at_stop = ctx.counter().get();

        sleep(Duration::from_millis(500)).await;
        assert_eq!(ctx.counter().get(), at_stop);
        assert_eq!(at_stop % 4, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_client_cools_down_and_keeps_going() {
        let ctx = context(RunConfig::new("T", Duration::ZERO), Behaviour::Fail);
        let worker = tokio::spawn(run_worker(ctx.clone(), 0));

        sleep(Duration::from_millis(520)).await;
        ctx.cancellation().cancel();
        let report = worker.await.unwrap();

        // 50ms floor: at most one attempt at t=0 and one per elapsed cooldown.
        let submitted = ctx.counter().get();
        assert!((2..=11).contains(&submitted), "submitted {submitted}");
        assert_eq!(report.iterations, submitted);
        assert_eq!(ctx.stats().operational_errors(), submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_is_counted_without_cooldown() {
        let mut config = RunConfig::new("T", Duration::from_millis(10));
        config.max_iterations = Some(3);
        let ctx = context(config, Behaviour::Status(StatusCode::INTERNAL_SERVER_ERROR));

        let report = run_worker(ctx.clone(), 0).await;
        assert_eq!(report.iterations, 3);
        assert_eq!(ctx.stats().failed_responses(), 3);
        assert_eq!(ctx.stats().operational_errors(), 0);
    }

    #[test]
    fn operator_lines() {
        let outcome = UpdateOutcome {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            fault: None,
            elapsed: Duration::ZERO,
        };
        assert_eq!(failed_response_line(&outcome), "Error from dynamo 500");
        assert_eq!(
            exception_line(&ClientError::Timeout(Duration::from_secs(10))),
            "!! Exception: request timed out after 10s"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_in_flight_calls() {
        let mut config = RunConfig::new("T", Duration::ZERO);
        config.batch_size = 2;
        let ctx = context(config, Behaviour::Hang);
        let worker = tokio::spawn(run_worker(ctx.clone(), 0));

        sleep(Duration::from_millis(100)).await;
        ctx.cancellation().cancel();
        let report = worker.await.unwrap();

        assert_eq!(report.iterations, 1);
        assert_eq!(ctx.counter().get(), 2);
        assert_eq!(ctx.stats().operational_errors(), 0);
    }
}
