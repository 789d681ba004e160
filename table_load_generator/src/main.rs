use std::io::Write;

use clap::Parser;
use tracing::{debug, info};

mod client;
mod config;
mod console;
mod context;
mod input;
mod logging;
mod request;
mod runner;
#[cfg(test)]
mod testing;
mod worker;

use crate::client::SdkTableClient;
use crate::config::{ClientSettings, ConfigurationError, RunConfig, USAGE, ValueKind};
use crate::context::RunContext;

#[derive(Parser, Debug)]
#[command(version, about = "Drives concurrent UpdateItem increments against a table", long_about = None)]
pub struct LoadGeneratorInputs {
    /// Table to write to
    table_name: Option<String>,
    /// Pause between iterations of each worker, in milliseconds
    delay_ms: Option<u64>,
    /// Number of concurrent workers
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    workers: Option<u32>,
    /// Requests submitted together per iteration
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: Option<u32>,

    /// Endpoint to send requests to, overriding the regional default
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long, default_value = config::DEFAULT_REGION)]
    region: String,
    /// Attempts per request, first try included
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,
    #[arg(long, default_value_t = 10_000)]
    request_timeout_ms: u64,
    /// Static credentials, e.g. for a local endpoint. Otherwise the default provider chain is used
    #[arg(long, requires = "secret_access_key")]
    access_key_id: Option<String>,
    #[arg(long, requires = "access_key_id")]
    secret_access_key: Option<String>,
    #[arg(long, default_value = "key")]
    key_attribute: String,
    #[arg(long, default_value = "datavalue")]
    value_attribute: String,
    #[arg(long, value_enum, default_value_t = ValueKind::Number)]
    value_kind: ValueKind,
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    report_interval_ms: u64,
    /// Stop each worker after this many iterations instead of waiting for Q
    #[arg(long)]
    iterations: Option<u64>,
    #[arg(long)]
    debug: bool,
}

/// Validates the inputs. Missing required arguments print the usage line to `out`
/// and yield `None`, in which case nothing else runs.
fn bootstrap(
    inputs: &LoadGeneratorInputs,
    out: &mut impl Write,
) -> eyre::Result<Option<(RunConfig, ClientSettings)>> {
    match config::from_inputs(inputs) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(ConfigurationError::MissingArguments) => {
            writeln!(out, "{USAGE}")?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let inputs = LoadGeneratorInputs::parse();

    let Some((config, settings)) = bootstrap(&inputs, &mut std::io::stdout())? else {
        return Ok(());
    };
    logging::init_tracing(inputs.debug)?;

    info!(
        table = %config.table_name,
        endpoint = %settings.endpoint,
        region = %settings.region,
        workers = config.worker_count,
        batch_size = config.batch_size,
        delay_ms = config.iteration_delay.as_millis() as u64,
        "starting load"
    );

    let client = SdkTableClient::load(&settings).await;
    let ctx = RunContext::new(config, client);
    let mut signals = input::operator_signals(ctx.cancellation().clone());
    let summary = runner::start_test(ctx, &mut signals).await;
    signals.close().await;

    for report in &summary.workers {
        debug!(worker_id = report.worker_id, iterations = report.iterations, "worker finished");
    }
    info!(
        submitted = summary.submitted,
        failed_responses = summary.failed_responses,
        operational_errors = summary.operational_errors,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "run finished"
    );
    Ok(())
}
