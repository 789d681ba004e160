use std::time::Duration;

use clap::ValueEnum;
use hyper::Uri;
use thiserror::Error;

use crate::LoadGeneratorInputs;

pub const USAGE: &str = "Requires 2 arguments, <table name> and <write delay>.  Optionally also <num concurrent tasks> <num requests per batch>.";

pub const DEFAULT_REGION: &str = "us-east-1";

// Floor for the pause taken after an unexpected error.
const MIN_COOLDOWN: Duration = Duration::from_millis(50);
const COOLDOWN_FACTOR: u32 = 4;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required arguments")]
    MissingArguments,
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// How the per-request value is written into the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ValueKind {
    /// `ADD` to a numeric attribute.
    #[default]
    Number,
    /// `ADD` of a one-element number set.
    NumberSet,
}

/// Immutable settings shared by every worker.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub table_name: String,
    pub iteration_delay: Duration,
    pub worker_count: usize,
    pub batch_size: usize,
    pub key_attribute: String,
    pub value_attribute: String,
    pub value_kind: ValueKind,
    pub report_interval: Duration,
    /// Per-worker iteration limit. `None` runs until cancelled.
    pub max_iterations: Option<u64>,
}

impl RunConfig {
    pub fn new(table_name: impl Into<String>, iteration_delay: Duration) -> Self {
        Self {
            table_name: table_name.into(),
            iteration_delay,
            worker_count: 1,
            batch_size: 1,
            key_attribute: String::from("key"),
            value_attribute: String::from("datavalue"),
            value_kind: ValueKind::default(),
            report_interval: Duration::from_secs(1),
            max_iterations: None,
        }
    }

    /// Pause after an unexpected error: four times the iteration delay, never below 50ms.
    pub fn cooldown(&self) -> Duration {
        (self.iteration_delay * COOLDOWN_FACTOR).max(MIN_COOLDOWN)
    }
}

/// Where and how the table client connects.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub endpoint: Uri,
    pub region: String,
    /// Attempts per call, first try included. The SDK owns the backoff between them.
    pub max_attempts: u32,
    pub request_timeout: Duration,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl ClientSettings {
    /// Plaintext regional endpoint, suited to test environments.
    pub fn for_region(region: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            endpoint: parse_endpoint(&default_endpoint(region))?,
            region: region.to_string(),
            max_attempts: 3,
            request_timeout: Duration::from_secs(10),
            access_key_id: None,
            secret_access_key: None,
        })
    }
}

fn default_endpoint(region: &str) -> String {
    format!("http://dynamodb.{region}.amazonaws.com")
}

fn parse_endpoint(endpoint: &str) -> Result<Uri, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let uri: Uri = endpoint.parse().map_err(|e| invalid(format!("{e}")))?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme {other}"))),
        None => return Err(invalid(String::from("missing scheme"))),
    }
    if uri.host().is_none() {
        return Err(invalid(String::from("missing host")));
    }
    Ok(uri)
}

/// Validates the command line into the run configuration and client settings.
pub fn from_inputs(
    input: &LoadGeneratorInputs,
) -> Result<(RunConfig, ClientSettings), ConfigurationError> {
    let (Some(table_name), Some(delay_ms)) = (&input.table_name, input.delay_ms) else {
        return Err(ConfigurationError::MissingArguments);
    };
    if table_name.is_empty() {
        return Err(ConfigurationError::EmptyTableName);
    }

    let mut config = RunConfig::new(table_name.clone(), Duration::from_millis(delay_ms));
    config.worker_count = input.workers.unwrap_or(1) as usize;
    config.batch_size = input.batch_size.unwrap_or(1) as usize;
    config.key_attribute = input.key_attribute.clone();
    config.value_attribute = input.value_attribute.clone();
    config.value_kind = input.value_kind;
    config.report_interval = Duration::from_millis(input.report_interval_ms);
    config.max_iterations = input.iterations;

    let mut settings = ClientSettings::for_region(&input.region)?;
    if let Some(endpoint) = &input.endpoint {
        settings.endpoint = parse_endpoint(endpoint)?;
    }
    settings.max_attempts = input.max_attempts;
    settings.request_timeout = Duration::from_millis(input.request_timeout_ms);
    settings.access_key_id = input.access_key_id.clone();
    settings.secret_access_key = input.secret_access_key.clone();

    Ok((config, settings))
}
