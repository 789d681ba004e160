use aws_sdk_dynamodb::config::retry::RetryConfig;
use aws_sdk_dynamodb::config::timeout::TimeoutConfig;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use hyper::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

use crate::config::{ClientSettings, ValueKind};
use crate::request::{UPDATE_EXPRESSION, UpdateItem, VALUE_NAME, VALUE_PLACEHOLDER};

const CREDENTIALS_SOURCE: &str = "table_load_generator";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The call was abandoned because the run is shutting down.
    #[error("request cancelled")]
    Cancelled,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Construction, dispatch or response failures that never produced a service status.
    #[error("{0}")]
    Sdk(String),
}

/// Code and message the service attached to a failed status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFault {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Result of a call that reached the service.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub status: StatusCode,
    pub fault: Option<ServiceFault>,
    pub elapsed: Duration,
}

impl UpdateOutcome {
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// Anything that can apply an atomic add to one item of a remote table.
///
/// Implementations are shared by every worker and must tolerate concurrent calls.
pub trait TableClient: Send + Sync + 'static {
    fn update_item(
        &self,
        item: &UpdateItem,
    ) -> impl Future<Output = Result<UpdateOutcome, ClientError>> + Send;
}

/// `UpdateItem` through the DynamoDB SDK, which owns signing, retries and the wire format.
#[derive(Clone, Debug)]
pub struct SdkTableClient {
    client: aws_sdk_dynamodb::Client,
    request_timeout: Duration,
}

impl SdkTableClient {
    /// Resolves credentials through the default provider chain unless static keys are set.
    pub async fn load(settings: &ClientSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint.to_string())
            .retry_config(retry_config(settings))
            .timeout_config(timeout_config(settings));
        if let Some(credentials) = static_credentials(settings) {
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;
        Self {
            client: aws_sdk_dynamodb::Client::new(&sdk_config),
            request_timeout: settings.request_timeout,
        }
    }

    /// Builds the client from settings alone, without consulting the environment.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint.to_string())
            .retry_config(retry_config(settings))
            .timeout_config(timeout_config(settings));
        if let Some(credentials) = static_credentials(settings) {
            builder = builder.credentials_provider(credentials);
        }
        Self {
            client: aws_sdk_dynamodb::Client::from_conf(builder.build()),
            request_timeout: settings.request_timeout,
        }
    }
}

fn retry_config(settings: &ClientSettings) -> RetryConfig {
    RetryConfig::standard().with_max_attempts(settings.max_attempts)
}

fn timeout_config(settings: &ClientSettings) -> TimeoutConfig {
    TimeoutConfig::builder()
        .operation_timeout(settings.request_timeout)
        .build()
}

fn static_credentials(settings: &ClientSettings) -> Option<Credentials> {
    let (Some(access_key_id), Some(secret_access_key)) =
        (&settings.access_key_id, &settings.secret_access_key)
    else {
        return None;
    };
    Some(Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        CREDENTIALS_SOURCE,
    ))
}

fn delta_value(item: &UpdateItem) -> AttributeValue {
    let delta = item.request.delta.to_string();
    match item.value_kind {
        ValueKind::Number => AttributeValue::N(delta),
        ValueKind::NumberSet => AttributeValue::Ns(vec![delta]),
    }
}

impl TableClient for SdkTableClient {
    async fn update_item(&self, item: &UpdateItem) -> Result<UpdateOutcome, ClientError> {
        let start_time = Instant::now();
        let result = self
            .client
            .update_item()
            .table_name(&item.table_name)
            .key(
                &item.key_attribute,
                AttributeValue::S(item.request.key.to_string()),
            )
            .update_expression(UPDATE_EXPRESSION)
            .expression_attribute_names(VALUE_NAME, &item.value_attribute)
            .expression_attribute_values(VALUE_PLACEHOLDER, delta_value(item))
            .send()
            .await;
        let elapsed = start_time.elapsed();

        match result {
            Ok(_) => {
                trace!(elapsed_ms = elapsed.as_millis() as u64, "update_item");
                Ok(UpdateOutcome {
                    status: StatusCode::OK,
                    fault: None,
                    elapsed,
                })
            }
            Err(SdkError::ServiceError(context)) => {
                let status = StatusCode::from_u16(context.raw().status().as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let err = context.err();
                Ok(UpdateOutcome {
                    status,
                    fault: Some(ServiceFault {
                        code: err.code().map(str::to_string),
                        message: err.message().map(str::to_string),
                    }),
                    elapsed,
                })
            }
            Err(SdkError::TimeoutError(_)) => Err(ClientError::Timeout(self.request_timeout)),
            Err(e) => Err(ClientError::Sdk(DisplayErrorContext(&e).to_string())),
        }
    }
}
