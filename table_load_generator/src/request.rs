use uuid::Uuid;

use crate::config::{RunConfig, ValueKind};

pub const VALUE_NAME: &str = "#datavalue";
pub const VALUE_PLACEHOLDER: &str = ":value";
pub const UPDATE_EXPRESSION: &str = "ADD #datavalue :value";

/// One increment: a fresh random key and the value to add under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementRequest {
    pub key: Uuid,
    pub delta: u64,
}

impl IncrementRequest {
    pub fn new(delta: u64) -> Self {
        Self {
            key: Uuid::new_v4(),
            delta,
        }
    }
}

/// A fully addressed update, ready to hand to a [`crate::client::TableClient`].
#[derive(Debug, Clone)]
pub struct UpdateItem {
    pub table_name: String,
    pub key_attribute: String,
    pub value_attribute: String,
    pub value_kind: ValueKind,
    pub request: IncrementRequest,
}

impl UpdateItem {
    pub fn new(config: &RunConfig, request: IncrementRequest) -> Self {
        Self {
            table_name: config.table_name.clone(),
            key_attribute: config.key_attribute.clone(),
            value_attribute: config.value_attribute.clone(),
            value_kind: config.value_kind,
            request,
        }
    }
}
