//! Stub table clients for exercising workers and the controller without a network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hyper::StatusCode;

use crate::client::{ClientError, TableClient, UpdateOutcome};
use crate::request::UpdateItem;

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Succeed,
    Status(StatusCode),
    Fail,
    /// Never completes, so only cancellation ends the call.
    Hang,
}

#[derive(Debug)]
pub struct StubClient {
    behaviour: Behaviour,
    calls: AtomicU64,
}

impl StubClient {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TableClient for StubClient {
    async fn update_item(&self, _item: &UpdateItem) -> Result<UpdateOutcome, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = match self.behaviour {
            Behaviour::Succeed => StatusCode::OK,
            Behaviour::Status(status) => status,
            Behaviour::Fail => return Err(ClientError::Timeout(Duration::from_secs(10))),
            Behaviour::Hang => std::future::pending().await,
        };
        Ok(UpdateOutcome {
            status,
            fault: None,
            elapsed: Duration::ZERO,
        })
    }
}
