mod aggregator;
pub mod results;
mod selector;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;

use crate::store::{PollStore, StoreError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid option")]
    InvalidOption,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The vote engine: random selection over the eligible set plus race-safe
/// counter increments, on top of any [`PollStore`].
///
/// "No eligible items" is `Ok(None)` on the selection methods, never an
/// error. The engine holds no state of its own between requests; all
/// shared state lives in the store and is only touched through its atomic
/// primitives.
pub struct VoteEngine<S: PollStore> {
    store: S,
    store_timeout: Duration,
}

impl<S: PollStore> VoteEngine<S> {
    pub fn new(store: S, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one store call, bounded by the configured timeout. A call that
    /// does not come back in time is reported as the store being
    /// unavailable rather than hanging the request.
    pub(crate) async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, EngineError> {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::Unavailable(msg))) => Err(EngineError::StoreUnavailable(msg)),
            Ok(Err(StoreError::Internal(msg))) => Err(EngineError::Internal(msg)),
            Err(_) => Err(EngineError::StoreUnavailable(format!(
                "store call timed out after {:?}",
                self.store_timeout
            ))),
        }
    }
}
