use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Choice, Poll, PollFilter, Question, QuestionTally};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("internal store error: {0}")]
    Internal(String),
}

/// What the vote engine requires from durable storage. Counter mutations
/// must be single atomic operations on the store side; the engine never
/// reads a counter and writes back a derived value.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Number of polls matching the filter.
    async fn count_polls(&self, filter: &PollFilter) -> Result<u64, StoreError>;

    /// The poll at `offset` within the filtered result set, under a
    /// store-defined stable ordering. Returns `None` when the offset is
    /// past the end (the set may have shrunk since it was counted).
    async fn poll_at(&self, filter: &PollFilter, offset: u64) -> Result<Option<Poll>, StoreError>;

    async fn poll_by_id(&self, id: &str) -> Result<Option<Poll>, StoreError>;

    /// Atomically add 1 to the counter of the option at `option_index`.
    /// Returns whether any counter row matched; `false` means either the
    /// poll does not exist or the index is out of range, and nothing was
    /// written.
    async fn increment_poll_option(
        &self,
        id: &str,
        option_index: usize,
    ) -> Result<bool, StoreError>;

    async fn count_questions(&self) -> Result<u64, StoreError>;

    async fn question_at(&self, offset: u64) -> Result<Option<Question>, StoreError>;

    async fn question_by_id(&self, id: &str) -> Result<Option<Question>, StoreError>;

    /// Atomically add 1 to one side of the question's tally, creating the
    /// tally row with that side at 1 if it does not exist yet. Returns the
    /// post-increment tally.
    async fn increment_question_tally(
        &self,
        id: &str,
        choice: Choice,
    ) -> Result<QuestionTally, StoreError>;
}
