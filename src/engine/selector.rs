use log::debug;
use rand::Rng;

use super::{EngineError, VoteEngine};
use crate::models::{Poll, PollFilter, Question};
use crate::store::PollStore;

/// Uniform draw from `[0, n)`. Caller guarantees `n > 0`.
fn draw_index(n: u64) -> u64 {
    rand::thread_rng().gen_range(0..n)
}

impl<S: PollStore> VoteEngine<S> {
    /// Pick one approved poll uniformly at random, optionally restricted to
    /// a category. Returns `Ok(None)` when nothing matches.
    ///
    /// The count and the offset fetch are two separate reads; if the
    /// eligible set shrinks in between, the fetch can come back empty and
    /// is reported as no match rather than an error.
    pub async fn random_poll(&self, category: Option<&str>) -> Result<Option<Poll>, EngineError> {
        let filter = match category {
            Some(c) => PollFilter::approved_in(c),
            None => PollFilter::approved(),
        };

        let count = self.bounded(self.store().count_polls(&filter)).await?;
        if count == 0 {
            debug!("No eligible polls for category {:?}", filter.category);
            return Ok(None);
        }

        let index = draw_index(count);
        self.bounded(self.store().poll_at(&filter, index)).await
    }

    /// Pick one question uniformly at random, or `Ok(None)` when the store
    /// holds none.
    pub async fn random_question(&self) -> Result<Option<Question>, EngineError> {
        let count = self.bounded(self.store().count_questions()).await?;
        if count == 0 {
            debug!("No questions in store");
            return Ok(None);
        }

        let index = draw_index(count);
        self.bounded(self.store().question_at(index)).await
    }
}
