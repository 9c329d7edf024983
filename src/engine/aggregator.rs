use log::info;

use super::{EngineError, VoteEngine};
use crate::models::{Choice, Poll, Question, QuestionTally};
use crate::store::PollStore;

impl<S: PollStore> VoteEngine<S> {
    /// Apply exactly one vote to the option at `option_index` and return
    /// the full updated poll.
    ///
    /// The increment is a single atomic operation on the store side; this
    /// method never reads a counter and writes a derived value back, so
    /// concurrent votes on the same poll cannot lose updates.
    pub async fn vote_poll(
        &self,
        poll_id: &str,
        option_index: usize,
    ) -> Result<Poll, EngineError> {
        let matched = self
            .bounded(self.store().increment_poll_option(poll_id, option_index))
            .await?;

        if !matched {
            // Nothing was written. Distinguish a missing poll from an
            // out-of-range option index.
            return match self.bounded(self.store().poll_by_id(poll_id)).await? {
                None => Err(EngineError::NotFound),
                Some(_) => Err(EngineError::InvalidOption),
            };
        }

        info!("Vote recorded for poll {} option {}", poll_id, option_index);

        // Re-read for the response only; the counter was already moved
        // atomically above.
        match self.bounded(self.store().poll_by_id(poll_id)).await? {
            Some(poll) => Ok(poll),
            None => Err(EngineError::Internal(format!(
                "poll {} vanished after increment",
                poll_id
            ))),
        }
    }

    /// Apply exactly one vote to one side of a question and return the
    /// question together with its post-increment tally.
    ///
    /// The tally row is created by the first vote through the store's
    /// atomic upsert; two concurrent first votes end up as one row with
    /// both increments applied.
    pub async fn vote_question(
        &self,
        question_id: &str,
        choice: Choice,
    ) -> Result<(Question, QuestionTally), EngineError> {
        let question = match self.bounded(self.store().question_by_id(question_id)).await? {
            Some(question) => question,
            None => return Err(EngineError::NotFound),
        };

        let tally = self
            .bounded(self.store().increment_question_tally(question_id, choice))
            .await?;

        info!("Vote recorded for question {} side {}", question_id, choice);
        Ok((question, tally))
    }
}
