//! Shapes engine outputs into the wire payloads clients consume. Pure
//! transformations, no store access.

use serde::{Deserialize, Serialize};

use crate::models::{Poll, Question, QuestionTally};

/// Substituted for a descriptive label the stored record is missing.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollPayload {
    pub id: String,
    pub category: String,
    pub approved: bool,
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionPayload {
    pub label: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub id: String,
    pub red: String,
    pub blue: String,
}

/// Standings sent back after a question vote: both labels plus both
/// post-increment counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStandings {
    pub question_red: String,
    pub question_blue: String,
    pub votes_red: i64,
    pub votes_blue: i64,
}

pub fn poll_payload(poll: Poll) -> PollPayload {
    PollPayload {
        id: poll.id,
        category: poll.category,
        approved: poll.approved,
        options: poll
            .options
            .into_iter()
            .map(|o| OptionPayload {
                label: o.label,
                votes: o.votes,
            })
            .collect(),
    }
}

pub fn question_payload(question: Question) -> QuestionPayload {
    QuestionPayload {
        id: question.id,
        red: question.red_label.unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        blue: question
            .blue_label
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
    }
}

pub fn question_standings(question: &Question, tally: &QuestionTally) -> QuestionStandings {
    QuestionStandings {
        question_red: question
            .red_label
            .clone()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        question_blue: question
            .blue_label
            .clone()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
        votes_red: tally.votes_red,
        votes_blue: tally.votes_blue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn poll_payload_keeps_option_order_and_counts() {
        let mut poll = Poll::new(
            "food".to_string(),
            vec!["Pizza".to_string(), "Tacos".to_string()],
        );
        poll.options[1].votes = 3;

        let payload = poll_payload(poll.clone());
        assert_eq!(payload.id, poll.id);
        assert_eq!(payload.options[0].label, "Pizza");
        assert_eq!(payload.options[1].votes, 3);
    }

    #[test]
    fn missing_labels_fall_back_to_unknown() {
        let question = Question {
            id: "q1".to_string(),
            red_label: None,
            blue_label: Some("Fly".to_string()),
            created_at: Utc::now(),
        };
        let tally = QuestionTally {
            question_id: "q1".to_string(),
            votes_red: 2,
            votes_blue: 5,
        };

        let payload = question_payload(question.clone());
        assert_eq!(payload.red, UNKNOWN_LABEL);
        assert_eq!(payload.blue, "Fly");

        let standings = question_standings(&question, &tally);
        assert_eq!(standings.question_red, UNKNOWN_LABEL);
        assert_eq!(standings.question_blue, "Fly");
        assert_eq!(standings.votes_red, 2);
        assert_eq!(standings.votes_blue, 5);
    }
}
