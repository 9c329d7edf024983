use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub category: String,
    pub approved: bool,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub votes: i64,
}

/// A two-sided "would you rather" question. Labels are nullable in storage;
/// the result assembler substitutes a fallback when one is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub red_label: Option<String>,
    pub blue_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-question vote counters. At most one tally row exists per question;
/// the first vote creates it via the store's atomic upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTally {
    pub question_id: String,
    pub votes_red: i64,
    pub votes_blue: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Red,
    Blue,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Red => "red",
            Choice::Blue => "blue",
        }
    }
}

impl FromStr for Choice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" => Ok(Choice::Red),
            "blue" => Ok(Choice::Blue),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds the eligible set for random selection: only approved items,
/// optionally restricted to one category.
#[derive(Debug, Clone)]
pub struct PollFilter {
    pub category: Option<String>,
    pub approved: bool,
}

impl PollFilter {
    pub fn approved() -> Self {
        Self {
            category: None,
            approved: true,
        }
    }

    pub fn approved_in(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            approved: true,
        }
    }
}

impl Poll {
    pub fn new(category: String, option_labels: Vec<String>) -> Self {
        let options = option_labels
            .into_iter()
            .map(|label| PollOption { label, votes: 0 })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            category,
            approved: false,
            options,
            created_at: Utc::now(),
        }
    }
}

impl Question {
    pub fn new(red_label: String, blue_label: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            red_label: Some(red_label),
            blue_label: Some(blue_label),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_poll_starts_unapproved_with_zeroed_counters() {
        let poll = Poll::new(
            "food".to_string(),
            vec!["Pizza".to_string(), "Tacos".to_string()],
        );
        assert!(!poll.approved);
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|o| o.votes == 0));
    }

    #[test]
    fn choice_parses_wire_strings() {
        assert_eq!("red".parse::<Choice>(), Ok(Choice::Red));
        assert_eq!("blue".parse::<Choice>(), Ok(Choice::Blue));
        assert!("green".parse::<Choice>().is_err());
    }
}
