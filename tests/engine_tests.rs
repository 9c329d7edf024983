use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::Row;
use tempfile::TempDir;

use pollcast::db::Database;
use pollcast::engine::{EngineError, VoteEngine};
use pollcast::models::{Choice, Poll, PollFilter, Question, QuestionTally};
use pollcast::store::{PollStore, StoreError};

const STORE_TIMEOUT: Duration = Duration::from_secs(5);

async fn open_engine(dir: &TempDir) -> VoteEngine<Database> {
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let database = Database::new(&url).await.expect("failed to open test db");
    VoteEngine::new(database, STORE_TIMEOUT)
}

async fn seed_approved_poll(
    engine: &VoteEngine<Database>,
    category: &str,
    labels: &[&str],
) -> String {
    let poll = Poll::new(
        category.to_string(),
        labels.iter().map(|l| l.to_string()).collect(),
    );
    engine.store().create_poll(&poll).await.unwrap();
    engine.store().approve_poll(&poll.id).await.unwrap();
    poll.id
}

#[tokio::test]
async fn empty_store_yields_no_match_not_an_error() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;

    assert!(engine.random_poll(Some("food")).await.unwrap().is_none());
    assert!(engine.random_poll(None).await.unwrap().is_none());
    assert!(engine.random_question().await.unwrap().is_none());
}

#[tokio::test]
async fn random_poll_only_returns_approved_polls_in_category() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;

    let mut food_ids = HashSet::new();
    for labels in [["Pizza", "Tacos"], ["Sushi", "Ramen"], ["Curry", "Pho"]] {
        food_ids.insert(seed_approved_poll(&engine, "food", &labels).await);
    }
    seed_approved_poll(&engine, "music", &["Vinyl", "Streaming"]).await;

    // Unapproved poll in the same category must never be selected.
    let pending = Poll::new(
        "food".to_string(),
        vec!["Soup".to_string(), "Salad".to_string()],
    );
    engine.store().create_poll(&pending).await.unwrap();

    let mut seen = HashSet::new();
    for _ in 0..200 {
        let poll = engine
            .random_poll(Some("food"))
            .await
            .unwrap()
            .expect("eligible set is non-empty");
        assert!(food_ids.contains(&poll.id), "selected ineligible poll");
        assert_eq!(poll.category, "food");
        assert!(poll.approved);
        seen.insert(poll.id);
    }

    // 200 draws over 3 polls: all of them should have come up.
    assert_eq!(seen, food_ids);
}

#[tokio::test]
async fn single_vote_moves_exactly_one_counter_by_one() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;
    let id = seed_approved_poll(&engine, "food", &["Pizza", "Tacos", "Sushi"]).await;

    let updated = engine.vote_poll(&id, 1).await.unwrap();
    let votes: Vec<i64> = updated.options.iter().map(|o| o.votes).collect();
    assert_eq!(votes, vec![0, 1, 0]);
}

#[tokio::test]
async fn concurrent_votes_lose_no_updates() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(&dir).await);
    let id = seed_approved_poll(&engine, "food", &["Pizza", "Tacos"]).await;

    let mut handles = Vec::new();
    for i in 0..50 {
        let engine = Arc::clone(&engine);
        let id = id.clone();
        // 30 votes for option 0, 20 for option 1.
        let option = usize::from(i % 5 >= 3);
        handles.push(tokio::spawn(
            async move { engine.vote_poll(&id, option).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let poll = engine.store().poll_by_id(&id).await.unwrap().unwrap();
    assert_eq!(poll.options[0].votes, 30);
    assert_eq!(poll.options[1].votes, 20);
}

#[tokio::test]
async fn vote_on_unknown_poll_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;

    let err = engine.vote_poll("no-such-poll", 0).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound));

    // Nothing may have been created as a side effect.
    let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM poll_options")
        .fetch_one(engine.store().pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn out_of_range_option_is_rejected_and_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;
    let id = seed_approved_poll(&engine, "food", &["Pizza", "Tacos"]).await;

    let err = engine.vote_poll(&id, 5).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidOption));

    let poll = engine.store().poll_by_id(&id).await.unwrap().unwrap();
    assert!(poll.options.iter().all(|o| o.votes == 0));
    assert_eq!(poll.options.len(), 2);
}

#[tokio::test]
async fn first_question_vote_creates_tally_at_one() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;

    let question = Question::new("Teleport".to_string(), "Fly".to_string());
    engine.store().create_question(&question).await.unwrap();

    let (_, tally) = engine.vote_question(&question.id, Choice::Red).await.unwrap();
    assert_eq!(tally.votes_red, 1);
    assert_eq!(tally.votes_blue, 0);

    let (q, tally) = engine
        .vote_question(&question.id, Choice::Blue)
        .await
        .unwrap();
    assert_eq!(tally.votes_red, 1);
    assert_eq!(tally.votes_blue, 1);
    assert_eq!(q.red_label.as_deref(), Some("Teleport"));
}

#[tokio::test]
async fn concurrent_first_votes_create_exactly_one_tally() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(&dir).await);

    let question = Question::new("Teleport".to_string(), "Fly".to_string());
    engine.store().create_question(&question).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..50 {
        let engine = Arc::clone(&engine);
        let id = question.id.clone();
        let choice = if i % 2 == 0 { Choice::Red } else { Choice::Blue };
        handles.push(tokio::spawn(
            async move { engine.vote_question(&id, choice).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM question_tallies")
        .fetch_one(engine.store().pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(rows, 1, "concurrent first votes must not duplicate the tally");

    let row = sqlx::query("SELECT votes_red, votes_blue FROM question_tallies")
        .fetch_one(engine.store().pool())
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("votes_red"), 25);
    assert_eq!(row.get::<i64, _>("votes_blue"), 25);
}

#[tokio::test]
async fn vote_on_unknown_question_is_not_found_and_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir).await;

    let err = engine
        .vote_question("no-such-question", Choice::Red)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound));

    let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM question_tallies")
        .fetch_one(engine.store().pool())
        .await
        .unwrap()
        .get("n");
    assert_eq!(rows, 0);
}

/// Store whose every call hangs, to exercise the engine's timeout bound.
struct StalledStore;

async fn stall<T>() -> Result<T, StoreError> {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Err(StoreError::Unavailable("unreachable".to_string()))
}

#[async_trait]
impl PollStore for StalledStore {
    async fn count_polls(&self, _: &PollFilter) -> Result<u64, StoreError> {
        stall().await
    }
    async fn poll_at(&self, _: &PollFilter, _: u64) -> Result<Option<Poll>, StoreError> {
        stall().await
    }
    async fn poll_by_id(&self, _: &str) -> Result<Option<Poll>, StoreError> {
        stall().await
    }
    async fn increment_poll_option(&self, _: &str, _: usize) -> Result<bool, StoreError> {
        stall().await
    }
    async fn count_questions(&self) -> Result<u64, StoreError> {
        stall().await
    }
    async fn question_at(&self, _: u64) -> Result<Option<Question>, StoreError> {
        stall().await
    }
    async fn question_by_id(&self, _: &str) -> Result<Option<Question>, StoreError> {
        stall().await
    }
    async fn increment_question_tally(
        &self,
        _: &str,
        _: Choice,
    ) -> Result<QuestionTally, StoreError> {
        stall().await
    }
}

#[tokio::test]
async fn unresponsive_store_reports_unavailable_within_the_timeout() {
    let engine = VoteEngine::new(StalledStore, Duration::from_millis(50));

    let started = std::time::Instant::now();
    let err = engine.random_poll(Some("food")).await.unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
    assert!(started.elapsed() < Duration::from_secs(5));

    let err = engine.vote_poll("p1", 0).await.unwrap_err();
    assert!(matches!(err, EngineError::StoreUnavailable(_)));
}
