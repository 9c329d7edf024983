use chrono::{DateTime, Utc};
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
};

use crate::models::{Choice, Poll, PollFilter, PollOption, Question, QuestionTally};
use crate::store::{PollStore, StoreError};

pub struct Database {
    pool: SqlitePool,
}

fn store_err(e: sqlx::Error) -> StoreError {
    use sqlx::Error::*;
    match &e {
        Io(_) | Tls(_) | Protocol(_) | PoolTimedOut | PoolClosed | WorkerCrashed => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Internal(e.to_string()),
    }
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("failed to parse {}: {}", column, e)))
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await.map_err(store_err)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(store_err)?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    // Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Initialize the database schema
    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                approved BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                poll_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                label TEXT NOT NULL,
                votes INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (poll_id, position),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                id TEXT PRIMARY KEY,
                red_label TEXT,
                blue_label TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS question_tallies (
                question_id TEXT PRIMARY KEY,
                votes_red INTEGER NOT NULL DEFAULT 0,
                votes_blue INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    // Create a new poll in the database
    pub async fn create_poll(&self, poll: &Poll) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO polls (id, category, approved, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.category)
        .bind(poll.approved)
        .bind(poll.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        for (i, option) in poll.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO poll_options (poll_id, position, label, votes)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&poll.id)
            .bind(i as i64)
            .bind(&option.label)
            .bind(option.votes)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        }

        Ok(())
    }

    // Approve a poll so it becomes eligible for selection
    pub async fn approve_poll(&self, poll_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE polls
            SET approved = TRUE
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    pub async fn create_question(&self, question: &Question) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, red_label, blue_label, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&question.id)
        .bind(&question.red_label)
        .bind(&question.blue_label)
        .bind(question.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn options_for(&self, poll_id: &str) -> Result<Vec<PollOption>, StoreError> {
        let options = sqlx::query(
            r#"
            SELECT label, votes
            FROM poll_options
            WHERE poll_id = ?
            ORDER BY position
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?
        .into_iter()
        .map(|row| PollOption {
            label: row.get::<String, _>("label"),
            votes: row.get::<i64, _>("votes"),
        })
        .collect();

        Ok(options)
    }

    async fn poll_from_row(&self, row: sqlx::sqlite::SqliteRow) -> Result<Poll, StoreError> {
        let id = row.get::<String, _>("id");
        let created_at = parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?;
        let options = self.options_for(&id).await?;

        Ok(Poll {
            id,
            category: row.get::<String, _>("category"),
            approved: row.get::<bool, _>("approved"),
            options,
            created_at,
        })
    }
}

fn question_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Question, StoreError> {
    Ok(Question {
        id: row.get::<String, _>("id"),
        red_label: row.get::<Option<String>, _>("red_label"),
        blue_label: row.get::<Option<String>, _>("blue_label"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "created_at")?,
    })
}

#[async_trait::async_trait]
impl PollStore for Database {
    async fn count_polls(&self, filter: &PollFilter) -> Result<u64, StoreError> {
        let count: i64 = match &filter.category {
            Some(category) => {
                sqlx::query("SELECT COUNT(*) AS n FROM polls WHERE approved = ? AND category = ?")
                    .bind(filter.approved)
                    .bind(category)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(store_err)?
                    .get("n")
            }
            None => sqlx::query("SELECT COUNT(*) AS n FROM polls WHERE approved = ?")
                .bind(filter.approved)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?
                .get("n"),
        };

        Ok(count as u64)
    }

    async fn poll_at(&self, filter: &PollFilter, offset: u64) -> Result<Option<Poll>, StoreError> {
        let row = match &filter.category {
            Some(category) => {
                sqlx::query(
                    r#"
                    SELECT id, category, approved, created_at
                    FROM polls
                    WHERE approved = ? AND category = ?
                    ORDER BY id
                    LIMIT 1 OFFSET ?
                    "#,
                )
                .bind(filter.approved)
                .bind(category)
                .bind(offset as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, category, approved, created_at
                    FROM polls
                    WHERE approved = ?
                    ORDER BY id
                    LIMIT 1 OFFSET ?
                    "#,
                )
                .bind(filter.approved)
                .bind(offset as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?
            }
        };

        match row {
            Some(row) => Ok(Some(self.poll_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn poll_by_id(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, category, approved, created_at
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => Ok(Some(self.poll_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn increment_poll_option(
        &self,
        id: &str,
        option_index: usize,
    ) -> Result<bool, StoreError> {
        // Single atomic increment; never read-modify-write from here.
        let result = sqlx::query(
            r#"
            UPDATE poll_options
            SET votes = votes + 1
            WHERE poll_id = ? AND position = ?
            "#,
        )
        .bind(id)
        .bind(option_index as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_questions(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?
            .get("n");

        Ok(count as u64)
    }

    async fn question_at(&self, offset: u64) -> Result<Option<Question>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, red_label, blue_label, created_at
            FROM questions
            ORDER BY id
            LIMIT 1 OFFSET ?
            "#,
        )
        .bind(offset as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(question_from_row).transpose()
    }

    async fn question_by_id(&self, id: &str) -> Result<Option<Question>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, red_label, blue_label, created_at
            FROM questions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(question_from_row).transpose()
    }

    async fn increment_question_tally(
        &self,
        id: &str,
        choice: Choice,
    ) -> Result<QuestionTally, StoreError> {
        let (red, blue) = match choice {
            Choice::Red => (1i64, 0i64),
            Choice::Blue => (0i64, 1i64),
        };

        // Atomic upsert: the first vote creates the tally row, later votes
        // increment in place. Two concurrent first votes cannot create two
        // rows because question_id is the primary key.
        let row = sqlx::query(
            r#"
            INSERT INTO question_tallies (question_id, votes_red, votes_blue)
            VALUES (?, ?, ?)
            ON CONFLICT(question_id) DO UPDATE SET
                votes_red = votes_red + excluded.votes_red,
                votes_blue = votes_blue + excluded.votes_blue
            RETURNING votes_red, votes_blue
            "#,
        )
        .bind(id)
        .bind(red)
        .bind(blue)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(QuestionTally {
            question_id: id.to_string(),
            votes_red: row.get("votes_red"),
            votes_blue: row.get("votes_blue"),
        })
    }
}
