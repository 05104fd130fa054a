use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
};

use crate::error::{EngineError, EngineResult};
use crate::models::{Ballot, Poll, PollOption, PollStatus, VotingMethod};
use crate::store::PollStore;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_url: &str) -> EngineResult<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> EngineResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                voting_method TEXT NOT NULL,
                starts_at TEXT NOT NULL,
                ends_at TEXT NOT NULL,
                requires_authentication BOOLEAN NOT NULL,
                allows_anonymous BOOLEAN NOT NULL,
                requires_quorum BOOLEAN NOT NULL,
                quorum_percentage INTEGER NOT NULL,
                eligible_voter_count INTEGER,
                cancel_reason TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                position INTEGER NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                option_id TEXT NOT NULL,
                rank INTEGER,
                cast_at TEXT NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE,
                FOREIGN KEY (option_id) REFERENCES poll_options(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ballots_poll_voter
            ON ballots (poll_id, voter_id);
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    fn parse_timestamp(field: &str, raw: &str) -> EngineResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| EngineError::Store(format!("failed to parse {field}: {e}")))
    }

    fn poll_from_row(row: &sqlx::sqlite::SqliteRow) -> EngineResult<Poll> {
        let status = PollStatus::parse(&row.get::<String, _>("status"))?;
        let voting_method = VotingMethod::parse(&row.get::<String, _>("voting_method"))?;
        let starts_at = Self::parse_timestamp("starts_at", &row.get::<String, _>("starts_at"))?;
        let ends_at = Self::parse_timestamp("ends_at", &row.get::<String, _>("ends_at"))?;
        let created_at = Self::parse_timestamp("created_at", &row.get::<String, _>("created_at"))?;

        Ok(Poll {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            title: row.get("title"),
            description: row.get("description"),
            status,
            voting_method,
            starts_at,
            ends_at,
            requires_authentication: row.get("requires_authentication"),
            allows_anonymous: row.get("allows_anonymous"),
            requires_quorum: row.get("requires_quorum"),
            quorum_percentage: row.get::<i64, _>("quorum_percentage") as u8,
            eligible_voter_count: row
                .get::<Option<i64>, _>("eligible_voter_count")
                .map(|n| n as u32),
            cancel_reason: row.get("cancel_reason"),
            created_at,
        })
    }

    fn ballot_from_row(row: &sqlx::sqlite::SqliteRow) -> EngineResult<Ballot> {
        Ok(Ballot {
            id: row.get("id"),
            poll_id: row.get("poll_id"),
            voter_id: row.get("voter_id"),
            option_id: row.get("option_id"),
            rank: row.get::<Option<i64>, _>("rank").map(|r| r as u32),
            cast_at: Self::parse_timestamp("cast_at", &row.get::<String, _>("cast_at"))?,
        })
    }
}

#[async_trait]
impl PollStore for SqliteStore {
    async fn insert_poll(&self, poll: &Poll) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (
                id, organization_id, title, description, status, voting_method,
                starts_at, ends_at, requires_authentication, allows_anonymous,
                requires_quorum, quorum_percentage, eligible_voter_count,
                cancel_reason, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.organization_id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.status.as_str())
        .bind(poll.voting_method.as_str())
        .bind(poll.starts_at.to_rfc3339())
        .bind(poll.ends_at.to_rfc3339())
        .bind(poll.requires_authentication)
        .bind(poll.allows_anonymous)
        .bind(poll.requires_quorum)
        .bind(poll.quorum_percentage as i64)
        .bind(poll.eligible_voter_count.map(|n| n as i64))
        .bind(&poll.cancel_reason)
        .bind(poll.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_poll(&self, poll_id: &str) -> EngineResult<Poll> {
        let row = sqlx::query("SELECT * FROM polls WHERE id = ?")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("poll {poll_id}")))?;

        Self::poll_from_row(&row)
    }

    async fn update_poll(&self, poll: &Poll) -> EngineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE polls
            SET status = ?, starts_at = ?, ends_at = ?,
                eligible_voter_count = ?, cancel_reason = ?
            WHERE id = ?
            "#,
        )
        .bind(poll.status.as_str())
        .bind(poll.starts_at.to_rfc3339())
        .bind(poll.ends_at.to_rfc3339())
        .bind(poll.eligible_voter_count.map(|n| n as i64))
        .bind(&poll.cancel_reason)
        .bind(&poll.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("poll {}", poll.id)));
        }
        Ok(())
    }

    async fn delete_poll(&self, poll_id: &str) -> EngineResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM poll_options WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("poll {poll_id}")));
        }
        Ok(())
    }

    async fn list_polls(&self, organization_id: &str) -> EngineResult<Vec<Poll>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM polls
            WHERE organization_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::poll_from_row).collect()
    }

    async fn insert_option(&self, option: &PollOption) -> EngineResult<()> {
        sqlx::query(
            r#"
            INSERT INTO poll_options (id, poll_id, title, description, position)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&option.id)
        .bind(&option.poll_id)
        .bind(&option.title)
        .bind(&option.description)
        .bind(option.order as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_options(&self, poll_id: &str) -> EngineResult<Vec<PollOption>> {
        let rows = sqlx::query(
            r#"
            SELECT id, poll_id, title, description, position
            FROM poll_options
            WHERE poll_id = ?
            ORDER BY position
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PollOption {
                id: row.get("id"),
                poll_id: row.get("poll_id"),
                title: row.get("title"),
                description: row.get("description"),
                order: row.get::<i64, _>("position") as u32,
            })
            .collect())
    }

    async fn delete_option(&self, poll_id: &str, option_id: &str) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM poll_options WHERE id = ? AND poll_id = ?")
            .bind(option_id)
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("option {option_id}")));
        }
        Ok(())
    }

    async fn replace_ballots(
        &self,
        poll_id: &str,
        voter_id: &str,
        ballots: Vec<Ballot>,
    ) -> EngineResult<()> {
        // One transaction so a resubmission can never be observed half-applied.
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM ballots WHERE poll_id = ? AND voter_id = ?")
            .bind(poll_id)
            .bind(voter_id)
            .execute(&mut *tx)
            .await?;

        for ballot in &ballots {
            sqlx::query(
                r#"
                INSERT INTO ballots (id, poll_id, voter_id, option_id, rank, cast_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&ballot.id)
            .bind(&ballot.poll_id)
            .bind(&ballot.voter_id)
            .bind(&ballot.option_id)
            .bind(ballot.rank.map(|r| r as i64))
            .bind(ballot.cast_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn ballots_for_poll(&self, poll_id: &str) -> EngineResult<Vec<Ballot>> {
        let rows = sqlx::query("SELECT * FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::ballot_from_row).collect()
    }

    async fn ballots_for_voter(
        &self,
        poll_id: &str,
        voter_id: &str,
    ) -> EngineResult<Vec<Ballot>> {
        let rows = sqlx::query("SELECT * FROM ballots WHERE poll_id = ? AND voter_id = ?")
            .bind(poll_id)
            .bind(voter_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::ballot_from_row).collect()
    }

    async fn count_ballots(&self, poll_id: &str) -> EngineResult<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n") as u32)
    }

    async fn count_distinct_voters(&self, poll_id: &str) -> EngineResult<u32> {
        let row =
            sqlx::query("SELECT COUNT(DISTINCT voter_id) AS n FROM ballots WHERE poll_id = ?")
                .bind(poll_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.get::<i64, _>("n") as u32)
    }

    async fn expired_active_polls(&self, now: DateTime<Utc>) -> EngineResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM polls
            WHERE status = 'active' AND ends_at < ?
            "#,
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}
