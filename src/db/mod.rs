mod codes;
mod meta;
mod votes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Sqlite};

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{Team, VoteRecord, VotingCategory, VotingCode};

// Codes are keyed by their value. `create_code` is a conditional put,
// `set_used` an unconditional update and `claim_code` the conditional
// used=false -> used=true transition.
#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn get_code(&self, code: &str) -> Result<VotingCode, StoreError>;
    async fn all_codes(&self) -> Result<Vec<VotingCode>, StoreError>;
    async fn create_code(&self, code: &VotingCode) -> Result<(), StoreError>;
    async fn set_used(&self, code: &str, used: bool) -> Result<(), StoreError>;
    async fn claim_code(&self, code: &str) -> Result<(), StoreError>;
    async fn attach_team(&self, code: &str, team_id: i64) -> Result<(), StoreError>;
    async fn delete_code(&self, code: &str) -> Result<(), StoreError>;
}

// Votes are keyed by (code, category_id, team_id). Inserts never overwrite.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn insert_if_absent(&self, vote: &VoteRecord) -> Result<(), StoreError>;
    async fn get_vote(
        &self,
        code: &str,
        category_id: i64,
        team_id: i64,
    ) -> Result<VoteRecord, StoreError>;
    async fn votes_for_code(&self, code: &str) -> Result<Vec<VoteRecord>, StoreError>;
    async fn all_votes(&self) -> Result<Vec<VoteRecord>, StoreError>;
    async fn delete_all_votes(&self) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn get_category(&self, id: i64) -> Result<VotingCategory, StoreError>;
    async fn all_categories(&self) -> Result<Vec<VotingCategory>, StoreError>;
    async fn create_category(&self, category: &VotingCategory) -> Result<(), StoreError>;
    async fn update_category(&self, category: &VotingCategory) -> Result<(), StoreError>;
    async fn delete_category(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get_team(&self, id: i64) -> Result<Team, StoreError>;
    async fn all_teams(&self) -> Result<Vec<Team>, StoreError>;
    async fn create_team(&self, team: &Team) -> Result<(), StoreError>;
    async fn update_team(&self, team: &Team) -> Result<(), StoreError>;
    async fn delete_team(&self, id: i64) -> Result<(), StoreError>;
}

// Everything the voting flows need from persistence.
pub trait Storage: CodeStore + VoteStore + CategoryStore + TeamStore {}

impl<T> Storage for T where T: CodeStore + VoteStore + CategoryStore + TeamStore {}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: &Config) -> Result<Self, StoreError> {
        let db_url = &config.database_url;

        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    // Single connection kept alive forever, so the in-memory database survives.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        Self::init_schema(&pool).await.expect("schema");
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS codes (
                code TEXT PRIMARY KEY,
                voter_category TEXT NOT NULL,
                created_at TEXT NOT NULL,
                used BOOLEAN NOT NULL DEFAULT FALSE,
                team_id INTEGER
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                code TEXT NOT NULL,
                sort_key TEXT NOT NULL,
                category_id INTEGER NOT NULL,
                team_id INTEGER NOT NULL,
                rating INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (code, sort_key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                weight REAL NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                members TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("failed to parse timestamp '{}': {}", raw, e)))
}
