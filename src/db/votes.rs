use async_trait::async_trait;
use log::{info, warn};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, Database, VoteStore};
use crate::error::StoreError;
use crate::models::{sort_key, VoteRecord};

fn vote_from_row(row: &SqliteRow) -> Result<VoteRecord, StoreError> {
    let timestamp_str: String = row.try_get("timestamp")?;
    Ok(VoteRecord {
        code: row.try_get("code")?,
        category_id: row.try_get("category_id")?,
        team_id: row.try_get("team_id")?,
        rating: row.try_get("rating")?,
        timestamp: parse_timestamp(&timestamp_str)?,
    })
}

#[async_trait]
impl VoteStore for Database {
    async fn insert_if_absent(&self, vote: &VoteRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO votes (code, sort_key, category_id, team_id, rating, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(code, sort_key) DO NOTHING
            "#,
        )
        .bind(&vote.code)
        .bind(vote.sort_key())
        .bind(vote.category_id)
        .bind(vote.team_id)
        .bind(vote.rating)
        .bind(vote.timestamp.to_rfc3339())
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!("vote {}/{} already exists for code {}", vote.category_id, vote.team_id, vote.code);
            return Err(StoreError::KeyConflict);
        }
        Ok(())
    }

    async fn get_vote(
        &self,
        code: &str,
        category_id: i64,
        team_id: i64,
    ) -> Result<VoteRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT code, category_id, team_id, rating, timestamp
            FROM votes
            WHERE code = ? AND sort_key = ?
            "#,
        )
        .bind(code)
        .bind(sort_key(category_id, team_id))
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => vote_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn votes_for_code(&self, code: &str) -> Result<Vec<VoteRecord>, StoreError> {
        sqlx::query(
            r#"
            SELECT code, category_id, team_id, rating, timestamp
            FROM votes
            WHERE code = ?
            ORDER BY category_id, team_id
            "#,
        )
        .bind(code)
        .fetch_all(self.pool())
        .await?
        .iter()
        .map(vote_from_row)
        .collect()
    }

    async fn all_votes(&self) -> Result<Vec<VoteRecord>, StoreError> {
        sqlx::query("SELECT code, category_id, team_id, rating, timestamp FROM votes")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(vote_from_row)
            .collect()
    }

    async fn delete_all_votes(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM votes").execute(self.pool()).await?;
        info!("deleted {} vote(s)", result.rows_affected());
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BallotEntry;

    fn vote(code: &str, category_id: i64, team_id: i64, rating: i32) -> VoteRecord {
        VoteRecord::new(code, &BallotEntry { category_id, team_id, rating })
    }

    #[tokio::test]
    async fn second_insert_with_same_key_conflicts() {
        let db = Database::in_memory().await;
        db.insert_if_absent(&vote("AAAAA", 1, 2, 4)).await.unwrap();

        let err = db.insert_if_absent(&vote("AAAAA", 1, 2, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::KeyConflict));

        // First write wins
        assert_eq!(db.get_vote("AAAAA", 1, 2).await.unwrap().rating, 4);
    }

    #[tokio::test]
    async fn same_pair_under_different_codes_is_allowed() {
        let db = Database::in_memory().await;
        db.insert_if_absent(&vote("AAAAA", 1, 2, 4)).await.unwrap();
        db.insert_if_absent(&vote("BBBBB", 1, 2, 4)).await.unwrap();
        assert_eq!(db.all_votes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn votes_for_code_are_ordered_by_category_then_team() {
        let db = Database::in_memory().await;
        db.insert_if_absent(&vote("CCCCC", 2, 1, 3)).await.unwrap();
        db.insert_if_absent(&vote("CCCCC", 1, 9, 5)).await.unwrap();
        db.insert_if_absent(&vote("CCCCC", 1, 3, 2)).await.unwrap();
        db.insert_if_absent(&vote("DDDDD", 1, 1, 1)).await.unwrap();

        let pairs: Vec<(i64, i64)> = db
            .votes_for_code("CCCCC")
            .await
            .unwrap()
            .iter()
            .map(|v| (v.category_id, v.team_id))
            .collect();
        assert_eq!(pairs, vec![(1, 3), (1, 9), (2, 1)]);
    }

    #[tokio::test]
    async fn delete_all_votes_reports_count() {
        let db = Database::in_memory().await;
        db.insert_if_absent(&vote("AAAAA", 1, 1, 1)).await.unwrap();
        db.insert_if_absent(&vote("AAAAA", 1, 2, 1)).await.unwrap();

        assert_eq!(db.delete_all_votes().await.unwrap(), 2);
        assert!(db.all_votes().await.unwrap().is_empty());
        assert!(matches!(db.get_vote("AAAAA", 1, 1).await, Err(StoreError::NotFound)));
    }
}
